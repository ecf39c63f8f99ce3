use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use crate::{
    event::{InboundEvent, MessageEvent, QueryEvent},
    media::MediaStore,
    platform::PlatformPort,
    webhook::WebhookDispatcher,
    Error, Result,
};

/// Converts inbound session events into webhook payloads.
///
/// For media-bearing messages the blob is persisted to the store strictly
/// before dispatch, so the `file_url` in a delivered payload is always
/// resolvable.
pub struct EventRelay {
    platform: Arc<dyn PlatformPort>,
    store: Arc<MediaStore>,
    dispatcher: Arc<WebhookDispatcher>,
    public_base: String,
}

impl EventRelay {
    pub fn new(
        platform: Arc<dyn PlatformPort>,
        store: Arc<MediaStore>,
        dispatcher: Arc<WebhookDispatcher>,
        public_base: String,
    ) -> Self {
        Self {
            platform,
            store,
            dispatcher,
            public_base,
        }
    }

    /// Handle one inbound event. Failures are logged and the event is
    /// dropped; the session keeps delivering subsequent events.
    pub async fn on_event(&self, event: InboundEvent) {
        let res = match event {
            InboundEvent::NewMessage(ev) => self.relay_message(ev, false).await,
            InboundEvent::EditedMessage(ev) => self.relay_message(ev, true).await,
            InboundEvent::InlineQuery(q) => self.relay_query(q).await,
        };
        if let Err(e) = res {
            warn!("dropping event: {e}");
        }
    }

    async fn relay_message(&self, ev: MessageEvent, edited: bool) -> Result<()> {
        // Edits never re-fetch media, even when the edit changed it.
        let mut file_url = None;
        if !edited {
            if let Some(media) = &ev.media {
                let path = self
                    .store
                    .save(ev.message_id, self.platform.as_ref(), media)
                    .await?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                file_url = Some(format!("{}/media/{}", self.public_base, name));
            }
        }

        let payload = build_message_payload(ev.fields, file_url, edited)?;
        self.dispatcher.dispatch(&payload).await;
        Ok(())
    }

    async fn relay_query(&self, q: QueryEvent) -> Result<()> {
        self.dispatcher.dispatch(&q.fields).await;
        Ok(())
    }
}

/// Extend a message's native field set with relay metadata.
fn build_message_payload(
    fields: Value,
    file_url: Option<String>,
    edited: bool,
) -> Result<Value> {
    let Value::Object(mut map) = fields else {
        return Err(Error::Platform(
            "message fields are not a JSON object".to_string(),
        ));
    };

    if let Some(url) = file_url {
        map.insert("file_url".to_string(), json!(url));
    }
    if edited {
        map.insert("edited".to_string(), json!(true));
    }

    Ok(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::{
        domain::{ChatTarget, MessageId},
        event::MediaRef,
        platform::MediaKind,
    };

    /// Stub platform whose media download either writes fixed bytes or
    /// fails, depending on construction.
    struct StubPlatform {
        fail_downloads: bool,
    }

    #[async_trait]
    impl PlatformPort for StubPlatform {
        async fn connect(&self) -> Result<()> {
            Ok(())
        }
        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }
        async fn send_text(&self, _: &ChatTarget, _: &str) -> Result<MessageId> {
            unreachable!("relay never sends")
        }
        async fn send_media(
            &self,
            _: &ChatTarget,
            _: MediaKind,
            _: &str,
            _: Option<&str>,
        ) -> Result<MessageId> {
            unreachable!("relay never sends")
        }
        async fn send_location(&self, _: &ChatTarget, _: f64, _: f64) -> Result<MessageId> {
            unreachable!("relay never sends")
        }
        async fn send_contact(
            &self,
            _: &ChatTarget,
            _: &str,
            _: &str,
            _: Option<&str>,
        ) -> Result<MessageId> {
            unreachable!("relay never sends")
        }
        async fn edit_text(&self, _: &ChatTarget, _: MessageId, _: &str) -> Result<MessageId> {
            unreachable!("relay never sends")
        }
        async fn delete_message(&self, _: &ChatTarget, _: MessageId) -> Result<()> {
            unreachable!("relay never sends")
        }
        async fn download_media(&self, _: &MediaRef, dest: &Path) -> Result<()> {
            if self.fail_downloads {
                return Err(Error::Platform("download failed".to_string()));
            }
            std::fs::write(dest, b"blob")?;
            Ok(())
        }
    }

    fn relay_with(fail_downloads: bool, dir: &Path) -> EventRelay {
        EventRelay::new(
            Arc::new(StubPlatform { fail_downloads }),
            Arc::new(MediaStore::new(dir).unwrap()),
            // No URL configured: dispatch is a no-op, which keeps these
            // tests focused on payload/media behavior.
            Arc::new(WebhookDispatcher::new(None, None, Duration::from_secs(5)).unwrap()),
            "http://localhost:8181".to_string(),
        )
    }

    fn media_message(id: i32) -> MessageEvent {
        MessageEvent {
            message_id: id,
            chat_id: 7,
            media: Some(MediaRef {
                file_id: "file-abc".to_string(),
            }),
            fields: json!({"id": id, "chat": {"id": 7}}),
        }
    }

    #[test]
    fn payload_keeps_native_fields_and_appends_metadata() {
        let fields = json!({"id": 999, "text": "hi"});
        let out = build_message_payload(
            fields,
            Some("http://localhost:8181/media/999".to_string()),
            false,
        )
        .unwrap();

        assert_eq!(out["id"], 999);
        assert_eq!(out["text"], "hi");
        assert_eq!(out["file_url"], "http://localhost:8181/media/999");
        assert!(out.get("edited").is_none());
    }

    #[test]
    fn payload_marks_edits() {
        let out = build_message_payload(json!({"id": 1}), None, true).unwrap();
        assert_eq!(out["edited"], true);
    }

    #[test]
    fn payload_rejects_non_object_fields() {
        assert!(build_message_payload(json!("not an object"), None, false).is_err());
    }

    #[tokio::test]
    async fn new_message_saves_media_before_dispatch() {
        let tmp = tempfile::tempdir().unwrap();
        let relay = relay_with(false, tmp.path());

        relay
            .on_event(InboundEvent::NewMessage(media_message(999)))
            .await;

        assert_eq!(std::fs::read(tmp.path().join("999")).unwrap(), b"blob");
    }

    #[tokio::test]
    async fn edit_does_not_refetch_media() {
        let tmp = tempfile::tempdir().unwrap();
        // Downloads would fail; an edit must never attempt one.
        let relay = relay_with(true, tmp.path());

        relay
            .on_event(InboundEvent::EditedMessage(media_message(1000)))
            .await;

        assert!(!tmp.path().join("1000").exists());
    }

    #[tokio::test]
    async fn download_failure_drops_the_event_without_panicking() {
        let tmp = tempfile::tempdir().unwrap();
        let relay = relay_with(true, tmp.path());

        relay
            .on_event(InboundEvent::NewMessage(media_message(5)))
            .await;
        // A later event still gets handled.
        relay
            .on_event(InboundEvent::InlineQuery(QueryEvent {
                query_id: "q1".to_string(),
                fields: json!({"id": "q1", "query": "hello"}),
            }))
            .await;
    }
}
