use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::Result;

/// Best-effort delivery of event payloads to the configured webhook URL.
///
/// Delivery is fire-and-forget and at-most-once: failures are logged and
/// the payload is discarded. There is no retry queue.
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: Option<String>,
    api_key: Option<String>,
}

impl WebhookDispatcher {
    pub fn new(url: Option<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }

    /// POST `payload` as JSON to the webhook. No-op when no URL is
    /// configured. The response status is not inspected; only transport
    /// failures are logged.
    pub async fn dispatch(&self, payload: &Value) {
        let Some(url) = &self.url else {
            return;
        };

        let mut req = self.client.post(url).json(payload);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }

        match req.send().await {
            Ok(resp) => debug!("webhook delivered: {}", resp.status()),
            Err(e) => warn!("failed to send webhook: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn dispatch_without_url_is_a_noop() {
        let dispatcher =
            WebhookDispatcher::new(None, None, Duration::from_secs(5)).unwrap();
        dispatcher.dispatch(&json!({"id": 1})).await;
    }

    #[tokio::test]
    async fn dispatch_to_unreachable_destination_is_swallowed() {
        // Bind then drop a listener so the port is very likely closed.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let dispatcher = WebhookDispatcher::new(
            Some(format!("http://127.0.0.1:{port}/hook")),
            Some("key".to_string()),
            Duration::from_millis(500),
        )
        .unwrap();

        // Must complete without panicking or propagating the error.
        dispatcher.dispatch(&json!({"id": 1})).await;
        dispatcher.dispatch(&json!({"id": 2})).await;
    }
}
