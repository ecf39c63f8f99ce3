use std::path::Path;

use async_trait::async_trait;

use crate::{
    domain::{ChatTarget, MessageId},
    event::MediaRef,
    Result,
};

/// Kinds of media the platform can send.
///
/// Each maps onto one platform send operation; captions apply to every kind
/// except `VideoNote`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Document,
    Audio,
    Voice,
    Video,
    Animation,
    VideoNote,
}

/// Platform session capability.
///
/// Telegram is the only implementation; the relay, gateway, and supervisor
/// depend on this trait so tests can substitute a recording stub.
#[async_trait]
pub trait PlatformPort: Send + Sync {
    /// Establish the session. Called exactly once by the supervisor;
    /// failure (invalid credentials) is fatal to the process.
    async fn connect(&self) -> Result<()>;

    /// Tear the session down. Called exactly once by the supervisor on
    /// shutdown.
    async fn disconnect(&self) -> Result<()>;

    async fn send_text(&self, chat: &ChatTarget, text: &str) -> Result<MessageId>;

    /// Send one media object. `input` may be a platform file id, an
    /// http(s) URL, or a local file path; resolution is the adapter's
    /// concern.
    async fn send_media(
        &self,
        chat: &ChatTarget,
        kind: MediaKind,
        input: &str,
        caption: Option<&str>,
    ) -> Result<MessageId>;

    async fn send_location(
        &self,
        chat: &ChatTarget,
        latitude: f64,
        longitude: f64,
    ) -> Result<MessageId>;

    async fn send_contact(
        &self,
        chat: &ChatTarget,
        phone_number: &str,
        first_name: &str,
        last_name: Option<&str>,
    ) -> Result<MessageId>;

    async fn edit_text(
        &self,
        chat: &ChatTarget,
        message_id: MessageId,
        text: &str,
    ) -> Result<MessageId>;

    async fn delete_message(&self, chat: &ChatTarget, message_id: MessageId) -> Result<()>;

    /// Download the media object behind `media` into `dest`.
    async fn download_media(&self, media: &MediaRef, dest: &Path) -> Result<()>;
}
