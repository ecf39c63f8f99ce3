use serde_json::Value;

/// Opaque handle to a platform-hosted media object attached to a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaRef {
    pub file_id: String,
}

/// A new or edited message as delivered by the platform session.
///
/// `fields` is the message's native field set, serialized verbatim by the
/// adapter; the relay forwards it untouched apart from the relay metadata
/// it appends (`file_url`, `edited`).
#[derive(Clone, Debug)]
pub struct MessageEvent {
    pub message_id: i32,
    pub chat_id: i64,
    pub media: Option<MediaRef>,
    pub fields: Value,
}

/// An inline query as delivered by the platform session.
#[derive(Clone, Debug)]
pub struct QueryEvent {
    pub query_id: String,
    pub fields: Value,
}

/// An inbound occurrence on the session. Ephemeral: transformed into a
/// webhook payload and dropped.
#[derive(Clone, Debug)]
pub enum InboundEvent {
    NewMessage(MessageEvent),
    EditedMessage(MessageEvent),
    InlineQuery(QueryEvent),
}
