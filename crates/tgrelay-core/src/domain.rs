use std::fmt;

use serde::{Deserialize, Serialize};

/// Target chat for an outbound operation: a numeric id or a public
/// username. Mirrors the wire format where `chat_id` may be either an
/// integer or a string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatTarget {
    Id(i64),
    Username(String),
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatTarget::Id(id) => write!(f, "{id}"),
            ChatTarget::Username(name) => write!(f, "{name}"),
        }
    }
}

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_target_accepts_int_or_string() {
        let id: ChatTarget = serde_json::from_str("123").unwrap();
        assert_eq!(id, ChatTarget::Id(123));

        let name: ChatTarget = serde_json::from_str("\"some_channel\"").unwrap();
        assert_eq!(name, ChatTarget::Username("some_channel".to_string()));
    }

    #[test]
    fn message_id_serializes_transparently() {
        let out = serde_json::to_string(&MessageId(42)).unwrap();
        assert_eq!(out, "42");
    }
}
