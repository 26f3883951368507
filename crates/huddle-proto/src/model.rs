//! Conversation and message records.
//!
//! Field names serialize in snake_case. The server's camelCase spellings are
//! accepted as aliases so both REST bodies and pushed events decode into the
//! same types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ConversationId, MessageId, UserId};

/// Wall-clock timestamp carried on the wire (RFC 3339, UTC).
pub type Timestamp = DateTime<Utc>;

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned id, unique within the conversation.
    pub id: MessageId,
    /// Conversation this message belongs to.
    #[serde(alias = "conversationId")]
    pub conversation_id: ConversationId,
    /// Author of the message.
    #[serde(alias = "senderId")]
    pub sender_id: UserId,
    /// Message text.
    pub content: String,
    /// Time the server accepted the message. Display order key.
    #[serde(alias = "sentAt")]
    pub sent_at: Timestamp,
    /// Time the message was read. `None` until marked.
    #[serde(default, alias = "readAt")]
    pub read_at: Option<Timestamp>,
}

impl Message {
    /// Create an unread message.
    pub fn new(
        id: impl Into<MessageId>,
        conversation_id: impl Into<ConversationId>,
        sender_id: impl Into<UserId>,
        content: impl Into<String>,
        sent_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
            sent_at,
            read_at: None,
        }
    }

    /// Whether `user` wrote this message.
    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender_id == user
    }
}

/// Summary row of a conversation between the local user and a counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation id. Unique within the list.
    pub id: ConversationId,
    /// The other participant.
    #[serde(alias = "counterpartyId")]
    pub counterparty_id: UserId,
    /// Display name of the other participant.
    #[serde(default, alias = "counterpartyName")]
    pub counterparty_name: String,
    /// Content of the newest known message. `None` for an empty conversation.
    #[serde(default, alias = "lastMessagePreview")]
    pub last_message_preview: Option<String>,
    /// `sent_at` of the newest known message. List ordering key.
    #[serde(default, alias = "lastMessageTime")]
    pub last_message_time: Option<Timestamp>,
    /// Messages from the counterparty not yet read.
    #[serde(default, alias = "unreadCount")]
    pub unread_count: u32,
}

impl Conversation {
    /// Create an empty conversation with no messages and nothing unread.
    pub fn new(
        id: impl Into<ConversationId>,
        counterparty_id: impl Into<UserId>,
        counterparty_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            counterparty_id: counterparty_id.into(),
            counterparty_name: counterparty_name.into(),
            last_message_preview: None,
            last_message_time: None,
            unread_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_decodes_camel_case() {
        let json = r#"{
            "id": 7,
            "conversationId": "c1",
            "senderId": 3,
            "content": "hi",
            "sentAt": "2024-05-01T10:00:00Z",
            "readAt": null
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.id.as_str(), "7");
        assert_eq!(message.conversation_id.as_str(), "c1");
        assert_eq!(message.sender_id.as_str(), "3");
        assert!(message.read_at.is_none());
    }

    #[test]
    fn conversation_defaults_missing_fields() {
        let json = r#"{"id": "c1", "counterparty_id": "u2"}"#;

        let conversation: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conversation.unread_count, 0);
        assert!(conversation.last_message_time.is_none());
        assert!(conversation.counterparty_name.is_empty());
    }
}
