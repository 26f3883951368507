//! REST request and response envelopes.
//!
//! Each collaborator call wraps its payload in a small envelope object. The
//! types here mirror those envelopes one-to-one so the HTTP layer can stay a
//! thin `serde` pass-through.

use serde::{Deserialize, Serialize};

use crate::{Conversation, ConversationId, Message, UserId};

/// `GET /conversations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationsResponse {
    /// Every conversation of the local user.
    #[serde(default)]
    pub conversations: Vec<Conversation>,
}

/// `GET /messages/{conversation_id}?limit=N`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// The newest `limit` messages, in any order.
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// `POST /messages` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// Target conversation.
    pub conversation_id: ConversationId,
    /// Message text.
    pub content: String,
}

/// `POST /messages` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageResponse {
    /// The stored message, with its server-assigned id and timestamp.
    pub data: Message,
}

/// `POST /conversations` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateConversationRequest {
    /// User to converse with.
    pub counterparty_id: UserId,
}

/// `POST /conversations` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateConversationResponse {
    /// Existing or newly created conversation with the counterparty.
    #[serde(alias = "conversationId")]
    pub conversation_id: ConversationId,
}

/// `POST /conversations/{id}/read` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReadResponse {
    /// Conversation the server marked read.
    #[serde(rename = "conversationId", alias = "conversation_id")]
    pub conversation_id: ConversationId,
}

/// `GET /messages/unread-count`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    /// Unread messages across all conversations.
    #[serde(alias = "totalUnread")]
    pub total_unread: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_read_accepts_both_spellings() {
        let camel: MarkReadResponse = serde_json::from_str(r#"{"conversationId":"c1"}"#).unwrap();
        let snake: MarkReadResponse = serde_json::from_str(r#"{"conversation_id":"c1"}"#).unwrap();
        assert_eq!(camel, snake);
    }

    #[test]
    fn empty_history_body_is_empty_list() {
        let history: HistoryResponse = serde_json::from_str("{}").unwrap();
        assert!(history.messages.is_empty());
    }
}
