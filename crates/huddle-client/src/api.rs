//! REST collaborator.
//!
//! Everything durable goes through this trait: listing, history, sending and
//! acknowledging reads. The live channel only carries hints. Production uses
//! the reqwest-backed `HttpApi`; tests substitute an in-memory fake.

use async_trait::async_trait;
use huddle_proto::{Conversation, ConversationId, Message, UserId};

use crate::ApiError;

/// Request/response API the session depends on.
#[async_trait]
pub trait Api: Send + Sync {
    /// Conversation summaries visible to the local user.
    async fn conversations(&self) -> Result<Vec<Conversation>, ApiError>;

    /// Most recent `limit` messages of a conversation, oldest first.
    async fn messages(
        &self,
        conversation_id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, ApiError>;

    /// Persist a message and return it as stored by the server.
    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        content: &str,
    ) -> Result<Message, ApiError>;

    /// Find or create the 1:1 conversation with `counterparty_id`.
    async fn create_conversation(&self, counterparty_id: &UserId)
    -> Result<ConversationId, ApiError>;

    /// Acknowledge every message in a conversation as read.
    async fn mark_read(&self, conversation_id: &ConversationId) -> Result<ConversationId, ApiError>;

    /// Unread messages across all conversations, as counted by the server.
    async fn unread_total(&self) -> Result<u64, ApiError>;
}
