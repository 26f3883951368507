//! Live-channel events.
//!
//! Every frame on the persistent channel is a JSON text frame of the form
//! `{"event": "<name>", "data": <payload>}`. Inbound frames decode into
//! [`ServerEvent`]; outbound intents encode from [`ClientEvent`].
//!
//! # Invariants
//!
//! Each variant maps to exactly one event name (enforced by the serde tag),
//! and unknown names are reported as [`ProtocolError::UnknownEvent`] rather
//! than a generic parse failure so the transport can skip them quietly.

use serde::{Deserialize, Serialize};

use crate::{ConversationId, Message, ProtocolError, UserId};

/// Typing state of one user in one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPayload {
    /// Conversation the user is typing in.
    #[serde(alias = "conversationId")]
    pub conversation_id: ConversationId,
    /// User whose state changed.
    #[serde(alias = "userId")]
    pub user_id: UserId,
    /// `true` when typing started, `false` when it stopped.
    pub typing: bool,
}

/// Fire-and-forget send hint pushed alongside the REST send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessagePayload {
    /// Target conversation.
    pub conversation_id: ConversationId,
    /// Local user.
    pub sender_id: UserId,
    /// Message text.
    pub content: String,
}

/// Server-side failure report on the live channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageErrorPayload {
    /// Human-readable reason.
    #[serde(default)]
    pub reason: String,
}

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A new message in a joined conversation.
    ReceiveMessage(Message),
    /// A participant started or stopped typing.
    UserTyping(TypingPayload),
    /// The server rejected something sent over the channel.
    MessageError(MessageErrorPayload),
}

/// Event names [`ServerEvent`] understands.
const SERVER_EVENT_NAMES: [&str; 3] = ["receive_message", "user_typing", "message_error"];

/// Envelope with the payload left undecoded.
#[derive(Deserialize)]
struct RawEnvelope {
    event: String,
}

impl ServerEvent {
    /// Decode an inbound text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let envelope: RawEnvelope = serde_json::from_str(text)?;
        if !SERVER_EVENT_NAMES.contains(&envelope.event.as_str()) {
            return Err(ProtocolError::UnknownEvent(envelope.event));
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Encode as a text frame. Used by servers and test harnesses.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReceiveMessage(_) => "receive_message",
            Self::UserTyping(_) => "user_typing",
            Self::MessageError(_) => "message_error",
        }
    }
}

/// Events the client emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Subscribe to a conversation's room.
    JoinConversation(ConversationId),
    /// Unsubscribe from a conversation's room.
    LeaveConversation(ConversationId),
    /// Send hint. The REST send remains the system of record.
    SendMessage(SendMessagePayload),
    /// Local typing state.
    Typing(TypingPayload),
}

impl ClientEvent {
    /// Encode as a text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Decode an outbound frame. Used by servers and test harnesses.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinConversation(_) => "join_conversation",
            Self::LeaveConversation(_) => "leave_conversation",
            Self::SendMessage(_) => "send_message",
            Self::Typing(_) => "typing",
        }
    }
}
