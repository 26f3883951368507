//! In-memory REST backend.
//!
//! [`FakeApi`] keeps a server-side view of conversations and messages for
//! one local user and answers [`Api`] calls from it. Every call is recorded
//! into a [`Trace`]. Failures can be scripted per endpoint with
//! [`FakeApi::fail_next`].

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use huddle_client::{Api, ApiError};
use huddle_core::Environment;
use huddle_proto::{Conversation, ConversationId, Message, MessageId, UserId};

use crate::{SimEnv, Trace, TraceEntry};

/// REST endpoint, for failure scripting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET /conversations`
    Conversations,
    /// `GET /messages/{id}`
    Messages,
    /// `POST /messages`
    SendMessage,
    /// `POST /conversations`
    CreateConversation,
    /// `POST /conversations/{id}/read`
    MarkRead,
    /// `GET /messages/unread-count`
    UnreadTotal,
}

/// A recorded REST call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    /// Conversation list.
    Conversations,
    /// History page.
    Messages {
        /// Conversation.
        conversation_id: ConversationId,
        /// Page size.
        limit: u32,
    },
    /// Message send.
    SendMessage {
        /// Conversation.
        conversation_id: ConversationId,
        /// Text.
        content: String,
    },
    /// Find-or-create.
    CreateConversation {
        /// Other participant.
        counterparty_id: UserId,
    },
    /// Mark read.
    MarkRead {
        /// Conversation.
        conversation_id: ConversationId,
    },
    /// Unread total.
    UnreadTotal,
}

impl ApiCall {
    /// Endpoint this call hit.
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::Conversations => Endpoint::Conversations,
            Self::Messages { .. } => Endpoint::Messages,
            Self::SendMessage { .. } => Endpoint::SendMessage,
            Self::CreateConversation { .. } => Endpoint::CreateConversation,
            Self::MarkRead { .. } => Endpoint::MarkRead,
            Self::UnreadTotal => Endpoint::UnreadTotal,
        }
    }
}

#[derive(Debug, Default)]
struct Backend {
    conversations: Vec<Conversation>,
    messages: HashMap<ConversationId, Vec<Message>>,
    failures: HashMap<Endpoint, VecDeque<ApiError>>,
    next_id: u64,
}

impl Backend {
    fn conversation_mut(&mut self, id: &ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| &c.id == id)
    }

    fn issue_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn store(&mut self, message: Message, local_user: &UserId) {
        let from_peer = !message.is_from(local_user);
        if let Some(conversation) = self.conversation_mut(&message.conversation_id) {
            conversation.last_message_preview = Some(message.content.clone());
            conversation.last_message_time = Some(message.sent_at);
            if from_peer {
                conversation.unread_count += 1;
            }
        }
        self.messages.entry(message.conversation_id.clone()).or_default().push(message);
    }
}

/// Scriptable in-memory [`Api`].
///
/// Clones share the same backend, so a test can keep a handle after moving
/// one into a session.
#[derive(Debug, Clone)]
pub struct FakeApi {
    env: SimEnv,
    local_user: UserId,
    trace: Trace,
    backend: Arc<Mutex<Backend>>,
}

impl FakeApi {
    /// Backend serving `local_user`, stamping messages with `env`'s clock.
    pub fn new(env: SimEnv, local_user: impl Into<UserId>, trace: Trace) -> Self {
        Self {
            env,
            local_user: local_user.into(),
            trace,
            backend: Arc::new(Mutex::new(Backend::default())),
        }
    }

    fn backend(&self) -> MutexGuard<'_, Backend> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a conversation with `counterparty`. Returns its id.
    pub fn add_conversation(&self, id: &str, counterparty: &str) -> ConversationId {
        let conversation = Conversation::new(id, counterparty, counterparty);
        let id = conversation.id.clone();
        self.backend().conversations.push(conversation);
        id
    }

    /// A peer posts a message. Stored server-side and returned for pushing.
    pub fn post_from(&self, conversation_id: &ConversationId, sender: &str, content: &str) -> Message {
        let mut backend = self.backend();
        let id = backend.issue_id("msg-");
        let message = Message::new(id, conversation_id.clone(), sender, content, self.env.wall_clock());
        backend.store(message.clone(), &self.local_user);
        message
    }

    /// Make the next call to `endpoint` fail with `error`.
    pub fn fail_next(&self, endpoint: Endpoint, error: ApiError) {
        self.backend().failures.entry(endpoint).or_default().push_back(error);
    }

    /// Server-side unread count of a conversation.
    pub fn unread(&self, conversation_id: &ConversationId) -> Option<u32> {
        self.backend()
            .conversations
            .iter()
            .find(|c| &c.id == conversation_id)
            .map(|c| c.unread_count)
    }

    /// Server-side messages of a conversation.
    pub fn stored_messages(&self, conversation_id: &ConversationId) -> Vec<Message> {
        self.backend().messages.get(conversation_id).cloned().unwrap_or_default()
    }

    fn call(&self, call: ApiCall) -> Result<MutexGuard<'_, Backend>, ApiError> {
        let endpoint = call.endpoint();
        self.trace.record(TraceEntry::Api(call));
        let mut backend = self.backend();
        let failure = backend.failures.get_mut(&endpoint).and_then(VecDeque::pop_front);
        match failure {
            Some(error) => {
                tracing::debug!(?endpoint, %error, "scripted failure");
                Err(error)
            },
            None => Ok(backend),
        }
    }
}

#[async_trait]
impl Api for FakeApi {
    async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let backend = self.call(ApiCall::Conversations)?;
        let mut list = backend.conversations.clone();
        list.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
        Ok(list)
    }

    async fn messages(
        &self,
        conversation_id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, ApiError> {
        let backend =
            self.call(ApiCall::Messages { conversation_id: conversation_id.clone(), limit })?;
        let held = backend.messages.get(conversation_id).map_or(&[][..], Vec::as_slice);
        let skip = held.len().saturating_sub(limit as usize);
        Ok(held[skip..].to_vec())
    }

    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        content: &str,
    ) -> Result<Message, ApiError> {
        let mut backend = self.call(ApiCall::SendMessage {
            conversation_id: conversation_id.clone(),
            content: content.to_owned(),
        })?;
        if backend.conversation_mut(conversation_id).is_none() {
            return Err(ApiError::Status { endpoint: "POST /messages".into(), status: 404 });
        }
        let id = MessageId::new(backend.issue_id("msg-"));
        let message = Message::new(
            id,
            conversation_id.clone(),
            self.local_user.clone(),
            content,
            self.env.wall_clock(),
        );
        backend.store(message.clone(), &self.local_user);
        Ok(message)
    }

    async fn create_conversation(
        &self,
        counterparty_id: &UserId,
    ) -> Result<ConversationId, ApiError> {
        let mut backend =
            self.call(ApiCall::CreateConversation { counterparty_id: counterparty_id.clone() })?;
        if let Some(existing) =
            backend.conversations.iter().find(|c| &c.counterparty_id == counterparty_id)
        {
            return Ok(existing.id.clone());
        }
        let id = ConversationId::new(backend.issue_id("conv-"));
        backend.conversations.push(Conversation::new(
            id.clone(),
            counterparty_id.clone(),
            counterparty_id.as_str(),
        ));
        Ok(id)
    }

    async fn mark_read(&self, conversation_id: &ConversationId) -> Result<ConversationId, ApiError> {
        let mut backend =
            self.call(ApiCall::MarkRead { conversation_id: conversation_id.clone() })?;
        let Some(conversation) = backend.conversation_mut(conversation_id) else {
            return Err(ApiError::Status {
                endpoint: "POST /conversations/{id}/read".into(),
                status: 404,
            });
        };
        conversation.unread_count = 0;
        let now = self.env.wall_clock();
        for message in backend.messages.entry(conversation_id.clone()).or_default() {
            if message.read_at.is_none() && !message.is_from(&self.local_user) {
                message.read_at = Some(now);
            }
        }
        Ok(conversation_id.clone())
    }

    async fn unread_total(&self) -> Result<u64, ApiError> {
        let backend = self.call(ApiCall::UnreadTotal)?;
        Ok(backend.conversations.iter().map(|c| u64::from(c.unread_count)).sum())
    }
}
