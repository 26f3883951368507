//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of a session at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use std::collections::BTreeMap;

use huddle_client::{Api, Environment, Outbox, Session};
use huddle_core::MessageStore;
use huddle_proto::{Conversation, ConversationId, Message};
use serde::Serialize;

/// Snapshot of a store and the conversation in focus.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreSnapshot {
    /// Focused conversation, if any.
    pub focused: Option<ConversationId>,
    /// Conversation list in display order.
    pub conversations: Vec<Conversation>,
    /// Loaded messages per conversation, in display order.
    pub threads: BTreeMap<ConversationId, Vec<Message>>,
}

impl StoreSnapshot {
    /// Create an empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture a bare store.
    pub fn of(store: &MessageStore, focused: Option<&ConversationId>) -> Self {
        Self {
            focused: focused.cloned(),
            conversations: store.conversations().to_vec(),
            threads: store.threads().map(|(id, messages)| (id.clone(), messages.to_vec())).collect(),
        }
    }

    /// Capture a session's store and focus.
    pub fn of_session<A, E, O>(session: &Session<A, E, O>) -> Self
    where
        A: Api,
        E: Environment,
        O: Outbox,
    {
        Self::of(session.store(), session.focused())
    }

    /// Summary of one conversation.
    pub fn conversation(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }
}
