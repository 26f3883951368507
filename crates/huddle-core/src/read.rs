//! Read/unread tracking.
//!
//! The store counts every peer message as unread. This tracker knows which
//! conversation the user is looking at and cancels that out: whenever a
//! message lands in the focused conversation it is marked read straight
//! away, so the badge for an open chat never drifts above zero.

use huddle_proto::{ConversationId, Timestamp};

use crate::{AppendOutcome, MessageStore};

/// Tracks the focused conversation and keeps its unread count at zero.
#[derive(Debug, Clone, Default)]
pub struct ReadTracker {
    focused: Option<ConversationId>,
}

impl ReadTracker {
    /// Create a tracker with nothing focused.
    pub fn new() -> Self {
        Self::default()
    }

    /// Focus a conversation. Returns the previously focused one.
    pub fn focus(&mut self, conversation_id: ConversationId) -> Option<ConversationId> {
        self.focused.replace(conversation_id)
    }

    /// Drop focus if `conversation_id` holds it. Returns `true` if it did.
    pub fn blur(&mut self, conversation_id: &ConversationId) -> bool {
        if self.is_focused(conversation_id) {
            self.focused = None;
            true
        } else {
            false
        }
    }

    /// Currently focused conversation.
    pub fn focused(&self) -> Option<&ConversationId> {
        self.focused.as_ref()
    }

    /// Whether `conversation_id` is focused.
    pub fn is_focused(&self, conversation_id: &ConversationId) -> bool {
        self.focused.as_ref() == Some(conversation_id)
    }

    /// Follow an append with a mark-read when its conversation is focused.
    ///
    /// Returns `true` if the conversation was marked read locally. Duplicate
    /// and misrouted appends change nothing and never mark.
    pub fn after_append(
        &self,
        store: &mut MessageStore,
        conversation_id: &ConversationId,
        outcome: AppendOutcome,
        now: Timestamp,
    ) -> bool {
        if !outcome.is_appended() || !self.is_focused(conversation_id) {
            return false;
        }
        store.mark_conversation_read(conversation_id, now);
        true
    }
}
