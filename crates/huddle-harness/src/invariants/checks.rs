//! Standard store checks.

use std::collections::HashSet;

use super::{Invariant, StoreSnapshot, Violation};

/// Conversation ids appear at most once in the list.
pub struct UniqueConversations;

impl Invariant for UniqueConversations {
    fn name(&self) -> &'static str {
        "unique_conversations"
    }

    fn check(&self, state: &StoreSnapshot) -> Vec<Violation> {
        let mut seen = HashSet::new();
        state
            .conversations
            .iter()
            .filter(|conversation| !seen.insert(&conversation.id))
            .map(|conversation| {
                Violation::in_conversation(self.name(), &conversation.id, "listed twice")
            })
            .collect()
    }
}

/// The list is ordered by last activity, newest first, empty ones last.
pub struct ConversationsByRecency;

impl Invariant for ConversationsByRecency {
    fn name(&self) -> &'static str {
        "conversations_by_recency"
    }

    fn check(&self, state: &StoreSnapshot) -> Vec<Violation> {
        state
            .conversations
            .windows(2)
            .filter(|pair| pair[0].last_message_time < pair[1].last_message_time)
            .map(|pair| {
                Violation::in_list(
                    self.name(),
                    format!("{} listed above more recent {}", pair[0].id, pair[1].id),
                )
            })
            .collect()
    }
}

/// Message ids are unique within a conversation.
pub struct UniqueMessageIds;

impl Invariant for UniqueMessageIds {
    fn name(&self) -> &'static str {
        "unique_message_ids"
    }

    fn check(&self, state: &StoreSnapshot) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (conversation_id, messages) in &state.threads {
            let mut seen = HashSet::new();
            for message in messages.iter().filter(|m| !seen.insert(&m.id)) {
                violations.push(Violation::in_conversation(
                    self.name(),
                    conversation_id,
                    format!("{} held twice", message.id),
                ));
            }
        }
        violations
    }
}

/// Messages are ordered by `(sent_at, id)` ascending.
pub struct MessagesOrdered;

impl Invariant for MessagesOrdered {
    fn name(&self) -> &'static str {
        "messages_ordered"
    }

    fn check(&self, state: &StoreSnapshot) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (conversation_id, messages) in &state.threads {
            for pair in messages.windows(2) {
                if (pair[0].sent_at, &pair[0].id) > (pair[1].sent_at, &pair[1].id) {
                    violations.push(Violation::in_conversation(
                        self.name(),
                        conversation_id,
                        format!("{} shown before earlier {}", pair[0].id, pair[1].id),
                    ));
                }
            }
        }
        violations
    }
}

/// Every held message belongs to the thread it is held in.
pub struct MessagesInOwnThread;

impl Invariant for MessagesInOwnThread {
    fn name(&self) -> &'static str {
        "messages_in_own_thread"
    }

    fn check(&self, state: &StoreSnapshot) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (conversation_id, messages) in &state.threads {
            for stray in messages.iter().filter(|m| &m.conversation_id != conversation_id) {
                violations.push(Violation::in_conversation(
                    self.name(),
                    conversation_id,
                    format!("holds {} from {}", stray.id, stray.conversation_id),
                ));
            }
        }
        violations
    }
}

/// The focused conversation shows no unread messages.
pub struct FocusedIsRead;

impl Invariant for FocusedIsRead {
    fn name(&self) -> &'static str {
        "focused_is_read"
    }

    fn check(&self, state: &StoreSnapshot) -> Vec<Violation> {
        let Some(focused) = state.focused.as_ref() else {
            return Vec::new();
        };
        state
            .conversation(focused)
            .filter(|conversation| conversation.unread_count > 0)
            .map(|conversation| {
                Violation::in_conversation(
                    self.name(),
                    focused,
                    format!("shows {} unread while focused", conversation.unread_count),
                )
            })
            .into_iter()
            .collect()
    }
}
