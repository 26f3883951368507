//! Store invariants checked against snapshots.
//!
//! A check walks a [`StoreSnapshot`] and reports every conversation that
//! breaks it, not just the first. Failures are grouped by conversation in
//! the [`Report`], so a failing simulation step names the thread to look at.
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let report = registry.check(&StoreSnapshot::of_session(&session));
//! assert!(report.is_clean(), "{report}");
//! ```

mod checks;
mod snapshot;

use std::{collections::BTreeMap, fmt};

pub use checks::{
    ConversationsByRecency, FocusedIsRead, MessagesInOwnThread, MessagesOrdered,
    UniqueConversations, UniqueMessageIds,
};
use huddle_proto::ConversationId;
pub use snapshot::StoreSnapshot;

/// One broken rule, optionally pinned to a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Name of the broken invariant.
    pub invariant: &'static str,
    /// Conversation the failure was found in. `None` when the failure is
    /// about the conversation list as a whole.
    pub conversation: Option<ConversationId>,
    /// What was observed.
    pub message: String,
}

impl Violation {
    /// Failure in the conversation list itself.
    pub fn in_list(invariant: &'static str, message: impl Into<String>) -> Self {
        Self { invariant, conversation: None, message: message.into() }
    }

    /// Failure inside one conversation.
    pub fn in_conversation(
        invariant: &'static str,
        conversation: &ConversationId,
        message: impl Into<String>,
    ) -> Self {
        Self { invariant, conversation: Some(conversation.clone()), message: message.into() }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.conversation {
            Some(conversation) => write!(f, "{} [{conversation}]: {}", self.invariant, self.message),
            None => write!(f, "{}: {}", self.invariant, self.message),
        }
    }
}

impl std::error::Error for Violation {}

/// A property every reachable store state has.
pub trait Invariant: Send + Sync {
    /// Name used in reports.
    fn name(&self) -> &'static str;

    /// Every violation found in `state`. Empty when the property holds.
    fn check(&self, state: &StoreSnapshot) -> Vec<Violation>;
}

/// Outcome of running a registry over one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    violations: Vec<Violation>,
}

impl Report {
    /// True when nothing was violated.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// All violations in check order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Conversations with at least one violation, in id order.
    pub fn conversations(&self) -> Vec<&ConversationId> {
        let mut ids: Vec<_> =
            self.violations.iter().filter_map(|v| v.conversation.as_ref()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Violations found in one conversation.
    pub fn for_conversation<'a>(
        &'a self,
        conversation: &'a ConversationId,
    ) -> impl Iterator<Item = &'a Violation> + 'a {
        self.violations.iter().filter(move |v| v.conversation.as_ref() == Some(conversation))
    }
}

impl fmt::Display for Report {
    /// List-level failures first, then one block per conversation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut grouped: BTreeMap<Option<&ConversationId>, Vec<&Violation>> = BTreeMap::new();
        for violation in &self.violations {
            grouped.entry(violation.conversation.as_ref()).or_default().push(violation);
        }

        for (conversation, violations) in grouped {
            match conversation {
                Some(id) => writeln!(f, "conversation {id}:")?,
                None => writeln!(f, "conversation list:")?,
            }
            for violation in violations {
                writeln!(f, "  {}: {}", violation.invariant, violation.message)?;
            }
        }
        Ok(())
    }
}

/// The set of invariants a test checks after each step.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// Every store invariant:
    /// - [`UniqueConversations`]: no conversation listed twice
    /// - [`ConversationsByRecency`]: newest activity first
    /// - [`UniqueMessageIds`]: no message held twice
    /// - [`MessagesOrdered`]: messages in `(sent_at, id)` order
    /// - [`MessagesInOwnThread`]: no message filed under another conversation
    /// - [`FocusedIsRead`]: the open conversation shows nothing unread
    pub fn standard() -> Self {
        Self { invariants: Vec::new() }
            .with(UniqueConversations)
            .with(ConversationsByRecency)
            .with(UniqueMessageIds)
            .with(MessagesOrdered)
            .with(MessagesInOwnThread)
            .with(FocusedIsRead)
    }

    /// Add an invariant.
    #[must_use]
    pub fn with<I: Invariant + 'static>(mut self, invariant: I) -> Self {
        self.invariants.push(Box::new(invariant));
        self
    }

    /// Run every invariant over `state`.
    pub fn check(&self, state: &StoreSnapshot) -> Report {
        Report {
            violations: self.invariants.iter().flat_map(|inv| inv.check(state)).collect(),
        }
    }

    /// Panic with the grouped report if anything is violated.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &StoreSnapshot, context: &str) {
        let report = self.check(state);
        if !report.is_clean() {
            let names: Vec<_> = report.conversations().iter().map(ToString::to_string).collect();
            panic!(
                "store invariants broken {context} (conversations: [{}])\n{report}",
                names.join(", ")
            );
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// True when no invariant is registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};
    use huddle_proto::{Conversation, Message};

    use super::*;

    fn broken_state() -> StoreSnapshot {
        let now = Utc::now();
        let mut unread = Conversation::new("c2", "bob", "Bob");
        unread.unread_count = 1;

        let mut state = StoreSnapshot {
            focused: Some("c2".into()),
            conversations: vec![Conversation::new("c1", "alice", "Alice"), unread],
            ..StoreSnapshot::empty()
        };
        state.threads.insert("c1".into(), vec![
            Message::new("m2", "c1", "alice", "second", now + TimeDelta::seconds(1)),
            Message::new("m1", "c1", "alice", "first", now),
        ]);
        state.threads.insert("c3".into(), vec![Message::new("m3", "c1", "alice", "stray", now)]);
        state
    }

    #[test]
    fn standard_registry_has_every_check() {
        assert_eq!(InvariantRegistry::standard().len(), 6);
    }

    #[test]
    fn empty_snapshot_is_clean() {
        let report = InvariantRegistry::standard().check(&StoreSnapshot::empty());
        assert!(report.is_clean());
        assert_eq!(report.to_string(), "");
    }

    #[test]
    fn report_names_every_broken_conversation() {
        let report = InvariantRegistry::standard().check(&broken_state());

        let c1 = ConversationId::from("c1");
        assert_eq!(report.conversations(), vec![&c1, &"c2".into(), &"c3".into()]);
        assert_eq!(report.for_conversation(&c1).map(|v| v.invariant).collect::<Vec<_>>(), vec![
            "messages_ordered"
        ]);
    }

    #[test]
    fn report_groups_by_conversation() {
        let report = InvariantRegistry::standard().check(&broken_state());

        insta::assert_snapshot!(report.to_string().trim_end(), @r"
        conversation c1:
          messages_ordered: m2 shown before earlier m1
        conversation c2:
          focused_is_read: shows 1 unread while focused
        conversation c3:
          messages_in_own_thread: holds m3 from c1
        ");
    }

    #[test]
    #[should_panic(expected = "conversations: [c1, c2, c3]")]
    fn assert_all_names_conversations() {
        InvariantRegistry::standard().assert_all(&broken_state(), "in test");
    }
}
