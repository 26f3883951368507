//! Conversation and message ledger.
//!
//! [`MessageStore`] is the single source of truth the UI reads from. History
//! fetches, send responses and pushed messages all arrive here through the
//! same handful of mutation methods, so the two delivery paths converge on
//! one state no matter which lands first.
//!
//! # Invariants
//!
//! - Conversation ids are unique in the list.
//! - The list is ordered by `last_message_time` descending, empty
//!   conversations last.
//! - Within a conversation, message ids are unique and messages are ordered
//!   ascending by `(sent_at, id)` regardless of arrival order.
//! - `last_message_time` never moves backwards through an append.

use std::collections::{HashMap, HashSet};

use huddle_proto::{Conversation, ConversationId, Message, MessageId, Timestamp, UserId};

/// Result of [`MessageStore::append_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Message was new and is now stored.
    Appended,
    /// A message with the same id was already held. Nothing changed.
    DuplicateIgnored,
    /// The message names a different conversation than the one it was
    /// appended to. Nothing changed.
    Misrouted,
}

impl AppendOutcome {
    /// Whether the store changed.
    pub fn is_appended(self) -> bool {
        self == Self::Appended
    }
}

/// Messages of one conversation: a set keyed by id, projected in time order.
#[derive(Debug, Clone, Default)]
struct Thread {
    ids: HashSet<MessageId>,
    messages: Vec<Message>,
}

impl Thread {
    fn from_messages(messages: Vec<Message>) -> Self {
        let mut thread = Self::default();
        for message in messages {
            thread.insert(message);
        }
        thread
    }

    fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    /// Insert at its ordered position. Returns `false` for a known id.
    fn insert(&mut self, message: Message) -> bool {
        if !self.ids.insert(message.id.clone()) {
            return false;
        }
        let at = self
            .messages
            .partition_point(|held| (held.sent_at, &held.id) <= (message.sent_at, &message.id));
        self.messages.insert(at, message);
        true
    }
}

/// In-memory ledger of conversations and their messages.
///
/// Owned by the session; everything else holds `&MessageStore`.
#[derive(Debug, Clone)]
pub struct MessageStore {
    /// Messages from this user never count as unread.
    local_user: UserId,
    /// Visible conversation list, newest activity first.
    conversations: Vec<Conversation>,
    /// Loaded messages per conversation.
    threads: HashMap<ConversationId, Thread>,
}

impl MessageStore {
    /// Create an empty store for `local_user`.
    pub fn new(local_user: impl Into<UserId>) -> Self {
        Self { local_user: local_user.into(), conversations: Vec::new(), threads: HashMap::new() }
    }

    /// User whose own messages never raise unread counts.
    pub fn local_user(&self) -> &UserId {
        &self.local_user
    }

    /// Replace the conversation list after a full list fetch.
    ///
    /// Accepts any order. Later duplicates of an id are dropped. Loaded
    /// messages are left alone.
    pub fn replace_conversations(&mut self, list: Vec<Conversation>) {
        let mut seen = HashSet::with_capacity(list.len());
        let mut conversations = Vec::with_capacity(list.len());
        for conversation in list {
            if seen.insert(conversation.id.clone()) {
                conversations.push(conversation);
            } else {
                tracing::debug!(conversation_id = %conversation.id, "duplicate conversation in list");
            }
        }
        conversations.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
        self.conversations = conversations;
    }

    /// Insert a conversation, or overwrite the entry with the same id.
    pub fn upsert_conversation(&mut self, conversation: Conversation) {
        if let Some(index) = self.position(&conversation.id) {
            self.conversations.remove(index);
        }
        self.place(conversation);
    }

    /// Replace one conversation's messages after a history fetch.
    ///
    /// The fetched window is authoritative: previously held messages are
    /// discarded. Unread counts are not touched. The conversation summary is
    /// refreshed if the history holds a message newer than it knows about.
    pub fn set_conversation_messages(
        &mut self,
        conversation_id: &ConversationId,
        messages: Vec<Message>,
    ) {
        let (kept, foreign): (Vec<_>, Vec<_>) =
            messages.into_iter().partition(|m| &m.conversation_id == conversation_id);
        if !foreign.is_empty() {
            tracing::warn!(
                %conversation_id,
                dropped = foreign.len(),
                "history contained messages from other conversations"
            );
        }

        let thread = Thread::from_messages(kept);
        let newest = thread.messages.last().map(|m| (m.sent_at, m.content.clone()));
        self.threads.insert(conversation_id.clone(), thread);

        if let Some((sent_at, preview)) = newest {
            self.advance_summary(conversation_id, sent_at, preview);
        }
    }

    /// Append one message from a send response or a push.
    ///
    /// Idempotent by message id. A new message from anyone but the local
    /// user raises the conversation's unread count by one. The summary and
    /// list position follow the message unless it is older than what the
    /// summary already shows.
    pub fn append_message(
        &mut self,
        conversation_id: &ConversationId,
        message: Message,
    ) -> AppendOutcome {
        if &message.conversation_id != conversation_id {
            tracing::warn!(
                %conversation_id,
                message_conversation = %message.conversation_id,
                message_id = %message.id,
                "message appended to the wrong conversation"
            );
            return AppendOutcome::Misrouted;
        }

        let thread = self.threads.entry(conversation_id.clone()).or_default();
        if thread.contains(&message.id) {
            tracing::trace!(%conversation_id, message_id = %message.id, "duplicate message ignored");
            return AppendOutcome::DuplicateIgnored;
        }

        let from_peer = !message.is_from(&self.local_user);
        let sent_at = message.sent_at;
        let preview = message.content.clone();
        thread.insert(message);

        if from_peer && let Some(index) = self.position(conversation_id) {
            let conversation = &mut self.conversations[index];
            conversation.unread_count = conversation.unread_count.saturating_add(1);
        }
        self.advance_summary(conversation_id, sent_at, preview);

        AppendOutcome::Appended
    }

    /// Mark a conversation read locally.
    ///
    /// Clears the unread count and stamps `read_at = now` on every held
    /// message that has no stamp yet. Returns how many messages were stamped.
    pub fn mark_conversation_read(
        &mut self,
        conversation_id: &ConversationId,
        now: Timestamp,
    ) -> usize {
        if let Some(index) = self.position(conversation_id) {
            self.conversations[index].unread_count = 0;
        }

        let Some(thread) = self.threads.get_mut(conversation_id) else {
            return 0;
        };
        let mut stamped = 0;
        // First read wins; re-reading a thread never moves an existing stamp.
        for message in thread.messages.iter_mut().filter(|m| m.read_at.is_none()) {
            message.read_at = Some(now);
            stamped += 1;
        }
        stamped
    }

    /// Loaded messages in display order. Empty if none are loaded.
    pub fn messages(&self, conversation_id: &ConversationId) -> &[Message] {
        self.threads.get(conversation_id).map_or(&[], |thread| thread.messages.as_slice())
    }

    /// Whether a history window or any message has been loaded.
    pub fn has_messages(&self, conversation_id: &ConversationId) -> bool {
        self.threads.contains_key(conversation_id)
    }

    /// Every loaded thread, in no particular order.
    pub fn threads(&self) -> impl Iterator<Item = (&ConversationId, &[Message])> {
        self.threads.iter().map(|(id, thread)| (id, thread.messages.as_slice()))
    }

    /// Conversation list, newest activity first.
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// One conversation's summary. `None` if it is not in the list.
    pub fn conversation(&self, conversation_id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == conversation_id)
    }

    /// Sum of unread counts across the list.
    pub fn total_unread(&self) -> u64 {
        self.conversations.iter().map(|c| u64::from(c.unread_count)).sum()
    }

    fn position(&self, conversation_id: &ConversationId) -> Option<usize> {
        self.conversations.iter().position(|c| &c.id == conversation_id)
    }

    /// Move the summary forward and promote the conversation, unless `sent_at`
    /// is older than what it already shows.
    fn advance_summary(
        &mut self,
        conversation_id: &ConversationId,
        sent_at: Timestamp,
        preview: String,
    ) {
        let Some(index) = self.position(conversation_id) else {
            return;
        };
        if self.conversations[index].last_message_time.is_some_and(|last| sent_at < last) {
            return;
        }

        let mut conversation = self.conversations.remove(index);
        conversation.last_message_preview = Some(preview);
        conversation.last_message_time = Some(sent_at);
        self.place(conversation);
    }

    /// Insert ahead of every conversation with the same or older activity.
    fn place(&mut self, conversation: Conversation) {
        let at = self
            .conversations
            .iter()
            .position(|c| c.last_message_time <= conversation.last_message_time)
            .unwrap_or(self.conversations.len());
        self.conversations.insert(at, conversation);
    }
}
