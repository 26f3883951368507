//! Typing indicators.
//!
//! Two halves share this module. [`TypingCoordinator`] debounces the local
//! user's keystrokes into at most one `typing=true` per burst and a single
//! `typing=false` once the user pauses or leaves. [`TypingSet`] is the
//! side-table of remote users currently typing, kept apart from any state
//! that gets snapshotted.
//!
//! Both are advisory: no acknowledgement, retry or persistence. Time is
//! passed in, so the timers are just comparisons against the last input.

use std::{
    collections::{HashMap, HashSet},
    ops::Sub,
    time::Duration,
};

use huddle_proto::{ConversationId, UserId};

/// Quiet window after the last keystroke before `typing=false` is sent.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_secs(2);

/// How long a remote `typing=true` is trusted without a follow-up.
pub const DEFAULT_REMOTE_TYPING_TTL: Duration = Duration::from_secs(5);

/// Local typing state change to put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingSignal {
    /// Conversation the signal is for.
    pub conversation_id: ConversationId,
    /// `true` at burst start, `false` at burst end.
    pub typing: bool,
}

impl TypingSignal {
    fn started(conversation_id: ConversationId) -> Self {
        Self { conversation_id, typing: true }
    }

    fn stopped(conversation_id: ConversationId) -> Self {
        Self { conversation_id, typing: false }
    }
}

#[derive(Debug, Clone)]
struct Burst<I> {
    conversation_id: ConversationId,
    last_input: I,
}

/// Debounces local input into typing signals.
///
/// At most one burst is active at a time, since the user types into one
/// conversation at a time.
#[derive(Debug, Clone)]
pub struct TypingCoordinator<I> {
    quiet_window: Duration,
    burst: Option<Burst<I>>,
}

impl<I> TypingCoordinator<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create an idle coordinator.
    pub fn new(quiet_window: Duration) -> Self {
        Self { quiet_window, burst: None }
    }

    /// Record a local input change.
    ///
    /// Starts a burst (emitting `typing=true`) unless one is already running
    /// for this conversation, in which case only the quiet window restarts.
    /// Typing into a different conversation first ends the old burst.
    pub fn input_changed(&mut self, conversation_id: &ConversationId, now: I) -> Vec<TypingSignal> {
        if let Some(burst) = self.burst.as_mut()
            && &burst.conversation_id == conversation_id
        {
            burst.last_input = now;
            return Vec::new();
        }

        let mut signals = Vec::with_capacity(2);
        if let Some(previous) = self.burst.take() {
            signals.push(TypingSignal::stopped(previous.conversation_id));
        }
        self.burst = Some(Burst { conversation_id: conversation_id.clone(), last_input: now });
        signals.push(TypingSignal::started(conversation_id.clone()));
        signals
    }

    /// Fire the quiet-window timer if it has elapsed.
    pub fn tick(&mut self, now: I) -> Option<TypingSignal> {
        let expired = self
            .burst
            .as_ref()
            .is_some_and(|burst| now - burst.last_input >= self.quiet_window);
        if !expired {
            return None;
        }
        self.burst.take().map(|burst| TypingSignal::stopped(burst.conversation_id))
    }

    /// Leave a conversation.
    ///
    /// Always yields `typing=false` for it, whatever the timer state, and
    /// cancels its burst so the timer cannot fire a second one.
    pub fn leave(&mut self, conversation_id: &ConversationId) -> TypingSignal {
        if self.burst.as_ref().is_some_and(|burst| &burst.conversation_id == conversation_id) {
            self.burst = None;
        }
        TypingSignal::stopped(conversation_id.clone())
    }

    /// Conversation with a running burst, if any.
    pub fn active_conversation(&self) -> Option<&ConversationId> {
        self.burst.as_ref().map(|burst| &burst.conversation_id)
    }
}

/// Remote users currently typing, per conversation.
///
/// Entries leave the set on an explicit `typing=false` or when their TTL
/// lapses, whichever comes first.
#[derive(Debug, Clone)]
pub struct TypingSet<I> {
    ttl: Duration,
    entries: HashMap<ConversationId, HashMap<UserId, I>>,
}

impl<I> TypingSet<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create an empty set whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: HashMap::new() }
    }

    /// Apply a remote typing update. Returns `true` if membership changed.
    pub fn apply(
        &mut self,
        conversation_id: &ConversationId,
        user_id: &UserId,
        typing: bool,
        now: I,
    ) -> bool {
        if typing {
            self.entries
                .entry(conversation_id.clone())
                .or_default()
                .insert(user_id.clone(), now)
                .is_none()
        } else {
            let Some(users) = self.entries.get_mut(conversation_id) else {
                return false;
            };
            let removed = users.remove(user_id).is_some();
            if users.is_empty() {
                self.entries.remove(conversation_id);
            }
            removed
        }
    }

    /// Drop entries older than the TTL. Returns conversations that changed.
    pub fn expire(&mut self, now: I) -> Vec<ConversationId> {
        let mut changed = HashSet::new();
        for (conversation_id, users) in &mut self.entries {
            let before = users.len();
            users.retain(|_, seen| now - *seen < self.ttl);
            if users.len() != before {
                changed.insert(conversation_id.clone());
            }
        }
        self.entries.retain(|_, users| !users.is_empty());
        changed.into_iter().collect()
    }

    /// Forget everyone typing in a conversation. Returns `true` if anyone was.
    pub fn clear(&mut self, conversation_id: &ConversationId) -> bool {
        self.entries.remove(conversation_id).is_some()
    }

    /// Users typing in a conversation, in no particular order.
    pub fn users(&self, conversation_id: &ConversationId) -> impl Iterator<Item = &UserId> {
        self.entries.get(conversation_id).into_iter().flat_map(HashMap::keys)
    }

    /// Whether anyone other than `local_user` is typing.
    pub fn is_peer_typing(&self, conversation_id: &ConversationId, local_user: &UserId) -> bool {
        self.users(conversation_id).any(|user| user != local_user)
    }
}
