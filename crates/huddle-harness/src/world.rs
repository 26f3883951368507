//! A session wired to simulated collaborators.

use std::time::Duration;

use huddle_client::{Session, SessionConfig, StaticToken};
use huddle_proto::{ConversationId, Message, ServerEvent, TypingPayload};

use crate::{FakeApi, InvariantRegistry, RecordingOutbox, SimEnv, StoreSnapshot, Trace};

/// Session type driven by the harness.
pub type SimSession = Session<FakeApi, SimEnv, RecordingOutbox>;

/// Session, backend, clock and trace for one simulated user.
pub struct World {
    /// Virtual clock shared with the session and backend.
    pub env: SimEnv,
    /// Backend handle shared with the session.
    pub api: FakeApi,
    /// REST calls and wire actions in order.
    pub trace: Trace,
    /// The session under test.
    pub session: SimSession,
    invariants: InvariantRegistry,
}

impl World {
    /// Fresh world for `local_user` with default tunables.
    pub fn new(local_user: &str) -> Self {
        Self::with_config(SessionConfig::new(local_user))
    }

    /// Fresh world with explicit tunables.
    pub fn with_config(config: SessionConfig) -> Self {
        let env = SimEnv::new();
        let trace = Trace::new();
        let api = FakeApi::new(env.clone(), config.local_user.clone(), trace.clone());
        let session = Session::new(
            env.clone(),
            api.clone(),
            RecordingOutbox::new(trace.clone()),
            config,
        );
        Self { env, api, trace, session, invariants: InvariantRegistry::standard() }
    }

    /// Connect and complete the handshake, then clear the trace.
    pub fn connect(&mut self) {
        self.session.connect(&StaticToken::new("test-token"));
        self.session.transport_opened();
        self.trace.drain();
    }

    /// Advance the clock and tick the session.
    pub fn advance(&mut self, by: Duration) {
        self.env.advance(by);
        self.session.handle_tick();
    }

    /// Push a message as if it arrived on the socket.
    pub async fn push_message(&mut self, message: Message) {
        self.session.handle_event(ServerEvent::ReceiveMessage(message)).await;
    }

    /// Push a peer's typing state.
    pub async fn push_typing(&mut self, conversation_id: &ConversationId, user: &str, typing: bool) {
        self.session
            .handle_event(ServerEvent::UserTyping(TypingPayload {
                conversation_id: conversation_id.clone(),
                user_id: user.into(),
                typing,
            }))
            .await;
    }

    /// Current observable state.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot::of_session(&self.session)
    }

    /// Panic if any standard invariant is violated.
    pub fn assert_invariants(&self, context: &str) {
        self.invariants.assert_all(&self.snapshot(), context);
    }
}
