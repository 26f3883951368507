//! Session orchestration.
//!
//! [`Session`] ties the core state machines to the two collaborators: the
//! REST [`Api`] for durable state and the live channel (via an [`Outbox`])
//! for hints. It is the single owner of all conversation state. Every
//! method takes `&mut self`, so one operation finishes its mutations before
//! the next begins, and pushes that arrive while a REST call is pending
//! wait in the driver's queue until it completes.
//!
//! Changes observable by a UI are queued as [`SessionUpdate`]s and drained
//! with [`Session::take_updates`].

use huddle_core::{Environment, MessageStore, ReadTracker, TypingCoordinator, TypingSet};
use huddle_proto::{ConversationId, Message, ServerEvent, TypingPayload, UserId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    Api, ClientError, HandlerResult, Outbox, SessionConfig, SubscriptionToken, TokenProvider,
    Transport, TransportAction, TransportState,
};

/// Something a UI may want to redraw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Conversation list order, previews or unread counts changed.
    ConversationsChanged,
    /// Messages of one conversation changed.
    MessagesChanged(ConversationId),
    /// Remote typing state of one conversation changed.
    TypingChanged(ConversationId),
    /// Live channel moved to a new state.
    ConnectionChanged(TransportState),
    /// Server rejected a live-channel message.
    ServerError(String),
}

/// One signed-in user's synchronized view of their conversations.
pub struct Session<A, E: Environment, O = mpsc::UnboundedSender<TransportAction>> {
    env: E,
    api: A,
    outbox: O,
    config: SessionConfig,
    store: MessageStore,
    transport: Transport,
    typing: TypingCoordinator<E::Instant>,
    peers_typing: TypingSet<E::Instant>,
    reads: ReadTracker,
    reported: TransportState,
    updates: Vec<SessionUpdate>,
}

impl<A, E, O> Session<A, E, O>
where
    A: Api,
    E: Environment,
    O: Outbox,
{
    /// Create a session. Nothing is fetched and no socket is opened yet.
    pub fn new(env: E, api: A, outbox: O, config: SessionConfig) -> Self {
        Self {
            store: MessageStore::new(config.local_user.clone()),
            typing: TypingCoordinator::new(config.typing_quiet_window),
            peers_typing: TypingSet::new(config.remote_typing_ttl),
            transport: Transport::new(),
            reads: ReadTracker::new(),
            reported: TransportState::Disconnected,
            updates: Vec::new(),
            env,
            api,
            outbox,
            config,
        }
    }

    /// The signed-in user.
    pub fn local_user(&self) -> &UserId {
        &self.config.local_user
    }

    /// Conversation and message state.
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Live channel state.
    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    /// Conversation currently open, if any.
    pub fn focused(&self) -> Option<&ConversationId> {
        self.reads.focused()
    }

    /// Whether someone other than the local user is typing in a conversation.
    pub fn is_peer_typing(&self, conversation_id: &ConversationId) -> bool {
        self.peers_typing.is_peer_typing(conversation_id, &self.config.local_user)
    }

    /// Remote users typing in a conversation, excluding the local user.
    pub fn typing_peers(&self, conversation_id: &ConversationId) -> Vec<&UserId> {
        let mut peers: Vec<_> = self
            .peers_typing
            .users(conversation_id)
            .filter(|user| **user != self.config.local_user)
            .collect();
        peers.sort();
        peers
    }

    /// Collaborator access, mostly for tests.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Drain queued UI updates.
    pub fn take_updates(&mut self) -> Vec<SessionUpdate> {
        std::mem::take(&mut self.updates)
    }

    /// Open the live channel if a credential is available.
    pub fn connect(&mut self, credentials: &dyn TokenProvider) {
        let actions = self.transport.connect(credentials);
        self.flush(actions);
        self.note_connection();
    }

    /// The driver opened the socket.
    pub fn transport_opened(&mut self) {
        let actions = self.transport.opened();
        self.flush(actions);
        self.note_connection();
    }

    /// The socket closed or could not be opened.
    pub fn transport_closed(&mut self, reason: &str) {
        self.transport.closed(reason);
        self.note_connection();
    }

    /// Close the live channel on purpose.
    pub fn disconnect(&mut self) {
        let actions = self.transport.disconnect();
        self.flush(actions);
        self.note_connection();
    }

    /// Reload the conversation list from the server.
    ///
    /// On failure the previous list is kept.
    pub async fn refresh_conversations(&mut self) -> Result<(), ClientError> {
        let list = self.api.conversations().await?;
        debug!(count = list.len(), "conversation list loaded");
        self.store.replace_conversations(list);
        self.updates.push(SessionUpdate::ConversationsChanged);

        // The server may count messages that landed in the open conversation
        // between our last mark-read and this snapshot.
        if let Some(focused) = self.reads.focused().cloned()
            && self.store.conversation(&focused).is_some_and(|c| c.unread_count > 0)
        {
            self.store.mark_conversation_read(&focused, self.env.wall_clock());
            self.acknowledge(&focused).await;
        }
        Ok(())
    }

    /// Find or create the conversation with `counterparty_id`.
    ///
    /// Reloads the list when the conversation is new to this session.
    pub async fn start_conversation(
        &mut self,
        counterparty_id: &UserId,
    ) -> Result<ConversationId, ClientError> {
        let conversation_id = self.api.create_conversation(counterparty_id).await?;
        if self.store.conversation(&conversation_id).is_none() {
            self.refresh_conversations().await?;
        }
        Ok(conversation_id)
    }

    /// Open a conversation for reading.
    ///
    /// Joins the room first so nothing pushed during the history fetch is
    /// lost, then replaces the cached messages with the fetched history and
    /// marks everything read, locally and on the server.
    ///
    /// If the history fetch fails the previous focus and room are restored.
    /// The server-side mark-read is best effort: once history is loaded the
    /// open has succeeded.
    pub async fn open_conversation(
        &mut self,
        conversation_id: &ConversationId,
    ) -> Result<(), ClientError> {
        let previous = self.reads.focus(conversation_id.clone());
        let switched = previous.as_ref() != Some(conversation_id);
        if switched && let Some(previous) = &previous {
            self.release(previous);
        }
        let actions = self.transport.join(conversation_id);
        self.flush(actions);

        let history = match self.api.messages(conversation_id, self.config.history_limit).await {
            Ok(history) => history,
            Err(error) => {
                if switched {
                    self.restore_focus(conversation_id, previous);
                }
                return Err(error.into());
            },
        };
        info!(conversation = %conversation_id, count = history.len(), "history loaded");
        self.store.set_conversation_messages(conversation_id, history);
        self.store.mark_conversation_read(conversation_id, self.env.wall_clock());
        self.updates.push(SessionUpdate::MessagesChanged(conversation_id.clone()));
        self.updates.push(SessionUpdate::ConversationsChanged);

        self.acknowledge(conversation_id).await;
        Ok(())
    }

    fn restore_focus(&mut self, failed: &ConversationId, previous: Option<ConversationId>) {
        debug!(conversation = %failed, "open failed, restoring focus");
        self.close_conversation(failed);
        if let Some(previous) = previous {
            let actions = self.transport.join(&previous);
            self.flush(actions);
            self.reads.focus(previous);
        }
    }

    /// Close a conversation.
    ///
    /// Stops any local typing burst in it, leaves the room and drops focus.
    /// UI handlers registered for it are unregistered by their owners.
    pub fn close_conversation(&mut self, conversation_id: &ConversationId) {
        if self.reads.blur(conversation_id) {
            self.release(conversation_id);
        }
    }

    fn release(&mut self, conversation_id: &ConversationId) {
        let signal = self.typing.leave(conversation_id);
        let mut actions =
            self.transport.send_typing(&signal.conversation_id, &self.config.local_user, false);
        actions.extend(self.transport.leave(conversation_id));
        self.flush(actions);
        if self.peers_typing.clear(conversation_id) {
            self.updates.push(SessionUpdate::TypingChanged(conversation_id.clone()));
        }
    }

    /// Send a message.
    ///
    /// The REST call is authoritative. Its response is appended to the
    /// store, and the live-channel intent follows as a hint. A push echo of
    /// the same message is later ignored by id.
    pub async fn send_message(
        &mut self,
        conversation_id: &ConversationId,
        content: &str,
    ) -> Result<Message, ClientError> {
        if content.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        let message = self.api.send_message(conversation_id, content).await?;
        self.apply_message(conversation_id, &message);

        let actions =
            self.transport.send_message_intent(conversation_id, &self.config.local_user, content);
        self.flush(actions);
        Ok(message)
    }

    /// Local input in a conversation's composer changed.
    pub fn input_changed(&mut self, conversation_id: &ConversationId) {
        let now = self.env.now();
        for signal in self.typing.input_changed(conversation_id, now) {
            let actions = self.transport.send_typing(
                &signal.conversation_id,
                &self.config.local_user,
                signal.typing,
            );
            self.flush(actions);
        }
    }

    /// Advance timers. The driver calls this periodically.
    pub fn handle_tick(&mut self) {
        let now = self.env.now();
        if let Some(signal) = self.typing.tick(now) {
            let actions =
                self.transport.send_typing(&signal.conversation_id, &self.config.local_user, false);
            self.flush(actions);
        }
        for conversation_id in self.peers_typing.expire(now) {
            self.updates.push(SessionUpdate::TypingChanged(conversation_id));
        }
    }

    /// Process one raw frame from the socket.
    pub async fn handle_frame(&mut self, frame: &str) {
        if let Some(event) = self.transport.decode(frame) {
            self.handle_event(event).await;
        }
    }

    /// Process one decoded server event.
    pub async fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::ReceiveMessage(message) => {
                let conversation_id = message.conversation_id.clone();
                let marked = self.apply_message(&conversation_id, &message);
                self.transport.dispatch_message(&message);
                if marked && !message.is_from(&self.config.local_user) {
                    self.acknowledge(&conversation_id).await;
                }
                if self.store.conversation(&conversation_id).is_none() {
                    debug!(conversation = %conversation_id, "push for unlisted conversation");
                    if let Err(error) = self.refresh_conversations().await {
                        warn!(%error, "conversation refresh failed");
                    }
                }
            },
            ServerEvent::UserTyping(typing) => self.apply_typing(&typing),
            ServerEvent::MessageError(error) => {
                warn!(reason = %error.reason, "server rejected message");
                self.updates.push(SessionUpdate::ServerError(error.reason));
            },
        }
    }

    /// Unread total as counted by the server.
    pub async fn fetch_unread_total(&self) -> Result<u64, ClientError> {
        Ok(self.api.unread_total().await?)
    }

    /// Register a handler for received messages.
    pub fn on_message<F>(&mut self, handler: F) -> SubscriptionToken
    where
        F: FnMut(&Message) -> HandlerResult + Send + Sync + 'static,
    {
        self.transport.on_message(handler)
    }

    /// Register a handler for remote typing updates.
    pub fn on_typing<F>(&mut self, handler: F) -> SubscriptionToken
    where
        F: FnMut(&TypingPayload) -> HandlerResult + Send + Sync + 'static,
    {
        self.transport.on_typing(handler)
    }

    /// Remove one handler registration.
    pub fn unregister(&mut self, token: SubscriptionToken) -> bool {
        self.transport.unregister(token)
    }

    /// Append a message and keep the focused conversation read. Returns
    /// `true` if it was marked read locally.
    fn apply_message(&mut self, conversation_id: &ConversationId, message: &Message) -> bool {
        let outcome = self.store.append_message(conversation_id, message.clone());
        if !outcome.is_appended() {
            debug!(message = %message.id, ?outcome, "message not appended");
            return false;
        }
        self.updates.push(SessionUpdate::MessagesChanged(conversation_id.clone()));
        self.updates.push(SessionUpdate::ConversationsChanged);
        self.reads.after_append(&mut self.store, conversation_id, outcome, self.env.wall_clock())
    }

    fn apply_typing(&mut self, typing: &TypingPayload) {
        let changed = self.peers_typing.apply(
            &typing.conversation_id,
            &typing.user_id,
            typing.typing,
            self.env.now(),
        );
        if changed {
            self.updates.push(SessionUpdate::TypingChanged(typing.conversation_id.clone()));
        }
        self.transport.dispatch_typing(typing);
    }

    /// Best-effort server mark-read for pushes into the open conversation.
    async fn acknowledge(&self, conversation_id: &ConversationId) {
        if let Err(error) = self.api.mark_read(conversation_id).await {
            warn!(conversation = %conversation_id, %error, "mark read failed");
        }
    }

    fn flush(&mut self, actions: Vec<TransportAction>) {
        for action in actions {
            self.outbox.push(action);
        }
    }

    fn note_connection(&mut self) {
        let state = self.transport.state();
        if state != self.reported {
            self.reported = state;
            self.updates.push(SessionUpdate::ConnectionChanged(state));
        }
    }
}
