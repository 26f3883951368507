//! Live-channel state machine.
//!
//! Sans-IO: [`Transport`] never touches a socket. Lifecycle calls return
//! [`TransportAction`]s for a driver to perform, and the driver reports back
//! with [`Transport::opened`] and [`Transport::closed`]. Everything sent on
//! the channel is advisory. Joins, leaves and typing signals issued while
//! the channel is down are dropped, not queued.
//!
//! # State machine
//!
//! ```text
//! Disconnected --connect(token)--> Connecting --opened--> Connected
//!      ^                               |                      |
//!      +-----------closed / disconnect-+----------------------+
//! ```

use std::collections::BTreeSet;

use huddle_proto::{
    ClientEvent, ConversationId, Message, SendMessagePayload, ServerEvent, TypingPayload, UserId,
};
use tracing::{debug, info, warn};

use crate::{
    TokenProvider,
    handlers::{HandlerRegistry, HandlerResult, SubscriptionToken, TokenSource},
};

/// Live-channel connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportState {
    /// No socket.
    Disconnected,
    /// Socket requested, handshake not finished.
    Connecting,
    /// Socket open. Frames flow.
    Connected,
}

/// Work for the transport driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportAction {
    /// Open the socket, authenticating with `token`.
    Open {
        /// Bearer token for the handshake.
        token: String,
    },
    /// Write one event to the open socket.
    Send(ClientEvent),
    /// Close the socket.
    Close,
}

/// Live-channel client.
///
/// Tracks joined rooms so they can be joined on every open, including
/// joins issued before the first handshake finished.
#[derive(Debug)]
pub struct Transport {
    state: TransportState,
    rooms: BTreeSet<ConversationId>,
    tokens: TokenSource,
    message_handlers: HandlerRegistry<Message>,
    typing_handlers: HandlerRegistry<TypingPayload>,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    /// Create a disconnected transport with no handlers.
    pub fn new() -> Self {
        Self {
            state: TransportState::Disconnected,
            rooms: BTreeSet::new(),
            tokens: TokenSource::default(),
            message_handlers: HandlerRegistry::new("message"),
            typing_handlers: HandlerRegistry::new("typing"),
        }
    }

    /// Current state.
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Whether frames can be sent right now.
    pub fn is_connected(&self) -> bool {
        self.state == TransportState::Connected
    }

    /// Rooms to rejoin on the next open.
    pub fn rooms(&self) -> impl Iterator<Item = &ConversationId> {
        self.rooms.iter()
    }

    /// Start connecting.
    ///
    /// Idempotent while a socket is open or opening. Without a credential
    /// this is a no-op and the transport stays disconnected.
    pub fn connect(&mut self, credentials: &dyn TokenProvider) -> Vec<TransportAction> {
        if self.state != TransportState::Disconnected {
            debug!(state = ?self.state, "connect ignored, socket already requested");
            return Vec::new();
        }

        match credentials.token().filter(|token| !token.is_empty()) {
            Some(token) => {
                self.state = TransportState::Connecting;
                info!("connecting live channel");
                vec![TransportAction::Open { token }]
            },
            None => {
                debug!("no session credential, staying disconnected");
                Vec::new()
            },
        }
    }

    /// The driver finished the handshake.
    ///
    /// Rejoins every room that was joined before the socket dropped. If the
    /// caller disconnected while the handshake was in flight the new socket
    /// is closed again.
    pub fn opened(&mut self) -> Vec<TransportAction> {
        match self.state {
            TransportState::Connecting => {
                self.state = TransportState::Connected;
                info!(rooms = self.rooms.len(), "live channel connected");
                self.rooms
                    .iter()
                    .map(|room| TransportAction::Send(ClientEvent::JoinConversation(room.clone())))
                    .collect()
            },
            TransportState::Disconnected => {
                debug!("socket opened after disconnect, closing");
                vec![TransportAction::Close]
            },
            TransportState::Connected => Vec::new(),
        }
    }

    /// The socket closed or failed to open. Rooms are kept for the rejoin.
    pub fn closed(&mut self, reason: &str) {
        if self.state != TransportState::Disconnected {
            warn!(%reason, "live channel closed");
        }
        self.state = TransportState::Disconnected;
    }

    /// Close on purpose. Rooms are forgotten.
    pub fn disconnect(&mut self) -> Vec<TransportAction> {
        self.rooms.clear();
        if self.state == TransportState::Disconnected {
            return Vec::new();
        }
        self.state = TransportState::Disconnected;
        info!("live channel disconnected");
        vec![TransportAction::Close]
    }

    /// Subscribe to a conversation's events.
    ///
    /// The room is remembered in every state. The join frame itself is only
    /// written while connected; otherwise [`Transport::opened`] sends it.
    pub fn join(&mut self, conversation_id: &ConversationId) -> Vec<TransportAction> {
        self.rooms.insert(conversation_id.clone());
        if !self.is_connected() {
            debug!(conversation = %conversation_id, "join deferred until connected");
            return Vec::new();
        }
        vec![TransportAction::Send(ClientEvent::JoinConversation(conversation_id.clone()))]
    }

    /// Unsubscribe from a conversation. It will not be rejoined.
    pub fn leave(&mut self, conversation_id: &ConversationId) -> Vec<TransportAction> {
        self.rooms.remove(conversation_id);
        if !self.is_connected() {
            debug!(conversation = %conversation_id, "leave dropped, not connected");
            return Vec::new();
        }
        vec![TransportAction::Send(ClientEvent::LeaveConversation(conversation_id.clone()))]
    }

    /// Hint peers that a message was sent. The REST call is authoritative.
    pub fn send_message_intent(
        &mut self,
        conversation_id: &ConversationId,
        sender_id: &UserId,
        content: &str,
    ) -> Vec<TransportAction> {
        self.emit(ClientEvent::SendMessage(SendMessagePayload {
            conversation_id: conversation_id.clone(),
            sender_id: sender_id.clone(),
            content: content.to_owned(),
        }))
    }

    /// Broadcast a local typing change.
    pub fn send_typing(
        &mut self,
        conversation_id: &ConversationId,
        user_id: &UserId,
        typing: bool,
    ) -> Vec<TransportAction> {
        self.emit(ClientEvent::Typing(TypingPayload {
            conversation_id: conversation_id.clone(),
            user_id: user_id.clone(),
            typing,
        }))
    }

    fn emit(&self, event: ClientEvent) -> Vec<TransportAction> {
        if !self.is_connected() {
            debug!(event = event.name(), "signal dropped, not connected");
            return Vec::new();
        }
        vec![TransportAction::Send(event)]
    }

    /// Decode an inbound frame. Malformed and unknown frames are logged and
    /// skipped.
    pub fn decode(&self, frame: &str) -> Option<ServerEvent> {
        match ServerEvent::decode(frame) {
            Ok(event) => Some(event),
            Err(error) => {
                warn!(%error, "skipping inbound frame");
                None
            },
        }
    }

    /// Register a handler for received messages.
    pub fn on_message<F>(&mut self, handler: F) -> SubscriptionToken
    where
        F: FnMut(&Message) -> HandlerResult + Send + Sync + 'static,
    {
        let token = self.tokens.issue();
        self.message_handlers.insert(token, handler);
        token
    }

    /// Register a handler for remote typing updates.
    pub fn on_typing<F>(&mut self, handler: F) -> SubscriptionToken
    where
        F: FnMut(&TypingPayload) -> HandlerResult + Send + Sync + 'static,
    {
        let token = self.tokens.issue();
        self.typing_handlers.insert(token, handler);
        token
    }

    /// Remove one registration. Returns `true` if it existed.
    pub fn unregister(&mut self, token: SubscriptionToken) -> bool {
        self.message_handlers.remove(token) || self.typing_handlers.remove(token)
    }

    /// Run message handlers.
    pub fn dispatch_message(&mut self, message: &Message) -> usize {
        self.message_handlers.dispatch(message)
    }

    /// Run typing handlers.
    pub fn dispatch_typing(&mut self, typing: &TypingPayload) -> usize {
        self.typing_handlers.dispatch(typing)
    }
}
