//! Async runtime
//!
//! Event loop that drives a [`Session`] against the real backend. Uses
//! `tokio::select!` to interleave caller commands, live-channel events and a
//! periodic tick that fires typing timers and reconnects a dropped socket.
//!
//! Callers talk to the loop through a [`RuntimeHandle`]: commands in,
//! [`RuntimeEvent`]s out.

use std::{sync::Arc, time::Duration};

use huddle_proto::{ConversationId, Message, TypingPayload, UserId};
use thiserror::Error;
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, info, warn};

use crate::{
    Api, ClientError, EndpointConfig, Session, SessionConfig, SessionUpdate, SystemEnv,
    TokenProvider, TransportAction, TransportState,
    http::HttpApi,
    link::{Link, LinkEvent},
    socket::TransportError,
};

/// Timer resolution for typing and reconnects.
const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// First reconnect delay. Doubles per failure up to [`MAX_RECONNECT_DELAY`].
const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on the reconnect delay.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Transport setup failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Request from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Reload the conversation list.
    RefreshConversations,
    /// Find or create the conversation with a user.
    StartConversation(UserId),
    /// Open a conversation for reading.
    Open(ConversationId),
    /// Close a conversation.
    Close(ConversationId),
    /// Send a message.
    Send {
        /// Target conversation.
        conversation_id: ConversationId,
        /// Message text.
        content: String,
    },
    /// Local composer input changed.
    InputChanged(ConversationId),
    /// Ask the server for the unread total.
    FetchUnreadTotal,
    /// Stop the loop.
    Shutdown,
}

/// Output for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// Session state changed.
    Update(SessionUpdate),
    /// A message arrived on the live channel.
    Received(Message),
    /// A peer started or stopped typing.
    Typing(TypingPayload),
    /// A message was accepted by the server.
    Sent(Message),
    /// A conversation was found or created.
    Started(ConversationId),
    /// Server-side unread total.
    UnreadTotal(u64),
    /// The live channel is down. Pushes and typing pause until it returns.
    Degraded(ClientError),
    /// A command failed. Local session state is as it was before the command.
    Failed {
        /// Command that failed.
        command: &'static str,
        /// Why.
        error: ClientError,
    },
}

/// Caller side of a running [`Runtime`].
pub struct RuntimeHandle {
    /// Commands for the loop.
    pub commands: mpsc::Sender<Command>,
    /// Events from the loop.
    pub events: mpsc::Receiver<RuntimeEvent>,
}

/// Reconnect schedule for a dropped live channel.
///
/// Each close schedules one attempt and doubles the delay for the next, up
/// to [`MAX_RECONNECT_DELAY`]. A successful open resets it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ReconnectBackoff {
    delay: Duration,
    due: Option<Instant>,
}

impl ReconnectBackoff {
    fn new() -> Self {
        Self { delay: INITIAL_RECONNECT_DELAY, due: None }
    }

    /// Schedule the next attempt. Returns the delay it was scheduled with.
    fn schedule(&mut self, now: Instant) -> Duration {
        let delay = self.delay;
        self.due = Some(now + delay);
        self.delay = (delay * 2).min(MAX_RECONNECT_DELAY);
        delay
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    /// Consume the pending attempt if it is due.
    fn take_due(&mut self, now: Instant) -> bool {
        if self.due.is_some_and(|at| now >= at) {
            self.due = None;
            true
        } else {
            false
        }
    }
}

/// Drives a session against a backend and a live channel.
pub struct Runtime<A = HttpApi> {
    session: Session<A, SystemEnv>,
    credentials: Arc<dyn TokenProvider>,
    link: Link,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<RuntimeEvent>,
    backoff: ReconnectBackoff,
}

impl Runtime<HttpApi> {
    /// Build a runtime and the handle to talk to it.
    ///
    /// Must be called within a tokio runtime; the transport driver task is
    /// spawned immediately.
    pub fn new(
        endpoints: EndpointConfig,
        config: SessionConfig,
        credentials: Arc<dyn TokenProvider>,
    ) -> Result<(Self, RuntimeHandle), RuntimeError> {
        let api = HttpApi::new(endpoints.api_url, Arc::clone(&credentials))?;
        let (outbox, actions) = mpsc::unbounded_channel::<TransportAction>();
        let link = Link::spawn(endpoints.socket_url, actions);
        let session = Session::new(SystemEnv::new(), api, outbox, config);
        Ok(Self::with_session(session, link, credentials))
    }
}

impl<A: Api + 'static> Runtime<A> {
    /// Build a runtime around an existing session and link.
    ///
    /// The link must execute the actions the session pushes into its outbox.
    pub fn with_session(
        mut session: Session<A, SystemEnv>,
        link: Link,
        credentials: Arc<dyn TokenProvider>,
    ) -> (Self, RuntimeHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let (events_tx, events_rx) = mpsc::channel(256);

        let forward = events_tx.clone();
        session.on_message(move |message| {
            forward.try_send(RuntimeEvent::Received(message.clone())).map_err(|e| e.to_string().into())
        });
        let forward = events_tx.clone();
        session.on_typing(move |typing| {
            forward.try_send(RuntimeEvent::Typing(typing.clone())).map_err(|e| e.to_string().into())
        });

        let runtime = Self {
            session,
            credentials,
            link,
            commands: commands_rx,
            events: events_tx,
            backoff: ReconnectBackoff::new(),
        };
        (runtime, RuntimeHandle { commands: commands_tx, events: events_rx })
    }

    /// Run until [`Command::Shutdown`] or until the handle is dropped.
    pub async fn run(mut self) {
        self.session.connect(self.credentials.as_ref());
        if let Err(error) = self.session.refresh_conversations().await {
            self.emit(RuntimeEvent::Failed { command: "refresh_conversations", error }).await;
        }

        let mut tick_interval = tokio::time::interval(TICK_INTERVAL);

        loop {
            let keep_running = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => false,
                    Some(command) => {
                        self.handle_command(command).await;
                        true
                    },
                },

                Some(event) = self.link.events.recv() => {
                    self.handle_link_event(event).await;
                    true
                },

                _ = tick_interval.tick() => {
                    self.session.handle_tick();
                    self.maybe_reconnect();
                    true
                },
            };

            if !self.publish_updates().await || !keep_running {
                break;
            }
        }

        info!("runtime stopping");
        self.session.disconnect();
        self.link.stop();
    }

    async fn handle_command(&mut self, command: Command) {
        let event = match command {
            Command::RefreshConversations => self
                .session
                .refresh_conversations()
                .await
                .err()
                .map(|error| RuntimeEvent::Failed { command: "refresh_conversations", error }),
            Command::StartConversation(user) => {
                match self.session.start_conversation(&user).await {
                    Ok(conversation_id) => Some(RuntimeEvent::Started(conversation_id)),
                    Err(error) => Some(RuntimeEvent::Failed { command: "start_conversation", error }),
                }
            },
            Command::Open(conversation_id) => self
                .session
                .open_conversation(&conversation_id)
                .await
                .err()
                .map(|error| RuntimeEvent::Failed { command: "open_conversation", error }),
            Command::Close(conversation_id) => {
                self.session.close_conversation(&conversation_id);
                None
            },
            Command::Send { conversation_id, content } => {
                match self.session.send_message(&conversation_id, &content).await {
                    Ok(message) => Some(RuntimeEvent::Sent(message)),
                    Err(error) => Some(RuntimeEvent::Failed { command: "send_message", error }),
                }
            },
            Command::InputChanged(conversation_id) => {
                self.session.input_changed(&conversation_id);
                None
            },
            Command::FetchUnreadTotal => match self.session.fetch_unread_total().await {
                Ok(total) => Some(RuntimeEvent::UnreadTotal(total)),
                Err(error) => Some(RuntimeEvent::Failed { command: "fetch_unread_total", error }),
            },
            Command::Shutdown => None,
        };

        if let Some(event) = event {
            self.emit(event).await;
        }
    }

    async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Opened => {
                self.session.transport_opened();
                self.backoff.reset();
            },
            LinkEvent::Frame(text) => self.session.handle_frame(&text).await,
            LinkEvent::Closed(reason) => {
                self.session.transport_closed(&reason);
                let delay = self.backoff.schedule(Instant::now());
                debug!(?delay, "reconnect scheduled");
                self.emit(RuntimeEvent::Degraded(ClientError::TransportUnavailable(reason))).await;
            },
        }
    }

    fn maybe_reconnect(&mut self) {
        if self.session.transport_state() == TransportState::Disconnected
            && self.backoff.take_due(Instant::now())
        {
            self.session.connect(self.credentials.as_ref());
        }
    }

    /// Forward queued session updates. Returns `false` once nobody listens.
    async fn publish_updates(&mut self) -> bool {
        for update in self.session.take_updates() {
            if self.events.send(RuntimeEvent::Update(update)).await.is_err() {
                return false;
            }
        }
        true
    }

    async fn emit(&self, event: RuntimeEvent) {
        if self.events.send(event).await.is_err() {
            warn!("runtime event dropped, receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn attempt_is_due_after_the_delay() {
        let mut backoff = ReconnectBackoff::new();
        assert!(!backoff.take_due(Instant::now()));

        assert_eq!(backoff.schedule(Instant::now()), Duration::from_secs(1));
        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!backoff.take_due(Instant::now()));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(backoff.take_due(Instant::now()));
        assert!(!backoff.take_due(Instant::now()), "an attempt is taken once");
    }

    #[tokio::test(start_paused = true)]
    async fn delay_doubles_up_to_the_cap() {
        let mut backoff = ReconnectBackoff::new();

        let delays: Vec<_> =
            (0..7).map(|_| backoff.schedule(Instant::now()).as_secs()).collect();

        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restarts_from_the_initial_delay() {
        let mut backoff = ReconnectBackoff::new();
        backoff.schedule(Instant::now());
        backoff.schedule(Instant::now());

        backoff.reset();
        tokio::time::advance(MAX_RECONNECT_DELAY).await;

        assert!(!backoff.take_due(Instant::now()), "reset drops the pending attempt");
        assert_eq!(backoff.schedule(Instant::now()), INITIAL_RECONNECT_DELAY);
    }
}
