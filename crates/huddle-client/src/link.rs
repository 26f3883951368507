//! Transport driver.
//!
//! Executes [`TransportAction`]s from the session's outbox on a dedicated
//! task. Because the task owns the socket, a join pushed by the session is
//! written even while the session itself is awaiting a REST response.

use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::{
    TransportAction,
    socket::{self, SocketEvent, SocketHandle},
};

/// Lifecycle and traffic reported back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Handshake finished.
    Opened,
    /// One text frame from the server.
    Frame(String),
    /// Socket failed to open or went away.
    Closed(String),
}

/// Handle to the driver task.
pub struct Link {
    /// Events from the driver.
    pub events: mpsc::Receiver<LinkEvent>,
    abort_handle: Option<tokio::task::AbortHandle>,
}

impl Link {
    /// Spawn a driver that connects to `socket_url` on demand.
    pub fn spawn(socket_url: Url, actions: mpsc::UnboundedReceiver<TransportAction>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        let handle = tokio::spawn(run_link(socket_url, actions, events_tx));
        Self { events: events_rx, abort_handle: Some(handle.abort_handle()) }
    }

    /// Link whose events come from the caller instead of a driver task.
    ///
    /// The caller is responsible for executing the session's outbox.
    pub fn detached(events: mpsc::Receiver<LinkEvent>) -> Self {
        Self { events, abort_handle: None }
    }

    /// Stop the driver and drop its socket.
    pub fn stop(&self) {
        if let Some(handle) = &self.abort_handle {
            handle.abort();
        }
    }
}

async fn run_link(
    socket_url: Url,
    mut actions: mpsc::UnboundedReceiver<TransportAction>,
    events: mpsc::Sender<LinkEvent>,
) {
    let mut socket: Option<SocketHandle> = None;

    loop {
        let report = tokio::select! {
            action = actions.recv() => match action {
                Some(action) => perform(&socket_url, &mut socket, action).await,
                None => break,
            },

            event = next_event(&mut socket) => match event {
                SocketEvent::Frame(text) => Some(LinkEvent::Frame(text)),
                SocketEvent::Closed(reason) => {
                    socket = None;
                    Some(LinkEvent::Closed(reason))
                },
            },
        };

        if let Some(report) = report
            && events.send(report).await.is_err()
        {
            break;
        }
    }
}

async fn perform(
    socket_url: &Url,
    socket: &mut Option<SocketHandle>,
    action: TransportAction,
) -> Option<LinkEvent> {
    match action {
        TransportAction::Open { token } => {
            if let Some(previous) = socket.take() {
                previous.stop();
            }
            match socket::connect(socket_url, &token).await {
                Ok(handle) => {
                    *socket = Some(handle);
                    Some(LinkEvent::Opened)
                },
                Err(e) => Some(LinkEvent::Closed(e.to_string())),
            }
        },
        TransportAction::Send(event) => {
            let Some(handle) = socket.as_ref() else {
                debug!(event = event.name(), "no socket, dropping frame");
                return None;
            };
            match event.encode() {
                Ok(text) => {
                    if handle.to_server.send(text).await.is_err() {
                        debug!(event = event.name(), "socket task gone, dropping frame");
                    }
                },
                Err(e) => warn!(event = event.name(), error = %e, "failed to encode frame"),
            }
            None
        },
        TransportAction::Close => {
            if let Some(handle) = socket.take() {
                handle.stop();
            }
            None
        },
    }
}

async fn next_event(socket: &mut Option<SocketHandle>) -> SocketEvent {
    match socket {
        Some(handle) => handle
            .from_server
            .recv()
            .await
            .unwrap_or_else(|| SocketEvent::Closed("socket task ended".to_owned())),
        None => std::future::pending().await,
    }
}
