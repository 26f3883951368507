//! WebSocket transport.
//!
//! Provides [`SocketHandle`], a pair of channels backed by a spawned task
//! that owns the socket. This is a thin layer that only moves text frames;
//! protocol logic stays in the Sans-IO [`Transport`](crate::Transport).

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream,
    tungstenite::{
        Message as WsMessage,
        client::IntoClientRequest,
        http::{HeaderValue, header::AUTHORIZATION},
    },
};
use tracing::debug;
use url::Url;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// HTTP client could not be built.
    #[error("http client error: {0}")]
    Http(String),
}

/// Something the socket task observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// One text frame from the server.
    Frame(String),
    /// The socket is gone.
    Closed(String),
}

/// Handle to an open socket.
///
/// Frames are sent and received via the channels; an internal task does the
/// WebSocket I/O.
pub struct SocketHandle {
    /// Send text frames to the server.
    pub to_server: mpsc::Sender<String>,
    /// Frames and the final close from the server.
    pub from_server: mpsc::Receiver<SocketEvent>,
    abort_handle: tokio::task::AbortHandle,
}

impl SocketHandle {
    /// Stop the connection.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

/// Open a WebSocket, authenticating with a bearer token.
pub async fn connect(url: &Url, token: &str) -> Result<SocketHandle, TransportError> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| TransportError::Connection(format!("invalid socket url: {e}")))?;
    let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| TransportError::Connection(format!("invalid token: {e}")))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    let (stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| TransportError::Connection(e.to_string()))?;

    let (to_server_tx, to_server_rx) = mpsc::channel::<String>(32);
    let (from_server_tx, from_server_rx) = mpsc::channel::<SocketEvent>(32);

    let handle = tokio::spawn(run_connection(stream, to_server_rx, from_server_tx));

    Ok(SocketHandle {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handle: handle.abort_handle(),
    })
}

/// Run the connection, bridging between channels and the socket.
async fn run_connection(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut to_server: mpsc::Receiver<String>,
    from_server: mpsc::Sender<SocketEvent>,
) {
    let (mut sink, mut source) = stream.split();

    let reason = loop {
        tokio::select! {
            outgoing = to_server.recv() => match outgoing {
                Some(text) => {
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        break format!("send failed: {e}");
                    }
                },
                None => {
                    let _ = sink.close().await;
                    return;
                },
            },

            incoming = source.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    if from_server.send(SocketEvent::Frame(text)).await.is_err() {
                        return;
                    }
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    break frame.map_or_else(|| "closed by server".to_owned(), |f| f.reason.into_owned());
                },
                // Pings are answered by tungstenite itself
                Some(Ok(WsMessage::Binary(bytes))) => debug!(len = bytes.len(), "ignoring binary frame"),
                Some(Ok(_)) => {},
                Some(Err(e)) => break e.to_string(),
                None => break "stream ended".to_owned(),
            },
        }
    };

    let _ = from_server.send(SocketEvent::Closed(reason)).await;
}
