//! Client error types.

use thiserror::Error;

/// Failure talking to the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No credential was available for an authenticated request.
    #[error("no session credential")]
    Unauthenticated,

    /// Server answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        /// Endpoint that failed, e.g. `GET /conversations`.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// Request never got an answer.
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether retrying the same request later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Unauthenticated | Self::Decode(_) => false,
        }
    }
}

/// Errors surfaced to callers of the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Live channel is down or has no credential. Never fatal: signals
    /// sent meanwhile are dropped and the REST path keeps working.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// REST request failed. Local state is left as it was.
    #[error("request failed: {0}")]
    RequestFailed(#[from] ApiError),

    /// Refused to send a message with no visible content.
    #[error("message is empty")]
    EmptyMessage,
}
