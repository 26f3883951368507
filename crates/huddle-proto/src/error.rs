//! Protocol errors.

use thiserror::Error;

/// Errors produced while encoding or decoding live-channel frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame is not a valid `{event, data}` envelope, or its payload does not
    /// match the event.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Envelope names an event this client does not understand.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Outbound event could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
