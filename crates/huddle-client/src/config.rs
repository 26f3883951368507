//! Session configuration.

use std::time::Duration;

use huddle_core::{DEFAULT_QUIET_WINDOW, DEFAULT_REMOTE_TYPING_TTL};
use huddle_proto::UserId;

/// Messages fetched when a conversation is opened.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Tunables for one signed-in session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// The signed-in user. Messages from anyone else count as unread.
    pub local_user: UserId,
    /// History page size for `open_conversation`.
    pub history_limit: u32,
    /// Quiet window before a local `typing=false`.
    pub typing_quiet_window: Duration,
    /// Lifetime of a remote `typing=true` with no follow-up.
    pub remote_typing_ttl: Duration,
}

impl SessionConfig {
    /// Defaults for `local_user`.
    pub fn new(local_user: impl Into<UserId>) -> Self {
        Self {
            local_user: local_user.into(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            typing_quiet_window: DEFAULT_QUIET_WINDOW,
            remote_typing_ttl: DEFAULT_REMOTE_TYPING_TTL,
        }
    }
}

/// Where the backend lives.
#[cfg(feature = "transport")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// REST base, e.g. `https://chat.example.com/api/`.
    pub api_url: url::Url,
    /// WebSocket endpoint, e.g. `wss://chat.example.com/socket`.
    pub socket_url: url::Url,
}

#[cfg(feature = "transport")]
impl EndpointConfig {
    /// Parse both URLs.
    pub fn parse(api_url: &str, socket_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self { api_url: url::Url::parse(api_url)?, socket_url: url::Url::parse(socket_url)? })
    }
}
