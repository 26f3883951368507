//! Session credentials.

/// Source of the bearer token for REST calls and the socket handshake.
///
/// Consulted on every connect and request, so a provider backed by a
/// refreshable store sees the latest token.
pub trait TokenProvider: Send + Sync {
    /// Current token, or `None` when signed out.
    fn token(&self) -> Option<String>;
}

/// Fixed token, typically from the command line or environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wrap a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

impl TokenProvider for Option<String> {
    fn token(&self) -> Option<String> {
        self.clone()
    }
}
