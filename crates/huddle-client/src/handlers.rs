//! Event handler registration.
//!
//! Several UI surfaces can listen to the same event stream. Each
//! registration gets an opaque [`SubscriptionToken`], so unregistering one
//! surface never disturbs another. A handler that errors or panics is
//! logged and skipped; the remaining handlers still run.

use std::{
    collections::BTreeMap,
    fmt,
    panic::{self, AssertUnwindSafe},
};

use tracing::warn;

/// Error a handler may report back to the dispatcher.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by every handler.
pub type HandlerResult = Result<(), HandlerError>;

type Handler<T> = Box<dyn FnMut(&T) -> HandlerResult + Send + Sync>;

/// Identifies one handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Hands out tokens that are never reused.
#[derive(Debug, Default)]
pub(crate) struct TokenSource {
    next: u64,
}

impl TokenSource {
    pub(crate) fn issue(&mut self) -> SubscriptionToken {
        let token = SubscriptionToken(self.next);
        self.next += 1;
        token
    }
}

/// Handlers for one event kind, run in registration order.
pub struct HandlerRegistry<T> {
    kind: &'static str,
    handlers: BTreeMap<SubscriptionToken, Handler<T>>,
}

impl<T> HandlerRegistry<T> {
    /// Create an empty registry. `kind` labels log lines.
    pub fn new(kind: &'static str) -> Self {
        Self { kind, handlers: BTreeMap::new() }
    }

    pub(crate) fn insert<F>(&mut self, token: SubscriptionToken, handler: F)
    where
        F: FnMut(&T) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.insert(token, Box::new(handler));
    }

    /// Remove a handler. Returns `true` if it was registered here.
    pub fn remove(&mut self, token: SubscriptionToken) -> bool {
        self.handlers.remove(&token).is_some()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run every handler with `event`. Returns how many failed.
    pub fn dispatch(&mut self, event: &T) -> usize {
        let mut failures = 0;
        for (token, handler) in &mut self.handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {},
                Ok(Err(error)) => {
                    failures += 1;
                    warn!(kind = self.kind, %token, %error, "handler failed");
                },
                Err(_) => {
                    failures += 1;
                    warn!(kind = self.kind, %token, "handler panicked");
                },
            }
        }
        failures
    }
}

impl<T> fmt::Debug for HandlerRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kind", &self.kind)
            .field("tokens", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
