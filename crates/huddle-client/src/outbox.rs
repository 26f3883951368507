//! Outbound side of the live channel.
//!
//! The session pushes [`TransportAction`]s the moment it decides on them,
//! before awaiting any REST call. That keeps the wire order honest: a join
//! is on its way before the history request that depends on it.

use tokio::sync::mpsc;
use tracing::debug;

use crate::TransportAction;

/// Sink for transport actions.
pub trait Outbox: Send {
    /// Hand one action to the driver.
    fn push(&mut self, action: TransportAction);
}

impl Outbox for mpsc::UnboundedSender<TransportAction> {
    fn push(&mut self, action: TransportAction) {
        if self.send(action).is_err() {
            debug!("transport driver gone, dropping action");
        }
    }
}

impl Outbox for Vec<TransportAction> {
    fn push(&mut self, action: TransportAction) {
        Vec::push(self, action);
    }
}
