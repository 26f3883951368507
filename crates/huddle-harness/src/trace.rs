//! Ordered record of everything a session did to the outside world.

use std::sync::{Arc, Mutex, PoisonError};

use huddle_client::{Outbox, TransportAction};
use huddle_proto::ClientEvent;

use crate::ApiCall;

/// One observed side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEntry {
    /// A REST call reached the fake backend.
    Api(ApiCall),
    /// The session pushed an action to the transport driver.
    Wire(TransportAction),
}

/// Shared, append-only trace.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    entries: Arc<Mutex<Vec<TraceEntry>>>,
}

impl Trace {
    /// Create an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn record(&self, entry: TraceEntry) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
    }

    /// All entries so far.
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Remove and return all entries.
    pub fn drain(&self) -> Vec<TraceEntry> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Client events written to the wire, in order.
    pub fn sent_events(&self) -> Vec<ClientEvent> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                TraceEntry::Wire(TransportAction::Send(event)) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// REST calls, in order.
    pub fn api_calls(&self) -> Vec<ApiCall> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                TraceEntry::Api(call) => Some(call),
                TraceEntry::Wire(_) => None,
            })
            .collect()
    }
}

/// [`Outbox`] that records into a [`Trace`].
#[derive(Debug, Clone)]
pub struct RecordingOutbox {
    trace: Trace,
}

impl RecordingOutbox {
    /// Record into `trace`.
    pub fn new(trace: Trace) -> Self {
        Self { trace }
    }
}

impl Outbox for RecordingOutbox {
    fn push(&mut self, action: TransportAction) {
        self.trace.record(TraceEntry::Wire(action));
    }
}
