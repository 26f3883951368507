//! Deterministic simulation harness for Huddle.
//!
//! In-memory implementations of the environment and REST collaborators so
//! sessions can be driven step by step without sockets or wall-clock waits.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks store snapshots against the properties every
//! reachable state has. [`InvariantRegistry::standard()`] runs all of them and
//! returns a [`Report`] grouped by conversation.
//!
//! # Worlds
//!
//! [`World`] wires a [`huddle_client::Session`] to a [`FakeApi`], a
//! [`SimEnv`] and a [`Trace`] that records REST calls and wire actions in
//! the order they happened.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fake_api;
pub mod invariants;
pub mod sim_env;
pub mod trace;
pub mod world;

pub use fake_api::{ApiCall, Endpoint, FakeApi};
pub use invariants::{
    ConversationsByRecency, FocusedIsRead, Invariant, InvariantRegistry, MessagesInOwnThread,
    MessagesOrdered, Report, StoreSnapshot, UniqueConversations, UniqueMessageIds, Violation,
};
pub use sim_env::{SimEnv, SimInstant};
pub use trace::{RecordingOutbox, Trace, TraceEntry};
pub use world::{SimSession, World};
