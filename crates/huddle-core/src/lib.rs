//! Huddle core
//!
//! Pure state machines for conversation synchronization. Nothing here touches
//! the network or the clock directly: time is read through [`Environment`]
//! and passed into methods, and every mutation goes through `&mut self`, so
//! compound operations such as dedup-then-append run to completion without
//! interleaving.
//!
//! # Components
//!
//! - [`MessageStore`]: conversations and their id-keyed, time-ordered messages
//! - [`TypingCoordinator`]: debounced local typing signal
//! - [`TypingSet`]: remote typing side-table with expiry
//! - [`ReadTracker`]: focus tracking that keeps unread badges honest

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
mod read;
mod store;
mod typing;

pub use env::Environment;
pub use read::ReadTracker;
pub use store::{AppendOutcome, MessageStore};
pub use typing::{
    DEFAULT_QUIET_WINDOW, DEFAULT_REMOTE_TYPING_TTL, TypingCoordinator, TypingSet, TypingSignal,
};
