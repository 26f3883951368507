//! Huddle client
//!
//! Keeps a local, incrementally updated view of a user's conversations in
//! sync with a chat backend. Durable state comes from a REST [`Api`]; a
//! live channel pushes new messages and typing hints. [`Session`] owns the
//! state and reconciles both sources.
//!
//! # Architecture
//!
//! Like [`huddle_core`], the session is driven from outside. The live
//! channel is the Sans-IO [`Transport`], which emits [`TransportAction`]s
//! into an [`Outbox`] and is told when the socket opens, closes or delivers
//! a frame. REST calls go through the [`Api`] trait, so tests can swap in an
//! in-memory backend and a virtual clock.
//!
//! # Components
//!
//! - [`Session`]: Store, typing and read tracking behind one owner
//! - [`Transport`]: Live-channel state machine and handler registry
//! - [`Api`]: Async REST collaborator
//! - [`TokenProvider`]: Credential source consulted on every connect
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`http::HttpApi`]: reqwest-backed [`Api`]
//! - [`socket::connect`]: WebSocket connection over tokio-tungstenite
//! - [`runtime::Runtime`]: Event loop wiring a session to both
//! - [`SystemEnv`]: Real clocks

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod api;
mod config;
mod credentials;
mod error;
mod handlers;
mod outbox;
mod session;
mod transport;

#[cfg(feature = "transport")]
pub mod http;
#[cfg(feature = "transport")]
pub mod link;
#[cfg(feature = "transport")]
pub mod runtime;
#[cfg(feature = "transport")]
pub mod socket;
#[cfg(feature = "transport")]
mod system_env;

pub use api::Api;
#[cfg(feature = "transport")]
pub use config::EndpointConfig;
pub use config::{DEFAULT_HISTORY_LIMIT, SessionConfig};
pub use credentials::{StaticToken, TokenProvider};
pub use error::{ApiError, ClientError};
pub use handlers::{HandlerError, HandlerRegistry, HandlerResult, SubscriptionToken};
pub use huddle_core::Environment;
pub use outbox::Outbox;
pub use session::{Session, SessionUpdate};
#[cfg(feature = "transport")]
pub use system_env::SystemEnv;
pub use transport::{Transport, TransportAction, TransportState};
