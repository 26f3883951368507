//! Huddle protocol types
//!
//! Records and wire formats shared by every Huddle crate. Nothing in here
//! performs I/O: the live channel carries JSON text frames built from
//! [`ClientEvent`] and decoded into [`ServerEvent`], and the REST
//! collaborators exchange the envelopes in [`rest`].
//!
//! # Components
//!
//! - [`ConversationId`], [`MessageId`], [`UserId`]: string identifiers
//! - [`Conversation`], [`Message`]: domain records
//! - [`ServerEvent`], [`ClientEvent`]: live-channel events
//! - [`rest`]: request/response envelopes for the REST collaborators

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod event;
mod ids;
mod model;
pub mod rest;

pub use error::ProtocolError;
pub use event::{
    ClientEvent, MessageErrorPayload, SendMessagePayload, ServerEvent, TypingPayload,
};
pub use ids::{ConversationId, MessageId, UserId};
pub use model::{Conversation, Message, Timestamp};
