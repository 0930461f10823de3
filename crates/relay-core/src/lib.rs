//! Core message model and payload types.
//!
//! Provides the typed event message handed to the dispatcher and the
//! serialized payload that is signed and transmitted. Serialization happens
//! once, here, so every downstream consumer sees the exact same bytes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod message;
pub mod payload;

pub use error::{CoreError, Result};
pub use message::{Channel, EventKind, Message};
pub use payload::Payload;
