//! Domain layer for chorus
//!
//! This crate contains the core entities and value objects of a multi-peer
//! chat. It has no dependencies on runtime, transport or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Peer
//!
//! A peer is one independently-addressable conversational backend (usually a
//! model name). Every peer owns its own [`Timeline`] of [`Message`]s and moves
//! through [`Phase`]s independently of every other peer.
//!
//! ## Command
//!
//! Raw user input is classified into a [`Command`] before anything else
//! happens: a lifecycle start (with a [`SessionMode`]), a lifecycle end, or an
//! ordinary message forwarded to the peer.

pub mod command;
pub mod core;
pub mod session;

// Re-export commonly used types
pub use command::{classifier::Command, mode::SessionMode};
pub use core::{
    error::DomainError,
    peer::{ConversationId, PeerId},
};
pub use session::{
    message::{Message, MessageId, Role},
    notice,
    phase::Phase,
    stream::StreamEvent,
    timeline::Timeline,
};
