//! Per-peer conversation state.
//!
//! - [`message::Message`]: one immutable message snapshot
//! - [`timeline::Timeline`]: ordered message history of one peer
//! - [`phase::Phase`]: what a peer is currently doing
//! - [`stream::StreamEvent`]: incremental reply events from a transport
//! - [`notice`]: fixed wording of controller-generated messages

pub mod message;
pub mod notice;
pub mod phase;
pub mod stream;
pub mod timeline;
