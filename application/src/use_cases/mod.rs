//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod lifecycle;
pub mod peer_controller;
pub mod peer_session;
pub(crate) mod session_registry;
pub mod stream_reducer;
