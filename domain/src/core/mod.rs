//! Core domain concepts shared across all subdomains.
//!
//! - [`peer::PeerId`]: identifier of one conversational backend
//! - [`peer::ConversationId`]: backend-side conversation key for a peer
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod peer;
