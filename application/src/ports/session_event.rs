//! Session events emitted by the controller for observers
//!
//! These events form the push-style output port from the application layer to
//! the presentation layer. They complement the pull-style
//! [`PeerController::snapshot`](crate::PeerController::snapshot): a presenter
//! can render incrementally from events and resynchronise from a snapshot.
//!
//! Events for one peer are emitted in the order the changes were applied.
//! No ordering is implied between different peers.

use chorus_domain::{Message, PeerId, Phase};
use std::sync::Arc;

/// Events emitted by the session controller
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A peer session was created (seeded with its welcome message).
    PeerAdded { peer: PeerId },
    /// A peer session was removed along with its history.
    PeerRemoved { peer: PeerId },
    /// A peer moved to a new phase.
    PhaseChanged { peer: PeerId, phase: Phase },
    /// A message was appended to a peer's timeline.
    MessageAppended { peer: PeerId, message: Arc<Message> },
    /// A new snapshot replaced an in-progress message (streaming progress,
    /// completion, failure or cancellation).
    MessageUpdated { peer: PeerId, message: Arc<Message> },
}

impl SessionEvent {
    /// The peer this event concerns.
    pub fn peer(&self) -> &PeerId {
        match self {
            SessionEvent::PeerAdded { peer }
            | SessionEvent::PeerRemoved { peer }
            | SessionEvent::PhaseChanged { peer, .. }
            | SessionEvent::MessageAppended { peer, .. }
            | SessionEvent::MessageUpdated { peer, .. } => peer,
        }
    }

    /// The message carried by this event, if any.
    pub fn message(&self) -> Option<&Arc<Message>> {
        match self {
            SessionEvent::MessageAppended { message, .. }
            | SessionEvent::MessageUpdated { message, .. } => Some(message),
            _ => None,
        }
    }
}
