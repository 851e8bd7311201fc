//! Application layer for chorus
//!
//! This crate contains the peer controller use case, port definitions, and
//! application configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::ControllerConfig;
pub use ports::{
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    peer_transport::{
        FragmentStream, LifecycleError, PeerTransport, Reply, SessionAck, TransportError,
    },
    session_event::SessionEvent,
};
pub use use_cases::lifecycle::TeardownHandle;
pub use use_cases::peer_controller::{Dispatch, DropReason, PeerController, Toggle};
pub use use_cases::peer_session::PeerView;
pub use use_cases::stream_reducer::StreamOutcome;
