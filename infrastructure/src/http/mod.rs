//! HTTP adapter for the conversational backend.
//!
//! Implements [`PeerTransport`](chorus_application::PeerTransport) over the
//! backend's JSON endpoints with `reqwest`, including incremental decoding of
//! `text/event-stream` replies.

pub mod decoder;
pub mod error;
pub mod protocol;
pub mod transport;

pub use error::HttpTransportError;
pub use transport::{DEFAULT_EVENT_BUFFER, HttpPeerTransport};
