//! Peer transport port
//!
//! Defines the interface for talking to conversational backends. The
//! controller only knows three verbs: start a session, send a message, end a
//! session. Implementations (adapters) live in the infrastructure layer.

use async_trait::async_trait;
use chorus_domain::{ConversationId, PeerId, SessionMode, StreamEvent};
use thiserror::Error;
use tokio::sync::mpsc;

/// Network or protocol failure surfaced by a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("HTTP error! status: {0}")]
    HttpStatus(u16),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Transport closed")]
    TransportClosed,
}

/// A start-session or end-session call that did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Backend rejected {verb}: {reason}")]
    Rejected { verb: &'static str, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Acknowledgement of a lifecycle call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionAck {
    /// Backend conversation key echoed back, if the backend sends one.
    pub thread_id: Option<String>,
}

/// Handle for receiving the fragments of one streamed reply.
///
/// Wraps an `mpsc::Receiver<StreamEvent>`. Dropping the handle closes the
/// channel, which tells the producing side to stop.
#[derive(Debug)]
pub struct FragmentStream {
    receiver: mpsc::Receiver<StreamEvent>,
}

impl FragmentStream {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Create a bounded channel and the stream reading from it.
    pub fn channel(buffer: usize) -> (mpsc::Sender<StreamEvent>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self::new(rx))
    }

    /// A stream of exactly one fragment followed by end-of-stream.
    pub fn once(text: impl Into<String>) -> Self {
        let (tx, stream) = Self::channel(2);
        // Fresh channel with room for both events
        let _ = tx.try_send(StreamEvent::Delta(text.into()));
        let _ = tx.try_send(StreamEvent::Completed);
        stream
    }

    /// Next event, or `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

}

/// Reply to a sent message: either incremental or all at once.
#[derive(Debug)]
pub enum Reply {
    Streamed(FragmentStream),
    Complete(String),
}

impl Reply {
    /// View any reply as a fragment stream; a complete reply becomes one
    /// fragment followed by end-of-stream.
    pub fn into_stream(self) -> FragmentStream {
        match self {
            Reply::Streamed(stream) => stream,
            Reply::Complete(text) => FragmentStream::once(text),
        }
    }
}

/// Transport for peer conversations
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Start (or restart) the backend conversation for `peer`.
    async fn start_session(
        &self,
        conversation: &ConversationId,
        peer: &PeerId,
        mode: SessionMode,
    ) -> Result<SessionAck, LifecycleError>;

    /// Send a message; the reply may be streamed or complete.
    async fn send_message(
        &self,
        conversation: &ConversationId,
        text: &str,
    ) -> Result<Reply, TransportError>;

    /// End the backend conversation and drop its memory.
    async fn end_session(&self, conversation: &ConversationId)
    -> Result<SessionAck, LifecycleError>;
}
