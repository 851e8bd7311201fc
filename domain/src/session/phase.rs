//! Peer phase value object

use serde::{Deserialize, Serialize};

/// Current stage of a peer's session state machine.
///
/// A peer has at most one outstanding transport call; the phase records which
/// kind it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    /// A start-session or end-session call is in flight.
    AwaitingLifecycleAck,
    /// A reply is being streamed into the timeline.
    Streaming,
}

impl Phase {
    pub fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::AwaitingLifecycleAck => "awaiting ack",
            Phase::Streaming => "streaming",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
