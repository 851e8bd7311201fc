//! Controller configuration.

use std::time::Duration;

/// Default session root used to derive conversation ids.
pub const DEFAULT_SESSION_ROOT: &str = "1";

/// Runtime behaviour of the [`PeerController`](crate::PeerController).
///
/// Populated from the infrastructure config file at startup and static
/// afterwards.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Stable prefix of every backend conversation id (`{root}_{peer}`).
    pub session_root: String,
    /// Minimum time between two published snapshots of a streaming reply.
    ///
    /// `Duration::ZERO` publishes every fragment as it arrives. Batched
    /// fragments are always flushed once the interval elapses and when the
    /// stream ends.
    pub publish_interval: Duration,
    /// Append a short system notice after a cancelled reply.
    pub cancel_notice: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            session_root: DEFAULT_SESSION_ROOT.to_string(),
            publish_interval: Duration::ZERO,
            cancel_notice: false,
        }
    }
}

impl ControllerConfig {
    pub fn with_session_root(mut self, root: impl Into<String>) -> Self {
        self.session_root = root.into();
        self
    }

    pub fn with_publish_interval(mut self, interval: Duration) -> Self {
        self.publish_interval = interval;
        self
    }

    /// Creates the publish interval from milliseconds.
    pub fn with_publish_interval_ms(self, millis: u64) -> Self {
        self.with_publish_interval(Duration::from_millis(millis))
    }

    pub fn with_cancel_notice(mut self, enabled: bool) -> Self {
        self.cancel_notice = enabled;
        self
    }
}
