//! Streaming configuration from TOML (`[stream]` section)

use serde::{Deserialize, Serialize};

/// Raw stream configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStreamConfig {
    /// Minimum milliseconds between published snapshots (0 = every fragment)
    pub publish_interval_ms: u64,
    /// Append "Response cancelled." after a cancelled reply
    pub cancel_notice: bool,
    /// Capacity of the fragment channel between HTTP reader and reducer
    pub event_buffer: usize,
}

impl Default for FileStreamConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: 0,
            cancel_notice: false,
            event_buffer: 64,
        }
    }
}
