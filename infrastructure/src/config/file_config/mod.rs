//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly; conversion to application types happens
//! in [`FileConfig::to_controller_config`] and the `parse_*` helpers.

mod backend;
mod logging;
mod peers;
mod repl;
mod stream;

pub use backend::{DEFAULT_BASE_URL, FileBackendConfig};
pub use logging::FileLoggingConfig;
pub use peers::{DEFAULT_PEER, FilePeersConfig};
pub use repl::FileReplConfig;
pub use stream::FileStreamConfig;

use chorus_application::ControllerConfig;
use serde::{Deserialize, Serialize};

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The affected value is unusable and was skipped or replaced.
    Error,
    /// The configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    EmptyPeerId { index: usize },
    DuplicatePeer { peer: String },
    NoPeers,
    InvalidBaseUrl { value: String },
    EmptySessionRoot,
    ZeroEventBuffer,
}

/// A detected issue in the configuration.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Backend address and conversation naming
    pub backend: FileBackendConfig,
    /// Peers selected at startup
    pub peers: FilePeersConfig,
    /// Stream publishing behaviour
    pub stream: FileStreamConfig,
    /// Transcript and diagnostic log files
    pub logging: FileLoggingConfig,
    /// REPL settings
    pub repl: FileReplConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Never fails: callers decide whether to print, warn or abort.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        let (peers, peer_issues) = self.peers.parse_default();
        issues.extend(peer_issues);
        if peers.is_empty() {
            issues.push(ConfigIssue {
                severity: Severity::Warning,
                code: ConfigIssueCode::NoPeers,
                message: format!(
                    "peers.default: no usable peer configured, falling back to '{}'",
                    DEFAULT_PEER
                ),
            });
        }

        if !self.backend.has_http_scheme() {
            issues.push(ConfigIssue {
                severity: Severity::Error,
                code: ConfigIssueCode::InvalidBaseUrl {
                    value: self.backend.base_url.clone(),
                },
                message: format!(
                    "backend.base_url: '{}' must start with http:// or https://",
                    self.backend.base_url
                ),
            });
        }

        if self.backend.session_root.trim().is_empty() {
            issues.push(ConfigIssue {
                severity: Severity::Warning,
                code: ConfigIssueCode::EmptySessionRoot,
                message: "backend.session_root is empty; conversation ids will start with '_'"
                    .to_string(),
            });
        }

        if self.stream.event_buffer == 0 {
            issues.push(ConfigIssue {
                severity: Severity::Warning,
                code: ConfigIssueCode::ZeroEventBuffer,
                message: "stream.event_buffer: 0 is not a valid capacity, using 1".to_string(),
            });
        }

        issues
    }

    /// Application-level controller settings.
    pub fn to_controller_config(&self) -> ControllerConfig {
        ControllerConfig::default()
            .with_session_root(self.backend.session_root.trim())
            .with_publish_interval_ms(self.stream.publish_interval_ms)
            .with_cancel_notice(self.stream.cancel_notice)
    }
}
