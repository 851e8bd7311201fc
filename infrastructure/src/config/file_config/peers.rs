//! Peer selection from TOML (`[peers]` section)

use super::{ConfigIssue, ConfigIssueCode, Severity};
use chorus_domain::PeerId;
use serde::{Deserialize, Serialize};

/// Peer selected when nothing else is configured.
pub const DEFAULT_PEER: &str = "gemini-2.5-pro";

/// Raw peer configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePeersConfig {
    /// Peers selected at startup
    pub default: Vec<String>,
}

impl Default for FilePeersConfig {
    fn default() -> Self {
        Self {
            default: vec![DEFAULT_PEER.to_string()],
        }
    }
}

impl FilePeersConfig {
    /// Parse the configured peers, skipping invalid and duplicate entries.
    pub fn parse_default(&self) -> (Vec<PeerId>, Vec<ConfigIssue>) {
        let mut peers: Vec<PeerId> = Vec::new();
        let mut issues = Vec::new();

        for (index, raw) in self.default.iter().enumerate() {
            match PeerId::new(raw.as_str()) {
                Ok(peer) if peers.contains(&peer) => issues.push(ConfigIssue {
                    severity: Severity::Warning,
                    code: ConfigIssueCode::DuplicatePeer {
                        peer: peer.to_string(),
                    },
                    message: format!("peers.default: '{}' is listed more than once", peer),
                }),
                Ok(peer) => peers.push(peer),
                Err(_) => issues.push(ConfigIssue {
                    severity: Severity::Error,
                    code: ConfigIssueCode::EmptyPeerId { index },
                    message: format!("peers.default[{}]: peer id must not be empty", index),
                }),
            }
        }

        (peers, issues)
    }
}
