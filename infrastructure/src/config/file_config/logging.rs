//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};

/// Raw logging configuration from TOML
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL transcript path; disabled when unset
    pub conversation_log: Option<String>,
    /// Diagnostic log file; stderr only when unset
    pub file: Option<String>,
}
