//! Backend configuration from TOML (`[backend]` section)

use serde::{Deserialize, Serialize};

/// Default address of the conversational backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8001";

/// Raw backend configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBackendConfig {
    /// Base URL the `/api/*` endpoints hang off
    pub base_url: String,
    /// Prefix of every conversation id (`{session_root}_{peer}`)
    pub session_root: String,
    /// Connect timeout in seconds (0 disables it)
    pub connect_timeout_secs: u64,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_root: chorus_application::config::controller_config::DEFAULT_SESSION_ROOT
                .to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl FileBackendConfig {
    /// Whether `base_url` looks like something reqwest can talk to.
    pub fn has_http_scheme(&self) -> bool {
        let url = self.base_url.trim();
        url.starts_with("http://") || url.starts_with("https://")
    }
}
