//! Presentation-level configuration
//!
//! Configuration for REPL behavior. Filled in by the binary from the config
//! file and CLI flags.

use std::path::PathBuf;

/// REPL configuration for the presentation layer
#[derive(Debug, Clone)]
pub struct ReplConfig {
    /// Show a live spinner per streaming peer
    pub show_progress: bool,
    /// Path to history file (`~/` is expanded)
    pub history_file: Option<String>,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            show_progress: true,
            history_file: None,
        }
    }
}

impl ReplConfig {
    /// History file to use, falling back to the platform data directory.
    pub fn history_path(&self) -> Option<PathBuf> {
        match &self.history_file {
            Some(path) => Some(expand_home(path)),
            None => dirs::data_dir().map(|d| d.join("chorus").join("history.txt")),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
