//! Configuration file loading for chorus
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `--config <path>` specified file
//! 2. Project root: `./chorus.toml` or `./.chorus.toml`
//! 3. XDG config: `$XDG_CONFIG_HOME/chorus/config.toml`
//! 4. `CHORUS_*` environment variables
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigIssue, ConfigIssueCode, DEFAULT_BASE_URL, DEFAULT_PEER, FileBackendConfig, FileConfig,
    FileLoggingConfig, FilePeersConfig, FileReplConfig, FileStreamConfig, Severity,
};
pub use loader::ConfigLoader;
