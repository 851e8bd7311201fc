//! Infrastructure layer for chorus
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod http;
pub mod logging;

// Re-export commonly used types
pub use config::{
    ConfigIssue, ConfigIssueCode, ConfigLoader, FileBackendConfig, FileConfig, FileLoggingConfig,
    FilePeersConfig, FileReplConfig, FileStreamConfig, Severity,
};
pub use http::{HttpPeerTransport, HttpTransportError};
pub use logging::JsonlConversationLogger;
