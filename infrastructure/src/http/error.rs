//! Error types for the HTTP backend adapter

use chorus_application::TransportError;
use thiserror::Error;

/// Result type alias for HTTP adapter operations
pub type Result<T> = std::result::Result<T, HttpTransportError>;

/// Errors that can occur when talking to the backend over HTTP
#[derive(Error, Debug)]
pub enum HttpTransportError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("Failed to parse response: {error}\nRaw response: {raw}")]
    ParseError { error: String, raw: String },
}

impl From<HttpTransportError> for TransportError {
    fn from(error: HttpTransportError) -> Self {
        match error {
            HttpTransportError::Status(code) => TransportError::HttpStatus(code),
            HttpTransportError::Request(e) if e.is_connect() || e.is_timeout() => {
                TransportError::ConnectionError(e.to_string())
            }
            HttpTransportError::Request(e) => TransportError::RequestFailed(e.to_string()),
            HttpTransportError::ParseError { error, .. } => TransportError::ProtocolError(error),
            HttpTransportError::ClientBuild(e) => TransportError::ConnectionError(e),
        }
    }
}
