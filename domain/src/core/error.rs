//! Domain error types

use crate::session::message::MessageId;
use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid peer id: {0:?}")]
    InvalidPeer(String),

    #[error("Timeline already has an in-progress message ({0})")]
    InProgressConflict(MessageId),

    #[error("Message {0} is not in progress")]
    NotInProgress(MessageId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_peer_display() {
        let error = DomainError::InvalidPeer("a b".to_string());
        assert_eq!(error.to_string(), "Invalid peer id: \"a b\"");
    }
}
