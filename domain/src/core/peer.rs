//! Peer identity value objects

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one conversational backend (Value Object)
///
/// Usually a model name such as `gemini-2.5-pro`. Surrounding whitespace is
/// stripped; an empty identifier is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidPeer(id));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PeerId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PeerId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PeerId> for String {
    fn from(value: PeerId) -> Self {
        value.0
    }
}

impl AsRef<str> for PeerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Backend-side conversation key for one peer.
///
/// Derived as `{root}_{peer}` so that every peer under the same session root
/// talks to its own backend conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn derive(root: &str, peer: &PeerId) -> Self {
        Self(format!("{}_{}", root, peer))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
