//! Message entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide monotonic message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    /// Allocate the next identifier. Strictly increasing within the process.
    pub fn next() -> Self {
        Self(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Peer,
    /// Notices generated by the controller itself (welcome, lifecycle acks).
    System,
}

/// A message snapshot (Entity)
///
/// Snapshots are never mutated. A streaming reply is represented by a chain of
/// snapshots sharing one [`MessageId`]; each call to [`Message::with_body`]
/// produces the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    body: String,
    created_at: DateTime<Utc>,
    in_progress: bool,
}

impl Message {
    fn new(role: Role, body: String, in_progress: bool) -> Self {
        Self {
            id: MessageId::next(),
            role,
            body,
            created_at: Utc::now(),
            in_progress,
        }
    }

    pub fn user(body: impl Into<String>) -> Self {
        Self::new(Role::User, body.into(), false)
    }

    pub fn system(body: impl Into<String>) -> Self {
        Self::new(Role::System, body.into(), false)
    }

    /// Empty peer reply that a stream will fill in.
    pub fn placeholder() -> Self {
        Self::new(Role::Peer, String::new(), true)
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    /// Next snapshot of an in-progress message with a new body.
    pub fn with_body(&self, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..self.clone()
        }
    }

    /// Final snapshot: same body, no longer in progress.
    pub fn finalized(&self) -> Self {
        Self {
            in_progress: false,
            ..self.clone()
        }
    }
}
