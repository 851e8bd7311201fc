//! Message timeline of a single peer

use crate::core::error::DomainError;
use crate::session::message::{Message, MessageId};
use std::sync::Arc;

/// Ordered message history of one peer.
///
/// Messages are stored as shared immutable snapshots. Updating an in-progress
/// message swaps in a new snapshot, so a clone of the timeline taken earlier
/// keeps seeing the old one.
///
/// Invariant: at most one message is in progress at any time.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    messages: Vec<Arc<Message>>,
}

impl Timeline {
    /// A timeline holding a single seed message.
    pub fn seeded(seed: Message) -> Self {
        Self {
            messages: vec![Arc::new(seed)],
        }
    }

    pub fn messages(&self) -> &[Arc<Message>] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Arc<Message>> {
        self.messages.last()
    }

    /// The message currently being streamed, if any.
    pub fn in_progress(&self) -> Option<&Arc<Message>> {
        self.messages.iter().rev().find(|m| m.is_in_progress())
    }

    /// Append a message at the end.
    ///
    /// Fails if `message` is in progress while another one already is.
    pub fn push(&mut self, message: Message) -> Result<Arc<Message>, DomainError> {
        if message.is_in_progress()
            && let Some(current) = self.in_progress()
        {
            return Err(DomainError::InProgressConflict(current.id()));
        }
        let message = Arc::new(message);
        self.messages.push(Arc::clone(&message));
        Ok(message)
    }

    /// Publish a new body for the in-progress message `id`.
    pub fn publish(&mut self, id: MessageId, body: &str) -> Result<Arc<Message>, DomainError> {
        self.replace(id, |m| m.with_body(body))
    }

    /// Replace the body of the in-progress message `id` and finish it.
    pub fn settle(&mut self, id: MessageId, body: &str) -> Result<Arc<Message>, DomainError> {
        self.replace(id, |m| m.with_body(body).finalized())
    }

    fn replace(
        &mut self,
        id: MessageId,
        next: impl FnOnce(&Message) -> Message,
    ) -> Result<Arc<Message>, DomainError> {
        let slot = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.id() == id && m.is_in_progress())
            .ok_or(DomainError::NotInProgress(id))?;
        let replacement = Arc::new(next(slot.as_ref()));
        *slot = replacement;
        Ok(Arc::clone(slot))
    }
}
