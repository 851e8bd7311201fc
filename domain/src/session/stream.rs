//! Streaming events for incremental peer replies.
//!
//! [`StreamEvent`] is what a transport hands to the controller for one
//! outstanding send: any number of `Delta` fragments followed by exactly one
//! terminal event.

/// An event in a streaming peer reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text fragment, applied verbatim after all previous fragments.
    Delta(String),
    /// Explicit end-of-stream marker.
    Completed,
    /// The transport failed mid-stream.
    Error(String),
}

impl StreamEvent {
    /// Returns the fragment text if this is a Delta event.
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamEvent::Delta(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this event signals the end of the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed | StreamEvent::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_text_returns_content() {
        let event = StreamEvent::Delta("hello".to_string());
        assert_eq!(event.text(), Some("hello"));
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_completed_is_terminal() {
        assert!(StreamEvent::Completed.is_terminal());
        assert_eq!(StreamEvent::Completed.text(), None);
    }

    #[test]
    fn test_error_text_returns_none_and_is_terminal() {
        let event = StreamEvent::Error("oops".to_string());
        assert_eq!(event.text(), None);
        assert!(event.is_terminal());
    }
}
