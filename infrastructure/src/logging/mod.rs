//! Transcript logging.
//!
//! [`JsonlConversationLogger`] appends every conversation event the
//! controller reports as one JSON line, for replay and auditing outside the
//! terminal session.

mod jsonl_logger;

pub use jsonl_logger::JsonlConversationLogger;
