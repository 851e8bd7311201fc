//! Wording of controller-generated messages.

use crate::command::mode::SessionMode;

/// Seed message of every new peer timeline.
pub const WELCOME: &str = "To use me in default mode, type **`start`**.\n\n\
To use me as a prompt assistant, type **`prompt assistant`** or **`start prompt assistant`**.\n\n\
To use me as an agent assistant, type **`agent assistant`** or **`start agent assistant`**.";

pub const START_FAILED: &str = "Error starting session. Please try again.";

pub const END_FAILED: &str = "Error ending session. Please try again.";

pub const CANCELLED: &str = "Response cancelled.";

const CONNECTION_TROUBLE: &str =
    "Sorry, I'm having trouble connecting to the server. Please try again later.";

pub fn session_started(mode: SessionMode) -> String {
    format!("Session started. Mode: {}.", mode.label())
}

pub fn session_ended(raw: &str) -> String {
    format!("Session ended by user command: '{}'", raw)
}

/// Body of a reply whose stream failed, keeping whatever arrived before.
pub fn stream_failed(partial: &str, error: &str) -> String {
    let details = format!("**Error details:**\n```\n{}\n```", error);
    if partial.is_empty() {
        format!("{}\n\n{}", CONNECTION_TROUBLE, details)
    } else {
        format!("{}\n\n---\n{}\n\n{}", partial, CONNECTION_TROUBLE, details)
    }
}
