//! Command classification for raw user input.
//!
//! Matching is done on the trimmed, lower-cased text; the original text is
//! kept for anything that gets forwarded to a peer. Classification never
//! fails: unknown words are ordinary messages.

use super::mode::SessionMode;

const END_WORDS: [&str; 4] = ["exit", "quit", "clear", "end"];

/// A classified piece of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start (or restart) the backend session in the given mode.
    Start { mode: SessionMode },
    /// End the backend session. `raw` is the input that triggered it, as typed.
    End { raw: String },
    /// An ordinary message, sent verbatim.
    Message { text: String },
}

impl Command {
    /// Classify raw user input.
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        let normalized = trimmed.to_lowercase();

        let mode = match normalized.as_str() {
            "start" => Some(SessionMode::Default),
            "start prompt assistant" | "prompt assistant" => Some(SessionMode::PromptAssistant),
            "start agent assistant" | "agent assistant" => Some(SessionMode::AgentAssistant),
            _ => None,
        };
        if let Some(mode) = mode {
            return Command::Start { mode };
        }

        if END_WORDS.contains(&normalized.as_str()) {
            return Command::End {
                raw: raw.to_string(),
            };
        }

        Command::Message {
            text: raw.to_string(),
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Start { .. } => "start",
            Command::End { .. } => "end",
            Command::Message { .. } => "message",
        }
    }
}
