//! Parsing of REPL input lines.
//!
//! Slash commands drive the REPL itself; `@peer text` targets one peer;
//! anything else is broadcast to every selected peer, where it is
//! classified as a start, end or message command.

use chorus_domain::PeerId;

/// One parsed REPL line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Empty,
    Broadcast(String),
    Direct { peer: PeerId, text: String },
    Peers,
    Add(PeerId),
    Remove(PeerId),
    Cancel(Option<PeerId>),
    Show(Option<PeerId>),
    Help,
    Quit,
    /// Malformed input; the string explains what is wrong.
    Invalid(String),
}

impl ReplInput {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ReplInput::Empty;
        }

        if let Some(rest) = trimmed.strip_prefix('@') {
            let (peer, text) = split_word(rest);
            return match (PeerId::new(peer), text.is_empty()) {
                (Ok(peer), false) => ReplInput::Direct {
                    peer,
                    text: text.to_string(),
                },
                _ => ReplInput::Invalid("usage: @<peer> <message>".to_string()),
            };
        }

        if let Some(rest) = trimmed.strip_prefix('/') {
            let (command, argument) = split_word(rest);
            let peer = PeerId::new(argument).ok();
            return match (command.to_lowercase().as_str(), peer) {
                ("peers" | "p", _) => ReplInput::Peers,
                ("add" | "a", Some(peer)) => ReplInput::Add(peer),
                ("remove" | "rm", Some(peer)) => ReplInput::Remove(peer),
                ("add" | "a" | "remove" | "rm", None) => {
                    ReplInput::Invalid(format!("usage: /{} <peer>", command))
                }
                ("cancel" | "c", peer) => ReplInput::Cancel(peer),
                ("show" | "s", peer) => ReplInput::Show(peer),
                ("help" | "h" | "?", _) => ReplInput::Help,
                ("quit" | "exit" | "q", _) => ReplInput::Quit,
                _ => ReplInput::Invalid(format!(
                    "Unknown command: /{}\nType /help for available commands",
                    command
                )),
            };
        }

        // Keep the original text; peers classify and send it as typed
        ReplInput::Broadcast(line.to_string())
    }
}

fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}
