//! Console output formatter for peer timelines

use chorus_application::PeerView;
use chorus_domain::{Message, PeerId, Phase, Role};
use colored::Colorize;
use std::collections::BTreeMap;

/// Formats messages and peer state for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format one message with a `[HH:MM] peer` header.
    pub fn format_message(peer: &PeerId, message: &Message) -> String {
        let time = message
            .created_at()
            .with_timezone(&chrono::Local)
            .format("%H:%M");
        let header = match message.role() {
            Role::User => format!("you → {}", peer).cyan().bold(),
            Role::Peer => peer.to_string().green().bold(),
            Role::System => format!("{} · system", peer).yellow(),
        };

        let mut output = format!("{} {}\n", format!("[{}]", time).dimmed(), header);
        output.push_str(&Self::indent(message.body(), "  "));
        if message.is_in_progress() {
            output.push_str(&format!(" {}", "…".dimmed()));
        }
        output
    }

    /// Format a peer's whole timeline.
    pub fn format_view(view: &PeerView) -> String {
        let mut output = Self::header(&format!("{} ({})", view.peer, Self::phase(view.phase)));
        for message in view.timeline.messages() {
            output.push('\n');
            output.push_str(&Self::format_message(&view.peer, message));
            output.push('\n');
        }
        output
    }

    /// One line per selected peer with its phase and timeline length.
    pub fn format_peers(snapshot: &BTreeMap<PeerId, PeerView>) -> String {
        if snapshot.is_empty() {
            return "No peers selected".dimmed().to_string();
        }
        snapshot
            .values()
            .map(|view| {
                format!(
                    "  {:<24} {:<10} {} messages",
                    view.peer.as_str().bold(),
                    Self::phase(view.phase),
                    view.timeline.len()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn phase(phase: Phase) -> String {
        match phase {
            Phase::Idle => "idle".green().to_string(),
            Phase::AwaitingLifecycleAck => "waiting".yellow().to_string(),
            Phase::Streaming => "streaming".cyan().to_string(),
        }
    }

    fn header(title: &str) -> String {
        format!("{}\n{}", title.cyan().bold(), "-".repeat(40).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
