//! Renders controller events to the terminal.
//!
//! Finalized messages are printed once; in-progress updates only move the
//! peer's spinner. User messages are not echoed since the user just typed
//! them.

use crate::output::console::ConsoleFormatter;
use crate::progress::StreamProgress;
use chorus_application::SessionEvent;
use chorus_domain::Role;
use colored::Colorize;
use tokio::sync::mpsc;

/// Event-driven terminal renderer
pub struct EventRenderer {
    progress: StreamProgress,
}

impl EventRenderer {
    pub fn new(progress: StreamProgress) -> Self {
        Self { progress }
    }

    /// Apply one event; returns the text to print, if any.
    pub fn render(&mut self, event: SessionEvent) -> Option<String> {
        match event {
            SessionEvent::PeerAdded { peer } => {
                Some(format!("{} {}", "+".green(), peer).dimmed().to_string())
            }
            SessionEvent::PeerRemoved { peer } => {
                self.progress.on_phase(&peer, chorus_domain::Phase::Idle);
                Some(format!("{} {}", "-".red(), peer).dimmed().to_string())
            }
            SessionEvent::PhaseChanged { peer, phase } => {
                self.progress.on_phase(&peer, phase);
                None
            }
            SessionEvent::MessageAppended { peer, message } => {
                if message.role() == Role::User || message.is_in_progress() {
                    return None;
                }
                Some(ConsoleFormatter::format_message(&peer, &message))
            }
            SessionEvent::MessageUpdated { peer, message } => {
                if message.is_in_progress() {
                    self.progress
                        .on_progress(&peer, message.body().chars().count());
                    return None;
                }
                Some(ConsoleFormatter::format_message(&peer, &message))
            }
        }
    }

    /// Render events until the controller goes away.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            if let Some(text) = self.render(event) {
                self.progress.println(&format!("\n{}", text));
            }
        }
        self.progress.clear();
    }
}
