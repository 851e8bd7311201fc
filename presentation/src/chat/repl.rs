//! REPL (Read-Eval-Print Loop) for interactive multi-peer chat

use super::input::ReplInput;
use super::renderer::EventRenderer;
use crate::ConsoleFormatter;
use crate::config::ReplConfig;
use crate::progress::StreamProgress;
use chorus_application::{
    Dispatch, DropReason, PeerController, PeerTransport, SessionEvent,
};
use chorus_domain::{PeerId, notice};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

const PROMPT: &str = ">>> ";

/// What the loop does after a line.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Interactive chat REPL
pub struct ChatRepl<T: PeerTransport + 'static> {
    controller: Arc<PeerController<T>>,
    config: ReplConfig,
}

impl<T: PeerTransport + 'static> ChatRepl<T> {
    /// Create a new ChatRepl
    pub fn new(controller: Arc<PeerController<T>>) -> Self {
        Self {
            controller,
            config: ReplConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReplConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the interactive REPL, rendering `events` as they arrive.
    ///
    /// Line editing blocks its worker thread, so this needs the
    /// multi-threaded runtime.
    pub async fn run(&self, events: mpsc::UnboundedReceiver<SessionEvent>) -> RlResult<()> {
        let mut rl = DefaultEditor::new()?;

        let history_path = self.config.history_path();
        if let Some(ref path) = history_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = rl.load_history(path);
        }

        self.print_welcome();

        let renderer = EventRenderer::new(StreamProgress::new(self.config.show_progress));
        let render_task = tokio::spawn(renderer.run(events));

        loop {
            let readline = tokio::task::block_in_place(|| rl.readline(PROMPT));

            match readline {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = rl.add_history_entry(line.as_str());
                    }
                    if self.handle_line(&line) == Flow::Quit {
                        println!("Bye!");
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl-C stops replies instead of leaving
                    let cancelled = self.controller.cancel_all();
                    if cancelled > 0 {
                        println!("{}", format!("Cancelled {} operation(s)", cancelled).yellow());
                    } else {
                        println!("^C (use /quit to exit)");
                    }
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(ref path) = history_path {
            let _ = rl.save_history(path);
        }
        render_task.abort();

        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("╭─────────────────────────────────────────────╮");
        println!("│              Chorus - Chat Mode             │");
        println!("╰─────────────────────────────────────────────╯");
        println!();
        println!(
            "Peers: {}",
            self.controller
                .peers()
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!();
        println!("{}", notice::WELCOME);
        println!();
        println!("Type /help for commands, @peer <text> to address one peer.");
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("Input:");
        println!("  <text>              - Send to every selected peer");
        println!("  @<peer> <text>      - Send to one peer (selects it if needed)");
        println!();
        println!("Commands:");
        println!("  /peers, /p          - List selected peers");
        println!("  /add <peer>         - Select a peer");
        println!("  /remove <peer>      - Deselect a peer and drop its history");
        println!("  /cancel [peer]      - Cancel one peer's reply, or all of them");
        println!("  /show [peer]        - Print a peer's timeline, or all of them");
        println!("  /help, /h, /?       - Show this help");
        println!("  /quit, /exit, /q    - Exit chat");
        println!();
    }

    /// Handle one input line.
    fn handle_line(&self, line: &str) -> Flow {
        match ReplInput::parse(line) {
            ReplInput::Empty => {}
            ReplInput::Broadcast(text) => {
                for (peer, dispatch) in self.controller.broadcast(&text) {
                    Self::report(&peer, dispatch);
                }
            }
            ReplInput::Direct { peer, text } => {
                let dispatch = self.controller.issue_command(&peer, &text);
                Self::report(&peer, dispatch);
            }
            ReplInput::Peers => {
                println!("{}", ConsoleFormatter::format_peers(&self.controller.snapshot()));
            }
            ReplInput::Add(peer) => {
                if !self.controller.add_peer(&peer) {
                    println!("{} is already selected", peer);
                }
            }
            ReplInput::Remove(peer) => self.remove(&peer),
            ReplInput::Cancel(Some(peer)) => {
                if !self.controller.cancel(&peer) {
                    println!("{} has nothing to cancel", peer);
                }
            }
            ReplInput::Cancel(None) => {
                let cancelled = self.controller.cancel_all();
                println!("Cancelled {} operation(s)", cancelled);
            }
            ReplInput::Show(Some(peer)) => match self.controller.view(&peer) {
                Some(view) => println!("{}", ConsoleFormatter::format_view(&view)),
                None => println!("{} is not selected", peer),
            },
            ReplInput::Show(None) => {
                for view in self.controller.snapshot().values() {
                    println!("{}\n", ConsoleFormatter::format_view(view));
                }
            }
            ReplInput::Help => self.print_help(),
            ReplInput::Quit => return Flow::Quit,
            ReplInput::Invalid(reason) => println!("{}", reason),
        }
        Flow::Continue
    }

    fn remove(&self, peer: &PeerId) {
        let peers = self.controller.peers();
        if !peers.contains(peer) {
            println!("{} is not selected", peer);
        } else if peers.len() == 1 {
            println!("{} is the last selected peer and stays", peer);
        } else {
            self.controller.remove_peer(peer);
        }
    }

    fn report(peer: &PeerId, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Accepted(_) => debug!(%peer, "command dispatched"),
            Dispatch::Dropped(DropReason::Blank) => {}
            Dispatch::Dropped(DropReason::Busy(phase)) => {
                println!(
                    "{}",
                    format!("{} is busy ({}); input ignored", peer, phase).dimmed()
                );
            }
        }
    }
}
