//! One spinner per busy peer.
//!
//! A spinner appears when a peer leaves `Idle` and disappears when it comes
//! back. While a reply streams, the spinner shows how much has arrived.

use chorus_domain::{PeerId, Phase};
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;

/// Spinner set keyed by peer
pub struct StreamProgress {
    multi: MultiProgress,
    bars: HashMap<PeerId, ProgressBar>,
}

impl StreamProgress {
    /// Spinners drawn to stderr, or never drawn when `enabled` is false.
    pub fn new(enabled: bool) -> Self {
        let target = if enabled {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: HashMap::new(),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    /// Follow a phase change of `peer`.
    pub fn on_phase(&mut self, peer: &PeerId, phase: Phase) {
        match phase {
            Phase::Idle => {
                if let Some(bar) = self.bars.remove(peer) {
                    bar.finish_and_clear();
                    self.multi.remove(&bar);
                }
            }
            Phase::AwaitingLifecycleAck => {
                self.bar(peer).set_message("waiting for backend".dimmed().to_string());
            }
            Phase::Streaming => {
                self.bar(peer).set_message("thinking…".dimmed().to_string());
            }
        }
    }

    /// Report the length of the reply streamed so far.
    pub fn on_progress(&mut self, peer: &PeerId, chars: usize) {
        if let Some(bar) = self.bars.get(peer) {
            bar.set_message(format!("{} chars", chars));
        }
    }

    /// Print `line` without tearing the spinners.
    pub fn println(&self, line: &str) {
        self.multi.suspend(|| println!("{}", line));
    }

    /// Number of peers with a spinner.
    pub fn active(&self) -> usize {
        self.bars.len()
    }

    /// Drop every spinner.
    pub fn clear(&mut self) {
        for (_, bar) in self.bars.drain() {
            bar.finish_and_clear();
        }
        let _ = self.multi.clear();
    }

    fn bar(&mut self, peer: &PeerId) -> &ProgressBar {
        self.bars.entry(peer.clone()).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new_spinner());
            bar.set_style(Self::spinner_style());
            bar.set_prefix(peer.to_string());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        })
    }
}
