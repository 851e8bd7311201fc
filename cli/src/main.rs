//! CLI entrypoint for chorus
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use chorus_application::PeerController;
use chorus_domain::PeerId;
use chorus_infrastructure::config::DEFAULT_PEER;
use chorus_infrastructure::{
    ConfigLoader, FileConfig, HttpPeerTransport, JsonlConversationLogger, Severity,
};
use chorus_presentation::{ChatRepl, Cli, ReplConfig};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// How long pending `end` calls may run after the REPL exits.
const TEARDOWN_GRACE: Duration = Duration::from_secs(3);

/// Route diagnostics to stderr, or to `log_file` when one is configured.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let Some(file_name) = path.file_name() else {
        bail!("log file '{}' has no file name", path.display());
    };
    std::fs::create_dir_all(directory)
        .with_context(|| format!("creating log directory {}", directory.display()))?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(Some(guard))
}

fn load_config(cli: &Cli) -> Result<FileConfig> {
    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref()).context("failed to load configuration")?
    };

    // CLI flags win over every file layer
    if let Some(url) = &cli.base_url {
        config.backend.base_url = url.clone();
    }
    if let Some(root) = &cli.session_root {
        config.backend.session_root = root.clone();
    }
    if let Some(path) = &cli.conversation_log {
        config.logging.conversation_log = Some(path.display().to_string());
    }
    if let Some(path) = &cli.log_file {
        config.logging.file = Some(path.display().to_string());
    }
    if cli.quiet {
        config.repl.show_progress = false;
    }
    if !cli.peer.is_empty() {
        config.peers.default = cli.peer.clone();
    }

    Ok(config)
}

fn initial_peers(config: &FileConfig) -> Vec<PeerId> {
    let (peers, _) = config.peers.parse_default();
    if !peers.is_empty() {
        return peers;
    }
    PeerId::new(DEFAULT_PEER).into_iter().collect()
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(());
    }

    let config = load_config(&cli)?;
    let _guard = init_tracing(cli.verbose, config.logging.file.as_deref().map(Path::new))?;

    info!("Starting chorus");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            Severity::Error => eprintln!("config error: {}", issue.message),
            Severity::Warning => eprintln!("config warning: {}", issue.message),
        }
    }
    if issues.iter().any(|issue| issue.severity == Severity::Error) {
        bail!("configuration has errors");
    }

    // === Dependency Injection ===
    let connect_timeout = match config.backend.connect_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let transport = HttpPeerTransport::new(config.backend.base_url.trim(), connect_timeout)?
        .with_event_buffer(config.stream.event_buffer);
    info!(base_url = transport.base_url(), "backend transport ready");

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let mut controller = PeerController::new(Arc::new(transport), config.to_controller_config())
        .with_event_sender(events_tx);

    if let Some(path) = &config.logging.conversation_log {
        let path = PathBuf::from(path);
        let logger = JsonlConversationLogger::open(&path)
            .with_context(|| format!("opening conversation log {}", path.display()))?;
        info!(path = %path.display(), run = logger.run(), "conversation log enabled");
        controller = controller.with_conversation_logger(Arc::new(logger));
    }

    controller.select(&initial_peers(&config));
    let controller = Arc::new(controller);

    let repl = ChatRepl::new(Arc::clone(&controller)).with_config(ReplConfig {
        show_progress: config.repl.show_progress,
        history_file: config.repl.history_file.clone(),
    });
    repl.run(events_rx).await?;

    // Close backend sessions before exiting
    let handle = controller.teardown();
    if !handle.is_empty() {
        match handle.wait_timeout(TEARDOWN_GRACE).await {
            Some(failures) => {
                for (peer, error) in failures {
                    warn!(%peer, %error, "failed to end session");
                }
            }
            None => warn!("timed out ending sessions"),
        }
    }

    Ok(())
}
