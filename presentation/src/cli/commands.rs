//! CLI command definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for chorus
#[derive(Parser, Debug)]
#[command(name = "chorus")]
#[command(author, version, about = "Chat with several LLM backends side by side")]
#[command(long_about = r#"
Chorus keeps one conversation per peer (backend model) and streams every
reply into its own timeline. Plain input goes to every selected peer;
`@peer text` targets one.

Each peer understands the same commands:
  start | prompt assistant | agent assistant   start a backend session
  exit | quit | clear | end                    end it
  anything else                                sent as a message

Configuration files are loaded from (in priority order):
1. --config <path>                   Explicit config file
2. ./chorus.toml or ./.chorus.toml   Project-level config
3. ~/.config/chorus/config.toml      Global config
4. CHORUS_* environment variables    e.g. CHORUS_BACKEND__BASE_URL

Example:
  chorus
  chorus -p gemini-2.5-pro -p gpt-4o --base-url http://localhost:8001
"#)]
pub struct Cli {
    /// Peers to select at startup (can be specified multiple times)
    #[arg(short, long, value_name = "PEER")]
    pub peer: Vec<String>,

    /// Backend base URL (overrides config)
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Prefix of backend conversation ids (overrides config)
    #[arg(long, value_name = "ROOT")]
    pub session_root: Option<String>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Append the conversation transcript (JSONL) to this file
    #[arg(long, value_name = "PATH")]
    pub conversation_log: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}
