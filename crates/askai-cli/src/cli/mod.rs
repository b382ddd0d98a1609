//! CLI command definitions for the `askai` binary.

pub mod ask;
pub mod chat;
pub mod config;
pub mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Ask questions of a documentation answer service.
#[derive(Parser)]
#[command(name = "askai", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress everything except the answer and errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed logging (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Answer service base URL (overrides config.toml).
    #[arg(long, global = true, env = "ASKAI_BASE_URL")]
    pub base_url: Option<String>,

    /// Directory holding config.toml (default: ~/.askai).
    #[arg(long, global = true, env = "ASKAI_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a single question and stream the answer.
    Ask {
        /// The question; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Interactive conversation (/end resets, /quit exits, Ctrl+C cancels).
    Chat,

    /// Print the effective configuration.
    Config,
}
