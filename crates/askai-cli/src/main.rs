//! askai command-line entry point.
//!
//! Binary name: `askai`
//!
//! Parses CLI arguments, sets up tracing, loads configuration, then
//! dispatches to the requested command.

mod cli;
mod state;

use clap::Parser;

use askai_observe::tracing_setup::{
    TracingOptions, filter_for_verbosity, init_tracing, shutdown_tracing,
};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        enable_otel: cli.otel,
        json: cli.json,
        default_filter: filter_for_verbosity(cli.verbose, cli.quiet).to_string(),
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let state = AppState::init(cli.config_dir.clone(), cli.base_url.clone()).await?;

    let result = match cli.command {
        Commands::Ask { ref question } => {
            cli::ask::ask(&state, &question.join(" "), cli.json, cli.quiet).await
        }
        Commands::Chat => cli::chat::chat(&state, cli.quiet).await,
        Commands::Config => cli::config::show_config(&state, cli.json),
    };

    shutdown_tracing();
    result
}
