//! AI Gateway CLI
//!
//! Command-line front end for the AI provider gateway: chat, embeddings and
//! transcription against the provider selected by configuration.

use anyhow::Result;
use clap::Parser;
use gateway_telemetry::{init_logging, LoggingConfig};

mod cli;
mod commands;
mod output;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let logging = LoggingConfig::from_verbosity(cli.verbose);
    let logging = if cli.json { logging.json() } else { logging };
    init_logging(&logging)?;

    cli.execute().await
}
