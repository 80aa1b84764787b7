//! CLI argument definitions using clap.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use gateway_config::{ConfigLoader, ProviderConfig};
use gateway_dispatch::Gateway;
use gateway_telemetry::GatewayMetrics;
use std::path::PathBuf;

use crate::commands;
use crate::output::OutputFormat;

/// AI Gateway - one interface over local and cloud model backends
#[derive(Parser, Debug)]
#[command(name = "ai-gateway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (YAML or TOML); environment variables override it
    #[arg(short, long, env = "GATEWAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Print Prometheus metrics to stderr after the command
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a chat completion request
    Chat(commands::chat::ChatArgs),

    /// Complete a raw prompt without chat roles
    Generate(commands::generate::GenerateArgs),

    /// Compute embeddings for one or more texts
    Embed(commands::embed::EmbedArgs),

    /// Transcribe an audio file
    Transcribe(commands::transcribe::TranscribeArgs),

    /// Check provider health
    Health(commands::health::HealthArgs),

    /// List models available at the provider, or pull one
    Models(commands::models::ModelsArgs),

    /// Show the resolved configuration
    Config(commands::config::ConfigArgs),
}

/// Shared state handed to every command that talks to a provider.
pub struct Context {
    /// The gateway over the configured provider
    pub gateway: Gateway,
    /// Output format
    pub format: OutputFormat,
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let format = OutputFormat::from_json_flag(self.json);
        let config = self.load_config().await?;

        if let Commands::Config(args) = self.command {
            return commands::config::execute(args, &config, format);
        }

        let metrics = GatewayMetrics::new()?;
        let gateway = Gateway::from_config(&config)
            .context("Failed to initialize provider")?
            .with_metrics(metrics.clone());
        let ctx = Context { gateway, format };

        let result = match self.command {
            Commands::Chat(args) => commands::chat::execute(args, &ctx).await,
            Commands::Generate(args) => commands::generate::execute(args, &ctx).await,
            Commands::Embed(args) => commands::embed::execute(args, &ctx).await,
            Commands::Transcribe(args) => commands::transcribe::execute(args, &ctx).await,
            Commands::Health(args) => commands::health::execute(args, &ctx).await,
            Commands::Models(args) => commands::models::execute(args, &ctx).await,
            Commands::Config(_) => Ok(()),
        };

        if self.metrics {
            eprint!("{}", metrics.render()?);
        }

        result
    }

    async fn load_config(&self) -> Result<ProviderConfig> {
        let mut loader = ConfigLoader::new();
        if let Some(path) = &self.config {
            loader = loader.with_file(path);
        }
        loader.load().await.context("Invalid configuration")
    }
}
