//! Models command - list models the provider reports, or pull one.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::Context;
use crate::output::{self, Busy, Envelope, Level};

/// Arguments for the models command.
#[derive(Args, Debug)]
#[command(args_conflicts_with_subcommands = true)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub action: Option<ModelsAction>,

    /// Only list models whose id contains this text
    #[arg(short, long)]
    pub filter: Option<String>,
}

/// Model management actions.
#[derive(Subcommand, Debug)]
pub enum ModelsAction {
    /// Download a model onto the provider
    Pull {
        /// Model name, e.g. "llama3" or "mistral:7b"
        name: String,
    },
}

/// Model row for table display.
#[derive(Debug, Serialize, Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    id: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Modified")]
    modified: String,
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs, ctx: &Context) -> Result<()> {
    match args.action {
        Some(ModelsAction::Pull { name }) => pull(&name, ctx).await,
        None => list(args.filter.as_deref(), ctx).await,
    }
}

async fn pull(name: &str, ctx: &Context) -> Result<()> {
    let busy = Busy::start(ctx.format, &format!("Pulling {name}..."));
    let result = ctx.gateway.pull_model(name).await;
    drop(busy);

    let pulled = match result {
        Ok(pulled) => pulled,
        Err(e) => return output::report_failure(e, ctx.format),
    };

    if ctx.format.is_json() {
        return Envelope::ok(&pulled).print();
    }
    output::notice(Level::Ok, &format!("Pulled {} ({})", pulled.model, pulled.status));
    Ok(())
}

async fn list(filter: Option<&str>, ctx: &Context) -> Result<()> {
    let mut models = match ctx.gateway.list_models().await {
        Ok(models) => models,
        Err(e) => return output::report_failure(e, ctx.format),
    };
    if let Some(filter) = filter {
        models.retain(|m| m.id.contains(filter));
    }

    if ctx.format.is_json() {
        return Envelope::ok(&models).print();
    }

    output::heading(&format!("Models at {}", ctx.gateway.provider().id()));
    let rows: Vec<ModelRow> = models
        .into_iter()
        .map(|m| ModelRow {
            id: m.id,
            size: m.size_bytes.map(output::human_size).unwrap_or_else(|| "-".to_string()),
            modified: m.modified_at.unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    output::render_table(&rows);

    Ok(())
}
