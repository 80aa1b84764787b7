//! Config command - show the resolved configuration.

use anyhow::Result;
use clap::Args;
use gateway_config::ProviderConfig;

use crate::output::{self, Envelope, OutputFormat};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {}

/// Execute the config command.
pub fn execute(_args: ConfigArgs, config: &ProviderConfig, format: OutputFormat) -> Result<()> {
    let summary = config.summary();

    if format.is_json() {
        return Envelope::ok(&summary).print();
    }

    output::heading("Provider");
    output::field("Provider", summary.provider.as_str());
    output::field("Base URL", &summary.base_url);
    output::field("Request Timeout", format!("{}s", summary.request_timeout_seconds));
    output::field("API Key", summary.api_key.unwrap_or("(not set)"));

    output::heading("Models");
    output::field("Chat", &summary.default_chat_model);
    output::field("Embedding", &summary.default_embedding_model);
    output::field("Transcription", &summary.transcription_model);

    output::heading("Transcription");
    match &summary.transcription_worker {
        Some(worker) if worker.args.is_empty() => output::field("Worker", &worker.command),
        Some(worker) => output::field(
            "Worker",
            format!("{} {}", worker.command, worker.args.join(" ")),
        ),
        None => output::field("Worker", "(none)"),
    }
    let rates = summary.sample_rates.as_ref().map_or_else(
        || "any".to_string(),
        |rates| {
            rates
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        },
    );
    output::field("Sample Rates", &rates);

    Ok(())
}
