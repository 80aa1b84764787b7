//! Health check command.

use anyhow::Result;
use clap::Args;
use gateway_core::{Capability, HealthStatus, ProviderKind};
use serde::Serialize;
use std::time::Instant;

use crate::cli::Context;
use crate::output::{self, Busy, Envelope, Level};

/// Arguments for the health command.
#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Exit with an error when the provider is not healthy
    #[arg(long)]
    pub strict: bool,
}

/// Health check response for output.
#[derive(Debug, Serialize)]
pub struct HealthOutput {
    pub provider: String,
    pub kind: ProviderKind,
    pub base_url: String,
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub capabilities: Vec<Capability>,
}

/// Execute the health command.
pub async fn execute(args: HealthArgs, ctx: &Context) -> Result<()> {
    let provider = ctx.gateway.provider();

    let busy = Busy::start(ctx.format, &format!("Checking {}...", provider.base_url()));
    let start = Instant::now();
    let status = ctx.gateway.health().await;
    let elapsed = start.elapsed();
    drop(busy);

    let result = HealthOutput {
        provider: provider.id().to_string(),
        kind: provider.kind(),
        base_url: provider.base_url().to_string(),
        status,
        response_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        capabilities: ctx.gateway.capabilities().declared(),
    };

    if ctx.format.is_json() {
        Envelope::ok(&result).print()?;
    } else {
        match status {
            HealthStatus::Healthy => output::notice(Level::Ok, "Provider is healthy"),
            HealthStatus::Degraded => output::notice(Level::Warn, "Provider is degraded"),
            HealthStatus::Unhealthy => output::notice(Level::Fail, "Provider is unreachable"),
        }
        output::field("Provider", format!("{} ({})", result.provider, result.kind));
        output::field("Base URL", &result.base_url);
        output::field("Response Time", format!("{}ms", result.response_time_ms));

        output::heading("Capabilities");
        let declared = &result.capabilities;
        for capability in Capability::ALL {
            output::capability_line(capability.as_str(), declared.contains(&capability));
        }
    }

    if args.strict && !status.is_healthy() {
        anyhow::bail!("Provider '{}' is {:?}", result.provider, status);
    }

    Ok(())
}
