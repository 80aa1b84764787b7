//! Telemetry errors.

use thiserror::Error;

/// Errors raised while setting up logging or metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The global subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    Init(String),

    /// A metric could not be created or registered
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Rendered metrics were not valid text
    #[error("Failed to encode metrics: {0}")]
    Encode(String),
}
