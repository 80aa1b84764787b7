//! Structured logging setup.
//!
//! One subscriber per process, writing to stderr so that command output on
//! stdout stays machine-readable. `RUST_LOG` takes precedence over the
//! configured level when set.

use crate::error::TelemetryError;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Include the event target (module path)
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
            with_target: false,
        }
    }
}

impl LoggingConfig {
    /// Configuration at a fixed level
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// Map a `-v` count to a level: 0 warn, 1 info, 2 debug, 3+ trace
    #[must_use]
    pub fn from_verbosity(verbose: u8) -> Self {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        Self {
            level: level.to_string(),
            format: LogFormat::Text,
            with_target: verbose > 1,
        }
    }

    /// Set the output format
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Emit JSON lines
    #[must_use]
    pub fn json(self) -> Self {
        self.with_format(LogFormat::Json)
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

/// Install the global subscriber.
///
/// # Errors
/// Returns error if a global subscriber is already installed
pub fn init_logging(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(config.with_target)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.with_target)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(config.filter()))
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    debug!(level = %config.level, format = ?config.format, "Logging initialized");
    Ok(())
}

/// Fresh identifier for correlating the log lines of one gateway call
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Create a span for one gateway call
#[macro_export]
macro_rules! provider_span {
    ($request_id:expr, $provider:expr, $capability:expr) => {
        tracing::info_span!(
            "provider_call",
            request_id = %$request_id,
            provider = %$provider,
            capability = %$capability,
        )
    };
    ($request_id:expr, $provider:expr, $capability:expr, $model:expr) => {
        tracing::info_span!(
            "provider_call",
            request_id = %$request_id,
            provider = %$provider,
            capability = %$capability,
            model = %$model,
        )
    };
}
