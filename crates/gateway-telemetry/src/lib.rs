//! # Gateway Telemetry
//!
//! Observability for the AI provider gateway:
//! - Structured logging through `tracing-subscriber` (text or JSON)
//! - Per-call spans carrying a request id
//! - Prometheus request, latency and token metrics

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod metrics;
pub mod tracing_setup;

pub use error::TelemetryError;
pub use metrics::{GatewayMetrics, OUTCOME_CANCELLED, OUTCOME_SUCCESS};
pub use tracing_setup::{init_logging, new_request_id, LogFormat, LoggingConfig};
