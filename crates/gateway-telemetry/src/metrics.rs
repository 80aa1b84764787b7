//! Prometheus metrics for gateway calls.
//!
//! Metrics live in a registry owned by [`GatewayMetrics`] rather than the
//! process-global default, so independent gateways (and tests) never collide.

use crate::error::TelemetryError;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Outcome label for successful calls; failures use the error kind
pub const OUTCOME_SUCCESS: &str = "success";

/// Outcome label for streams the caller abandoned before their terminal item
pub const OUTCOME_CANCELLED: &str = "cancelled";

const LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0];

/// Request counters, latency histogram and token counters.
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration: HistogramVec,
    tokens_total: IntCounterVec,
}

impl std::fmt::Debug for GatewayMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayMetrics").finish_non_exhaustive()
    }
}

impl GatewayMetrics {
    /// Create and register all metrics
    ///
    /// # Errors
    /// Returns error if a metric definition is rejected by the registry
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("gateway_requests_total", "Gateway calls by capability, provider and outcome"),
            &["capability", "provider", "outcome"],
        )?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new("gateway_request_duration_seconds", "Gateway call latency")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["capability", "provider"],
        )?;

        let tokens_total = IntCounterVec::new(
            Opts::new("gateway_tokens_total", "Tokens reported by providers"),
            &["provider", "type"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(tokens_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            tokens_total,
        })
    }

    /// Record one finished call
    pub fn record_request(&self, capability: &str, provider: &str, outcome: &str, elapsed: Duration) {
        self.requests_total
            .with_label_values(&[capability, provider, outcome])
            .inc();
        self.request_duration
            .with_label_values(&[capability, provider])
            .observe(elapsed.as_secs_f64());
    }

    /// Record token usage reported by a provider
    pub fn record_tokens(&self, provider: &str, prompt: u32, completion: u32) {
        self.tokens_total
            .with_label_values(&[provider, "prompt"])
            .inc_by(u64::from(prompt));
        self.tokens_total
            .with_label_values(&[provider, "completion"])
            .inc_by(u64::from(completion));
    }

    /// Current value of the request counter for a label set
    pub fn request_count(&self, capability: &str, provider: &str, outcome: &str) -> u64 {
        self.requests_total
            .with_label_values(&[capability, provider, outcome])
            .get()
    }

    /// Current value of a token counter
    pub fn token_count(&self, provider: &str, kind: &str) -> u64 {
        self.tokens_total.with_label_values(&[provider, kind]).get()
    }

    /// Render all metrics in the Prometheus text exposition format
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn render(&self) -> Result<String, TelemetryError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Encode(e.to_string()))
    }
}
