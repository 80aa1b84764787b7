//! Error taxonomy for the gateway.
//!
//! Every failure a caller can observe is one of these variants. The gateway
//! performs no local recovery, so the variant is the whole contract: callers
//! map [`GatewayError::kind`] onto their own retry or messaging policy.

use crate::provider::Capability;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the gateway crates.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors surfaced by the gateway and its providers.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The backend could not be reached, or the connection dropped before a
    /// complete response arrived.
    #[error("Provider '{provider}' unavailable: {message}")]
    ProviderUnavailable {
        /// Provider identifier
        provider: String,
        /// Underlying transport failure
        message: String,
    },

    /// The backend responded but signaled failure.
    #[error("Provider '{provider}' error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Provider {
        /// Provider identifier
        provider: String,
        /// Backend status code, when the failure came with one
        status: Option<u16>,
        /// Backend message
        message: String,
    },

    /// No response arrived within the provider's configured window.
    #[error("Provider '{provider}' timed out after {}s", timeout.as_secs())]
    Timeout {
        /// Provider identifier
        provider: String,
        /// The configured timeout that elapsed
        timeout: Duration,
    },

    /// The selected provider does not implement the requested operation.
    #[error("Provider '{provider}' does not support {capability}")]
    CapabilityNotSupported {
        /// Provider identifier
        provider: String,
        /// The missing capability
        capability: Capability,
    },

    /// Audio payload rejected before dispatch.
    #[error("Unsupported audio format: {message}")]
    UnsupportedFormat {
        /// What was wrong with the payload
        message: String,
    },

    /// Malformed request caught before dispatch.
    #[error("Validation error: {message}")]
    Validation {
        /// Error message
        message: String,
        /// Offending field
        field: Option<String>,
    },

    /// Invalid startup configuration.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Create a provider-unavailable error
    pub fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a provider error
    pub fn provider(
        provider: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(provider: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            provider: provider.into(),
            timeout,
        }
    }

    /// Create a capability-not-supported error
    pub fn unsupported_capability(provider: impl Into<String>, capability: Capability) -> Self {
        Self::CapabilityNotSupported {
            provider: provider.into(),
            capability,
        }
    }

    /// Create an unsupported-format error
    pub fn unsupported_format(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Validation {
            message: message.into(),
            field: field.map(str::to_string),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Stable taxonomy tag, suitable for metrics labels and caller-side matching.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::Provider { .. } => "provider_error",
            Self::Timeout { .. } => "timeout",
            Self::CapabilityNotSupported { .. } => "capability_not_supported",
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::Validation { .. } => "validation",
            Self::Configuration { .. } => "configuration",
        }
    }

    /// Backend status code, if the error carries one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether the failure is plausibly transient.
    ///
    /// The gateway never retries; this is a hint for callers that do.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ProviderUnavailable { .. } | Self::Timeout { .. } => true,
            Self::Provider { status, .. } => matches!(status, Some(429 | 500..=599)),
            _ => false,
        }
    }
}
