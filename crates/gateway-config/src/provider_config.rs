//! Resolved provider configuration.

use gateway_core::{ProviderKind, DEFAULT_SAMPLE_RATE};
use secrecy::SecretString;
use serde::Serialize;
use std::time::Duration;

/// Local inference server default endpoint
pub const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:11434";
/// Hosted API default endpoint
pub const DEFAULT_CLOUD_BASE_URL: &str = "https://api.openai.com/v1";

/// Subprocess used for local transcription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerConfig {
    /// Executable to run
    pub command: String,
    /// Fixed arguments, before the per-request ones the gateway appends
    pub args: Vec<String>,
}

/// Validated, immutable provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Active provider
    pub provider: ProviderKind,
    /// Backend base URL
    pub base_url: String,
    /// Model used when a chat request names none
    pub default_chat_model: String,
    /// Model used when an embedding request names none
    pub default_embedding_model: String,
    /// Applies to every call against the provider
    pub request_timeout: Duration,
    /// Bearer token for the cloud provider
    pub api_key: Option<SecretString>,
    /// Model name sent with cloud transcription uploads
    pub transcription_model: String,
    /// Local transcription worker; `None` disables local transcription
    pub transcription_worker: Option<WorkerConfig>,
    /// Accepted transcription sample rates; `None` accepts any
    pub sample_rates: Option<Vec<u32>>,
}

impl ProviderConfig {
    /// Defaults for a provider kind, before any file or environment overrides
    pub fn defaults_for(provider: ProviderKind) -> Self {
        match provider {
            ProviderKind::Local => Self {
                provider,
                base_url: DEFAULT_LOCAL_BASE_URL.to_string(),
                default_chat_model: "llama3".to_string(),
                default_embedding_model: "nomic-embed-text".to_string(),
                request_timeout: Duration::from_secs(300),
                api_key: None,
                transcription_model: "whisper".to_string(),
                transcription_worker: None,
                sample_rates: Some(vec![DEFAULT_SAMPLE_RATE]),
            },
            ProviderKind::Cloud => Self {
                provider,
                base_url: DEFAULT_CLOUD_BASE_URL.to_string(),
                default_chat_model: "gpt-4".to_string(),
                default_embedding_model: "text-embedding-ada-002".to_string(),
                request_timeout: Duration::from_secs(120),
                api_key: None,
                transcription_model: "whisper-1".to_string(),
                transcription_worker: None,
                sample_rates: None,
            },
        }
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key.into()));
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Configure a local transcription worker
    #[must_use]
    pub fn with_worker(mut self, command: impl Into<String>, args: Vec<String>) -> Self {
        self.transcription_worker = Some(WorkerConfig {
            command: command.into(),
            args,
        });
        self
    }

    /// Restrict accepted sample rates
    #[must_use]
    pub fn with_sample_rates(mut self, rates: Option<Vec<u32>>) -> Self {
        self.sample_rates = rates;
        self
    }

    /// A view of the configuration safe to print
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            provider: self.provider,
            base_url: self.base_url.clone(),
            default_chat_model: self.default_chat_model.clone(),
            default_embedding_model: self.default_embedding_model.clone(),
            request_timeout_seconds: self.request_timeout.as_secs(),
            api_key: self.api_key.as_ref().map(|_| "********"),
            transcription_model: self.transcription_model.clone(),
            transcription_worker: self.transcription_worker.clone(),
            sample_rates: self.sample_rates.clone(),
        }
    }
}

/// Printable configuration with secrets redacted.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    /// Active provider
    pub provider: ProviderKind,
    /// Backend base URL
    pub base_url: String,
    /// Default chat model
    pub default_chat_model: String,
    /// Default embedding model
    pub default_embedding_model: String,
    /// Request timeout
    pub request_timeout_seconds: u64,
    /// Redacted API key marker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<&'static str>,
    /// Cloud transcription model
    pub transcription_model: String,
    /// Local transcription worker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_worker: Option<WorkerConfig>,
    /// Accepted sample rates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rates: Option<Vec<u32>>,
}
