//! Configuration loading.
//!
//! Two layers are merged, lowest precedence first:
//!
//! 1. An optional YAML or TOML file whose keys are the environment variable
//!    names in lowercase.
//! 2. The process environment.
//!
//! The merged values are then resolved against per-provider defaults and
//! validated. Nothing is re-read after startup.

use crate::error::ConfigError;
use crate::provider_config::{ProviderConfig, WorkerConfig};
use gateway_core::ProviderKind;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Environment variable names.
pub mod keys {
    /// "local" or "cloud"
    pub const PROVIDER: &str = "PROVIDER";
    /// Backend base URL
    pub const PROVIDER_BASE_URL: &str = "PROVIDER_BASE_URL";
    /// Default chat model
    pub const DEFAULT_CHAT_MODEL: &str = "DEFAULT_CHAT_MODEL";
    /// Default embedding model
    pub const DEFAULT_EMBEDDING_MODEL: &str = "DEFAULT_EMBEDDING_MODEL";
    /// Request timeout in whole seconds
    pub const REQUEST_TIMEOUT_SECONDS: &str = "REQUEST_TIMEOUT_SECONDS";
    /// Cloud API key
    pub const PROVIDER_API_KEY: &str = "PROVIDER_API_KEY";
    /// Fallback cloud API key
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    /// Cloud transcription model
    pub const TRANSCRIPTION_MODEL: &str = "TRANSCRIPTION_MODEL";
    /// Local transcription worker executable
    pub const TRANSCRIBE_WORKER_COMMAND: &str = "TRANSCRIBE_WORKER_COMMAND";
    /// Whitespace-separated worker arguments
    pub const TRANSCRIBE_WORKER_ARGS: &str = "TRANSCRIBE_WORKER_ARGS";
    /// Comma-separated accepted sample rates, or "any"
    pub const TRANSCRIBE_SAMPLE_RATES: &str = "TRANSCRIBE_SAMPLE_RATES";
}

/// Unresolved configuration values from a single layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Provider name
    pub provider: Option<String>,
    /// Base URL
    pub provider_base_url: Option<String>,
    /// Default chat model
    pub default_chat_model: Option<String>,
    /// Default embedding model
    pub default_embedding_model: Option<String>,
    /// Timeout in seconds
    pub request_timeout_seconds: Option<u64>,
    /// Cloud API key
    pub provider_api_key: Option<String>,
    /// Cloud transcription model
    pub transcription_model: Option<String>,
    /// Worker executable
    pub transcribe_worker_command: Option<String>,
    /// Worker arguments
    pub transcribe_worker_args: Option<Vec<String>>,
    /// Accepted sample rates; an empty list accepts any rate
    pub transcribe_sample_rates: Option<Vec<u32>>,
}

impl RawConfig {
    /// Parse a YAML or TOML file, chosen by extension
    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let parsed = match extension.as_deref() {
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&contents).map_err(|e| e.to_string())
            }
            Some("toml") => toml::from_str(&contents).map_err(|e| e.to_string()),
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Read values through a key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let request_timeout_seconds = get(keys::REQUEST_TIMEOUT_SECONDS)
            .map(|v| {
                v.parse::<u64>().map_err(|_| {
                    ConfigError::invalid(
                        keys::REQUEST_TIMEOUT_SECONDS,
                        format!("'{v}' is not a positive integer"),
                    )
                })
            })
            .transpose()?;

        let transcribe_sample_rates = get(keys::TRANSCRIBE_SAMPLE_RATES)
            .map(|v| parse_sample_rates(&v))
            .transpose()?;

        Ok(Self {
            provider: get(keys::PROVIDER),
            provider_base_url: get(keys::PROVIDER_BASE_URL),
            default_chat_model: get(keys::DEFAULT_CHAT_MODEL),
            default_embedding_model: get(keys::DEFAULT_EMBEDDING_MODEL),
            request_timeout_seconds,
            provider_api_key: get(keys::PROVIDER_API_KEY).or_else(|| get(keys::OPENAI_API_KEY)),
            transcription_model: get(keys::TRANSCRIPTION_MODEL),
            transcribe_worker_command: get(keys::TRANSCRIBE_WORKER_COMMAND),
            transcribe_worker_args: get(keys::TRANSCRIBE_WORKER_ARGS)
                .map(|v| v.split_whitespace().map(str::to_string).collect()),
            transcribe_sample_rates,
        })
    }

    /// Overlay `other` on top of `self`; values set in `other` win.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            provider: other.provider.or(self.provider),
            provider_base_url: other.provider_base_url.or(self.provider_base_url),
            default_chat_model: other.default_chat_model.or(self.default_chat_model),
            default_embedding_model: other
                .default_embedding_model
                .or(self.default_embedding_model),
            request_timeout_seconds: other
                .request_timeout_seconds
                .or(self.request_timeout_seconds),
            provider_api_key: other.provider_api_key.or(self.provider_api_key),
            transcription_model: other.transcription_model.or(self.transcription_model),
            transcribe_worker_command: other
                .transcribe_worker_command
                .or(self.transcribe_worker_command),
            transcribe_worker_args: other.transcribe_worker_args.or(self.transcribe_worker_args),
            transcribe_sample_rates: other
                .transcribe_sample_rates
                .or(self.transcribe_sample_rates),
        }
    }

    /// Apply provider defaults and validate.
    pub fn resolve(self) -> Result<ProviderConfig, ConfigError> {
        let provider = match self.provider.as_deref() {
            Some(name) => name.parse::<ProviderKind>().map_err(|_| {
                ConfigError::invalid(
                    keys::PROVIDER,
                    format!("unknown provider '{name}', expected 'local' or 'cloud'"),
                )
            })?,
            None => ProviderKind::default(),
        };

        let mut config = ProviderConfig::defaults_for(provider);

        if let Some(base_url) = self.provider_base_url {
            config.base_url = base_url;
        }
        config.base_url = validate_base_url(&config.base_url)?;

        if let Some(model) = self.default_chat_model {
            config.default_chat_model = model;
        }
        if let Some(model) = self.default_embedding_model {
            config.default_embedding_model = model;
        }
        if let Some(model) = self.transcription_model {
            config.transcription_model = model;
        }

        match self.request_timeout_seconds {
            Some(0) => {
                return Err(ConfigError::invalid(
                    keys::REQUEST_TIMEOUT_SECONDS,
                    "must be a positive integer",
                ))
            }
            Some(secs) => config.request_timeout = Duration::from_secs(secs),
            None => {}
        }

        config.api_key = self.provider_api_key.map(SecretString::new);

        if let Some(command) = self.transcribe_worker_command {
            config.transcription_worker = Some(WorkerConfig {
                command,
                args: self.transcribe_worker_args.unwrap_or_default(),
            });
        }

        if let Some(rates) = self.transcribe_sample_rates {
            if rates.contains(&0) {
                return Err(ConfigError::invalid(
                    keys::TRANSCRIBE_SAMPLE_RATES,
                    "sample rates must be positive",
                ));
            }
            config.sample_rates = if rates.is_empty() { None } else { Some(rates) };
        }

        if provider == ProviderKind::Cloud && config.api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }

        Ok(config)
    }
}

fn parse_sample_rates(value: &str) -> Result<Vec<u32>, ConfigError> {
    if value.eq_ignore_ascii_case("any") {
        return Ok(Vec::new());
    }

    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>().map_err(|_| {
                ConfigError::invalid(
                    keys::TRANSCRIBE_SAMPLE_RATES,
                    format!("'{s}' is not a sample rate"),
                )
            })
        })
        .collect()
}

fn validate_base_url(raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::invalid(keys::PROVIDER_BASE_URL, format!("'{raw}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            keys::PROVIDER_BASE_URL,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    Ok(raw.trim_end_matches('/').to_string())
}

/// Builds a [`ProviderConfig`] from a file and/or the environment.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    use_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Environment only
    pub fn new() -> Self {
        Self {
            file: None,
            use_env: true,
        }
    }

    /// Read a config file beneath the environment layer
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Ignore the environment (file and defaults only)
    #[must_use]
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Load from the process environment
    pub async fn load(&self) -> Result<ProviderConfig, ConfigError> {
        self.load_with(|key| std::env::var(key).ok()).await
    }

    /// Load using `lookup` in place of the process environment
    pub async fn load_with<F>(&self, lookup: F) -> Result<ProviderConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut raw = match &self.file {
            Some(path) => {
                debug!(path = %path.display(), "Reading configuration file");
                RawConfig::from_file(path).await?
            }
            None => RawConfig::default(),
        };

        if self.use_env {
            raw = raw.merge(RawConfig::from_lookup(lookup)?);
        }

        let config = raw.resolve()?;

        info!(
            provider = %config.provider,
            base_url = %config.base_url,
            chat_model = %config.default_chat_model,
            embedding_model = %config.default_embedding_model,
            timeout_secs = config.request_timeout.as_secs(),
            transcription_worker = config.transcription_worker.is_some(),
            "Provider configuration loaded"
        );

        Ok(config)
    }
}
