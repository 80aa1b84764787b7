//! Configuration errors.

use gateway_core::GatewayError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The config file could not be parsed
    #[error("Failed to parse config file {path:?}: {message}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// The config file extension is not recognised
    #[error("Unsupported config file format {path:?}, expected .yaml, .yml or .toml")]
    UnsupportedFormat {
        /// File path
        path: PathBuf,
    },

    /// A value is present but invalid
    #[error("Invalid value for {key}: {message}")]
    Invalid {
        /// Configuration key
        key: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// The cloud provider was selected without an API key
    #[error("The cloud provider requires an API key (set PROVIDER_API_KEY or OPENAI_API_KEY)")]
    MissingApiKey,
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            message: message.into(),
        }
    }
}

impl From<ConfigError> for GatewayError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}
