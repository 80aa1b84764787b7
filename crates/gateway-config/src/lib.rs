//! # Gateway Config
//!
//! Process-wide provider configuration for the AI gateway.
//!
//! Configuration is read once at startup from an optional YAML or TOML file
//! and the environment (environment wins), validated, and then treated as
//! immutable for the lifetime of the process.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod provider_config;

pub use error::ConfigError;
pub use loader::{keys, ConfigLoader, RawConfig};
pub use provider_config::{ConfigSummary, ProviderConfig, WorkerConfig};
