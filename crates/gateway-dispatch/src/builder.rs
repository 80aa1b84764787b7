//! Provider construction from configuration.

use crate::gateway::{Gateway, ModelDefaults};
use gateway_config::ProviderConfig;
use gateway_core::{AiProvider, GatewayError, GatewayResult, ProviderKind};
use gateway_providers::{OllamaConfig, OllamaProvider, OpenAIConfig, OpenAIProvider, WhisperWorker};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::info;

/// Build the one provider selected by `config`
///
/// # Errors
/// Returns a configuration error if the provider cannot be constructed
pub fn build_provider(config: &ProviderConfig) -> GatewayResult<Arc<dyn AiProvider>> {
    let provider: Arc<dyn AiProvider> = match config.provider {
        ProviderKind::Local => {
            let mut provider = OllamaProvider::new(
                OllamaConfig::new(&config.base_url)
                    .with_timeout(config.request_timeout)
                    .with_sample_rates(config.sample_rates.clone()),
            )?;
            if let Some(worker) = &config.transcription_worker {
                provider = provider.with_worker(
                    WhisperWorker::new(&worker.command, worker.args.clone())
                        .with_timeout(config.request_timeout),
                );
            }
            Arc::new(provider)
        }
        ProviderKind::Cloud => {
            let api_key = config.api_key.as_ref().ok_or_else(|| {
                GatewayError::configuration("The cloud provider requires an API key")
            })?;
            Arc::new(OpenAIProvider::new(
                OpenAIConfig::new(api_key.expose_secret().as_str())
                    .with_base_url(&config.base_url)
                    .with_timeout(config.request_timeout)
                    .with_transcription_model(&config.transcription_model)
                    .with_sample_rates(config.sample_rates.clone()),
            )?)
        }
    };

    info!(
        provider = %provider.id(),
        kind = %provider.kind(),
        base_url = %provider.base_url(),
        capabilities = ?provider.capabilities().declared(),
        "Provider selected"
    );

    Ok(provider)
}

impl From<&ProviderConfig> for ModelDefaults {
    fn from(config: &ProviderConfig) -> Self {
        Self::new(&config.default_chat_model, &config.default_embedding_model)
    }
}

impl Gateway {
    /// Build a gateway for the provider selected by `config`
    ///
    /// # Errors
    /// Returns a configuration error if the provider cannot be constructed
    pub fn from_config(config: &ProviderConfig) -> GatewayResult<Self> {
        Ok(Self::new(build_provider(config)?, ModelDefaults::from(config)))
    }
}
