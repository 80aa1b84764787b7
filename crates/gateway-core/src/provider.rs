//! Provider trait and capability declarations.
//!
//! A provider implements some subset of the gateway's operations and says
//! which subset up front through [`ProviderCapabilities`]. The gateway checks
//! that declaration before dispatching, so an unsupported call never reaches
//! the network.

use crate::error::{GatewayError, GatewayResult};
use crate::request::{ChatRequest, CompletionRequest, EmbeddingRequest, TranscriptionRequest};
use crate::response::{ChatResponse, EmbeddingVector, ModelInfo, PullResult, TranscriptionResult};
use crate::streaming::ChunkStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One operation a provider may or may not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Non-streaming chat completion
    Chat,
    /// Streaming chat completion
    ChatStreaming,
    /// Text embeddings
    Embeddings,
    /// Speech-to-text
    Transcription,
    /// Non-streaming raw prompt completion
    Completion,
    /// Streaming raw prompt completion
    CompletionStreaming,
    /// Downloading models onto the backend
    ModelPull,
}

impl Capability {
    /// Every capability, in a stable order
    pub const ALL: [Self; 7] = [
        Self::Chat,
        Self::ChatStreaming,
        Self::Embeddings,
        Self::Transcription,
        Self::Completion,
        Self::CompletionStreaming,
        Self::ModelPull,
    ];

    /// Label used in logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::ChatStreaming => "chat_streaming",
            Self::Embeddings => "embeddings",
            Self::Transcription => "transcription",
            Self::Completion => "completion",
            Self::CompletionStreaming => "completion_streaming",
            Self::ModelPull => "model_pull",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The capability set a provider declares.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderCapabilities {
    /// Supports non-streaming chat
    pub chat: bool,
    /// Supports streaming chat
    pub streaming: bool,
    /// Supports embeddings
    pub embeddings: bool,
    /// Supports transcription
    pub transcription: bool,
    /// Supports raw prompt completion, streaming and not
    pub completion: bool,
    /// Can download models on request
    pub model_pull: bool,
    /// Sample rates accepted for transcription; `None` accepts any rate
    pub sample_rates: Option<Vec<u32>>,
}

impl ProviderCapabilities {
    /// Chat (streaming and non-streaming) only
    pub fn chat_only() -> Self {
        Self {
            chat: true,
            streaming: true,
            ..Self::default()
        }
    }

    /// Whether the capability is declared
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Chat => self.chat,
            Capability::ChatStreaming => self.streaming,
            Capability::Embeddings => self.embeddings,
            Capability::Transcription => self.transcription,
            Capability::Completion | Capability::CompletionStreaming => self.completion,
            Capability::ModelPull => self.model_pull,
        }
    }

    /// Whether a transcription at `rate` Hz would be accepted
    pub fn accepts_sample_rate(&self, rate: u32) -> bool {
        self.sample_rates
            .as_ref()
            .map_or(true, |rates| rates.contains(&rate))
    }

    /// All declared capabilities, in a stable order
    pub fn declared(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.supports(*c))
            .collect()
    }
}

/// Which family of backend is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local inference server and worker processes
    #[default]
    Local,
    /// Hosted OpenAI-compatible API
    Cloud,
}

impl ProviderKind {
    /// Configuration name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            other => Err(GatewayError::configuration(format!(
                "unknown provider '{other}', expected 'local' or 'cloud'"
            ))),
        }
    }
}

/// Result of a provider health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Reachable and answering
    Healthy,
    /// Reachable but throttling or partially failing
    Degraded,
    /// Unreachable or failing
    Unhealthy,
}

impl HealthStatus {
    /// Whether requests are expected to succeed
    pub fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// A concrete backend.
///
/// Every operation has a default that fails with `CapabilityNotSupported`, so
/// a provider implements exactly the operations it declares.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Provider identifier used in errors and logs
    fn id(&self) -> &str;

    /// Backend family
    fn kind(&self) -> ProviderKind;

    /// Declared capability set
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Base URL of the backend
    fn base_url(&self) -> &str;

    /// Probe the backend. Never fails; problems map to `Unhealthy`.
    async fn health_check(&self) -> HealthStatus;

    /// Models the backend reports as available
    async fn list_models(&self) -> GatewayResult<Vec<ModelInfo>> {
        Ok(Vec::new())
    }

    /// Non-streaming chat completion
    async fn chat_completion(&self, _request: &ChatRequest) -> GatewayResult<ChatResponse> {
        Err(GatewayError::unsupported_capability(self.id(), Capability::Chat))
    }

    /// Streaming chat completion
    async fn chat_completion_stream(&self, _request: &ChatRequest) -> GatewayResult<ChunkStream> {
        Err(GatewayError::unsupported_capability(
            self.id(),
            Capability::ChatStreaming,
        ))
    }

    /// Embed a single text
    async fn embeddings(&self, _request: &EmbeddingRequest) -> GatewayResult<EmbeddingVector> {
        Err(GatewayError::unsupported_capability(
            self.id(),
            Capability::Embeddings,
        ))
    }

    /// Embed several texts, one vector per input in input order.
    ///
    /// The default issues one call per text.
    async fn embeddings_batch(
        &self,
        texts: &[String],
        model: &str,
    ) -> GatewayResult<Vec<EmbeddingVector>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let request = EmbeddingRequest::new(text.clone()).with_model(model);
            vectors.push(self.embeddings(&request).await?);
        }
        Ok(vectors)
    }

    /// Speech-to-text
    async fn transcribe(
        &self,
        _request: &TranscriptionRequest,
    ) -> GatewayResult<TranscriptionResult> {
        Err(GatewayError::unsupported_capability(
            self.id(),
            Capability::Transcription,
        ))
    }

    /// Non-streaming raw prompt completion
    async fn completion(&self, _request: &CompletionRequest) -> GatewayResult<ChatResponse> {
        Err(GatewayError::unsupported_capability(
            self.id(),
            Capability::Completion,
        ))
    }

    /// Streaming raw prompt completion
    async fn completion_stream(&self, _request: &CompletionRequest) -> GatewayResult<ChunkStream> {
        Err(GatewayError::unsupported_capability(
            self.id(),
            Capability::CompletionStreaming,
        ))
    }

    /// Download `model` onto the backend, returning once it is available
    async fn pull_model(&self, _model: &str) -> GatewayResult<PullResult> {
        Err(GatewayError::unsupported_capability(
            self.id(),
            Capability::ModelPull,
        ))
    }
}
