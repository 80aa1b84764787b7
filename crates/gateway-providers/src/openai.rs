//! OpenAI provider implementation (the `cloud` backend).
//!
//! Works against the hosted API and any server speaking the same
//! `/v1` dialect. Streaming uses server-sent events terminated by `[DONE]`;
//! automatic reconnection is disabled because a resumed completion would not
//! continue where the dropped one stopped.

use crate::http;
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use gateway_core::{
    AiProvider, ChatChunk, ChatMessage, ChatRequest, ChatResponse, ChunkStream, EmbeddingRequest,
    EmbeddingVector, FinishReason, GatewayError, GatewayResult, HealthStatus, ModelInfo,
    ProviderCapabilities, ProviderKind, TranscriptionRequest, TranscriptionResult, Usage,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use reqwest_eventsource::{retry, Event, EventSource};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default speech-to-text model
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// OpenAI provider configuration
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Provider instance ID
    pub id: String,
    /// API key
    pub api_key: SecretString,
    /// API base URL
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Model sent with transcription uploads
    pub transcription_model: String,
    /// Sample rates accepted for transcription; `None` accepts any
    pub sample_rates: Option<Vec<u32>>,
}

impl OpenAIConfig {
    /// Create a new OpenAI configuration
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            id: "openai".to_string(),
            api_key: SecretString::new(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            sample_rates: None,
        }
    }

    /// Set the provider ID
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the transcription model
    #[must_use]
    pub fn with_transcription_model(mut self, model: impl Into<String>) -> Self {
        self.transcription_model = model.into();
        self
    }

    /// Restrict accepted transcription sample rates
    #[must_use]
    pub fn with_sample_rates(mut self, sample_rates: Option<Vec<u32>>) -> Self {
        self.sample_rates = sample_rates;
        self
    }
}

/// OpenAI provider
pub struct OpenAIProvider {
    config: OpenAIConfig,
    client: Client,
    capabilities: ProviderCapabilities,
}

impl std::fmt::Debug for OpenAIProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIProvider")
            .field("config", &self.config)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl OpenAIProvider {
    /// Create a new OpenAI provider
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created
    pub fn new(config: OpenAIConfig) -> GatewayResult<Self> {
        let client = http::build_client(&config.id, config.timeout)?;

        Ok(Self {
            capabilities: ProviderCapabilities {
                chat: true,
                streaming: true,
                embeddings: true,
                transcription: true,
                sample_rates: config.sample_rates.clone(),
                ..ProviderCapabilities::default()
            },
            config,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        http::endpoint(&self.config.base_url, path)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .bearer_auth(self.config.api_key.expose_secret())
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(self.url(path))
            .bearer_auth(self.config.api_key.expose_secret())
    }

    /// Send a request bounded by the whole-request timeout and decode the body
    async fn execute<T: serde::de::DeserializeOwned>(&self, builder: RequestBuilder) -> GatewayResult<T> {
        let (id, timeout) = (&self.config.id, self.config.timeout);
        let response = builder
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| http::map_request_error(id, timeout, &e))?;
        let response = http::check_status(id, timeout, response).await?;
        http::decode_json(id, timeout, response).await
    }

    fn transform_request(request: &ChatRequest, stream: bool) -> OpenAIChatRequest<'_> {
        OpenAIChatRequest {
            model: &request.model,
            messages: request.messages.iter().map(OpenAIMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }

    fn transform_response(&self, response: OpenAIChatResponse) -> GatewayResult<ChatResponse> {
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            GatewayError::provider(&self.config.id, None, "Response contained no choices")
        })?;

        let finish_reason = choice
            .finish_reason
            .as_deref()
            .map_or(FinishReason::Stop, FinishReason::from_provider);

        let mut result = ChatResponse::new(
            choice.message.content.unwrap_or_default(),
            response.model,
            finish_reason,
        );
        if let Some(usage) = response.usage {
            result = result.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
        }
        Ok(result)
    }
}

/// Map an event-source failure onto the gateway taxonomy
async fn map_event_error(
    provider: &str,
    timeout: Duration,
    err: reqwest_eventsource::Error,
) -> GatewayError {
    use reqwest_eventsource::Error;

    match err {
        Error::Transport(e) => http::map_request_error(provider, timeout, &e),
        Error::InvalidStatusCode(status, response) => {
            let body = tokio::time::timeout(timeout, response.text())
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default();
            GatewayError::provider(
                provider,
                Some(status.as_u16()),
                http::error_message(&body, status.as_u16()),
            )
        }
        Error::InvalidContentType(content_type, _) => GatewayError::provider(
            provider,
            None,
            format!("Unexpected stream content type: {content_type:?}"),
        ),
        other => GatewayError::provider(provider, None, format!("Stream error: {other}")),
    }
}

#[async_trait]
impl AiProvider for OpenAIProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Cloud
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn health_check(&self) -> HealthStatus {
        let response = self
            .get("/models")
            .timeout(http::HEALTH_CHECK_TIMEOUT.min(self.config.timeout))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => HealthStatus::Healthy,
            Ok(resp) if resp.status().as_u16() == 429 => HealthStatus::Degraded,
            Ok(resp) => {
                warn!(status = %resp.status(), "OpenAI health check failed");
                HealthStatus::Unhealthy
            }
            Err(e) => {
                error!(error = %e, "OpenAI health check error");
                HealthStatus::Unhealthy
            }
        }
    }

    async fn list_models(&self) -> GatewayResult<Vec<ModelInfo>> {
        let models: OpenAIModelsResponse = self.execute(self.get("/models")).await?;
        Ok(models.data.into_iter().map(|m| ModelInfo::new(m.id)).collect())
    }

    async fn chat_completion(&self, request: &ChatRequest) -> GatewayResult<ChatResponse> {
        debug!(model = %request.model, "Sending request to OpenAI");

        let response: OpenAIChatResponse = self
            .execute(self.post("/chat/completions").json(&Self::transform_request(request, false)))
            .await?;

        self.transform_response(response)
    }

    async fn chat_completion_stream(&self, request: &ChatRequest) -> GatewayResult<ChunkStream> {
        debug!(model = %request.model, "Starting streaming request to OpenAI");

        let builder = self
            .post("/chat/completions")
            .json(&Self::transform_request(request, true));

        let mut event_source = EventSource::new(builder).map_err(|e| {
            GatewayError::provider(&self.config.id, None, format!("Failed to create event source: {e}"))
        })?;
        event_source.set_retry_policy(Box::new(retry::Never));

        let provider = self.config.id.clone();
        let timeout = self.config.timeout;

        let stream = try_stream! {
            let mut es = event_source;

            loop {
                let next = tokio::time::timeout(timeout, es.next())
                    .await
                    .map_err(|_| GatewayError::timeout(&provider, timeout))?;

                let Some(event) = next else {
                    break;
                };

                match event {
                    Ok(Event::Open) => {
                        trace!("OpenAI stream opened");
                    }
                    Ok(Event::Message(msg)) => {
                        let data = msg.data.trim();

                        if data == "[DONE]" {
                            // Some compatible servers omit finish_reason entirely.
                            yield ChatChunk::finished("", FinishReason::Stop);
                            break;
                        }

                        let chunk: OpenAIStreamChunk = serde_json::from_str(data).map_err(|e| {
                            GatewayError::provider(&provider, None, format!("Invalid stream event: {e}"))
                        })?;

                        if let Some(err) = chunk.error {
                            Err::<(), _>(GatewayError::provider(&provider, None, err.message))?;
                        }

                        let Some(choice) = chunk.choices.into_iter().next() else {
                            continue;
                        };
                        let content = choice.delta.content.unwrap_or_default();

                        if let Some(reason) = choice.finish_reason {
                            let mut last = ChatChunk::finished(content, FinishReason::from_provider(&reason));
                            if let Some(usage) = chunk.usage {
                                last = last.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
                            }
                            yield last;
                            break;
                        }

                        if !content.is_empty() {
                            yield ChatChunk::delta(content);
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(e) => {
                        es.close();
                        let mapped = map_event_error(&provider, timeout, e).await;
                        error!(error = %mapped, "OpenAI stream error");
                        Err::<(), _>(mapped)?;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn embeddings(&self, request: &EmbeddingRequest) -> GatewayResult<EmbeddingVector> {
        let mut vectors = self
            .embeddings_batch(std::slice::from_ref(&request.text), &request.model)
            .await?;
        vectors.pop().ok_or_else(|| {
            GatewayError::provider(&self.config.id, None, "Embedding response was empty")
        })
    }

    async fn embeddings_batch(
        &self,
        texts: &[String],
        model: &str,
    ) -> GatewayResult<Vec<EmbeddingVector>> {
        debug!(model = %model, inputs = texts.len(), "Requesting embeddings from OpenAI");

        let response: OpenAIEmbeddingResponse = self
            .execute(self.post("/embeddings").json(&OpenAIEmbeddingRequest {
                model,
                input: texts,
            }))
            .await?;

        if response.data.len() != texts.len() {
            return Err(GatewayError::provider(
                &self.config.id,
                None,
                format!(
                    "Expected {} embeddings, received {}",
                    texts.len(),
                    response.data.len()
                ),
            ));
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> GatewayResult<TranscriptionResult> {
        debug!(
            model = %self.config.transcription_model,
            audio_bytes = request.audio.len(),
            "Uploading audio to OpenAI"
        );

        let file = Part::bytes(request.audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| {
                GatewayError::provider(&self.config.id, None, format!("Invalid upload part: {e}"))
            })?;

        let mut form = Form::new()
            .part("file", file)
            .text("model", self.config.transcription_model.clone());
        if let Some(language) = &request.language {
            form = form.text("language", language.clone());
        }

        let response: OpenAITranscriptionResponse = self
            .execute(self.post("/audio/transcriptions").multipart(form))
            .await?;

        Ok(TranscriptionResult {
            text: response.text,
        })
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a ChatMessage> for OpenAIMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        Self {
            role: msg.role.as_str(),
            content: &msg.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    usage: Option<OpenAIUsage>,
    error: Option<OpenAIErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

#[derive(Debug, Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbedding {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAITranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIModelsResponse {
    #[serde(default)]
    data: Vec<OpenAIModel>,
}

#[derive(Debug, Deserialize)]
struct OpenAIModel {
    id: String,
}
