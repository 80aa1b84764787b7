//! Ollama provider implementation (the `local` backend).
//!
//! Endpoints used:
//! - `POST /api/chat` for chat, streamed as newline-delimited JSON
//! - `POST /api/generate` for raw prompt completion, streamed the same way
//! - `POST /api/embeddings` for embeddings
//! - `POST /api/pull` to download a model
//! - `GET /api/tags` for the model list and health probes
//!
//! Transcription is not served by Ollama itself; it is available only when a
//! [`WhisperWorker`] is attached.

use crate::http;
use crate::worker::WhisperWorker;
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use gateway_core::{
    AiProvider, ChatChunk, ChatMessage, ChatRequest, ChatResponse, ChunkStream,
    CompletionRequest, EmbeddingRequest, EmbeddingVector, FinishReason, GatewayError,
    GatewayResult, HealthStatus, ModelInfo, ProviderCapabilities, ProviderKind, PullResult,
    TranscriptionRequest, TranscriptionResult, Usage, DEFAULT_SAMPLE_RATE,
};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Default Ollama endpoint
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Local generation can be slow on CPU-only hosts
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest stream line buffered while waiting for its newline
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Ollama provider configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Provider instance ID
    pub id: String,
    /// Server base URL
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Sample rates the attached worker accepts; `None` accepts any
    pub sample_rates: Option<Vec<u32>>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            id: "ollama".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            sample_rates: Some(vec![DEFAULT_SAMPLE_RATE]),
        }
    }
}

impl OllamaConfig {
    /// Configuration for a server at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the provider ID
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set accepted transcription sample rates
    #[must_use]
    pub fn with_sample_rates(mut self, sample_rates: Option<Vec<u32>>) -> Self {
        self.sample_rates = sample_rates;
        self
    }
}

/// Ollama provider
pub struct OllamaProvider {
    config: OllamaConfig,
    client: Client,
    capabilities: ProviderCapabilities,
    worker: Option<WhisperWorker>,
}

impl std::fmt::Debug for OllamaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaProvider")
            .field("config", &self.config)
            .field("capabilities", &self.capabilities)
            .field("worker", &self.worker)
            .finish_non_exhaustive()
    }
}

impl OllamaProvider {
    /// Create a new Ollama provider
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created
    pub fn new(config: OllamaConfig) -> GatewayResult<Self> {
        let client = http::build_client(&config.id, config.timeout)?;

        Ok(Self {
            capabilities: ProviderCapabilities {
                chat: true,
                streaming: true,
                embeddings: true,
                transcription: false,
                completion: true,
                model_pull: true,
                sample_rates: None,
            },
            config,
            client,
            worker: None,
        })
    }

    /// Serve transcription through a worker subprocess
    #[must_use]
    pub fn with_worker(mut self, worker: WhisperWorker) -> Self {
        self.worker = Some(
            worker
                .with_provider_id(&self.config.id)
                .with_timeout(self.config.timeout),
        );
        self.capabilities.transcription = true;
        self.capabilities.sample_rates = self.config.sample_rates.clone();
        self
    }

    fn url(&self, path: &str) -> String {
        http::endpoint(&self.config.base_url, path)
    }

    fn transform_request(request: &ChatRequest, stream: bool) -> OllamaChatRequest<'_> {
        OllamaChatRequest {
            model: &request.model,
            messages: request.messages.iter().map(OllamaMessage::from).collect(),
            stream,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }

    fn transform_response(response: OllamaResponse) -> ChatResponse {
        let finish_reason = response
            .done_reason
            .as_deref()
            .map_or(FinishReason::Stop, FinishReason::from_provider);

        let content = response
            .message
            .map(|m| m.content)
            .or(response.response)
            .unwrap_or_default();
        let mut result = ChatResponse::new(content, response.model, finish_reason);
        if let Some(usage) = usage_from_counts(response.prompt_eval_count, response.eval_count) {
            result = result.with_usage(usage);
        }
        result
    }

    fn transform_completion(
        request: &CompletionRequest,
        stream: bool,
    ) -> OllamaGenerateRequest<'_> {
        OllamaGenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            stream,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }

    /// Non-streaming POST returning a decoded body, with `error` fields
    /// surfaced as provider errors
    async fn post_json<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> GatewayResult<OllamaResponse> {
        let (id, timeout) = (&self.config.id, self.config.timeout);
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| http::map_request_error(id, timeout, &e))?;
        let response = http::check_status(id, timeout, response).await?;
        let parsed: OllamaResponse = http::decode_json(id, timeout, response).await?;

        match parsed.error {
            Some(message) => Err(GatewayError::provider(id, None, message)),
            None => Ok(parsed),
        }
    }

    /// Start a streaming POST. Sending and reading an error body are both
    /// bounded by the timeout; the body itself is bounded per read.
    async fn open_stream<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> GatewayResult<Response> {
        let (id, timeout) = (&self.config.id, self.config.timeout);
        let open = async {
            let response = self
                .client
                .post(self.url(path))
                .json(body)
                .send()
                .await
                .map_err(|e| http::map_request_error(id, timeout, &e))?;
            http::check_status(id, timeout, response).await
        };

        tokio::time::timeout(timeout, open)
            .await
            .map_err(|_| GatewayError::timeout(id, timeout))?
    }
}

/// Splits a byte stream into newline-terminated lines, refusing to buffer a
/// single line past [`MAX_LINE_BYTES`].
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, provider: &str, bytes: &[u8]) -> GatewayResult<()> {
        self.pending.extend_from_slice(bytes);

        let unterminated = self
            .pending
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(self.pending.len(), |last| self.pending.len() - last - 1);
        if unterminated > MAX_LINE_BYTES {
            return Err(GatewayError::provider(
                provider,
                None,
                format!("Stream line exceeds {MAX_LINE_BYTES} bytes without a newline"),
            ));
        }
        Ok(())
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        let newline = self.pending.iter().position(|b| *b == b'\n')?;
        Some(self.pending.drain(..=newline).collect())
    }

    fn take_rest(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }
}

/// Turn an NDJSON response body into fragments, stopping after the final one.
fn ndjson_chunks(provider: String, timeout: Duration, response: Response) -> ChunkStream {
    let stream = try_stream! {
        let mut body = response.bytes_stream();
        let mut lines = LineBuffer::default();

        'read: loop {
            let next = tokio::time::timeout(timeout, body.next())
                .await
                .map_err(|_| GatewayError::timeout(&provider, timeout))?;

            let Some(bytes) = next else {
                // A trailing fragment without a newline still counts.
                if let Some(chunk) = parse_stream_line(&provider, &lines.take_rest())? {
                    yield chunk;
                }
                break 'read;
            };

            let bytes = bytes.map_err(|e| http::map_request_error(&provider, timeout, &e))?;
            lines.push(&provider, &bytes)?;

            while let Some(line) = lines.next_line() {
                if let Some(chunk) = parse_stream_line(&provider, &line)? {
                    trace!(content_len = chunk.content.len(), done = chunk.is_final(), "Ollama fragment");
                    let last = chunk.is_final();
                    yield chunk;
                    if last {
                        break 'read;
                    }
                }
            }
        }
    };

    Box::pin(stream)
}

fn usage_from_counts(prompt: Option<u32>, completion: Option<u32>) -> Option<Usage> {
    match (prompt, completion) {
        (None, None) => None,
        (p, c) => Some(Usage::new(p.unwrap_or(0), c.unwrap_or(0))),
    }
}

/// Parse one NDJSON line of a chat stream. Blank lines yield nothing.
fn parse_stream_line(provider: &str, line: &[u8]) -> GatewayResult<Option<ChatChunk>> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let chunk: OllamaStreamChunk = serde_json::from_slice(line).map_err(|e| {
        GatewayError::provider(provider, None, format!("Invalid stream fragment: {e}"))
    })?;

    if let Some(message) = chunk.error {
        return Err(GatewayError::provider(provider, None, message));
    }

    let content = chunk
        .message
        .map(|m| m.content)
        .or(chunk.response)
        .unwrap_or_default();

    if !chunk.done {
        return Ok(Some(ChatChunk::delta(content)));
    }

    let reason = chunk
        .done_reason
        .as_deref()
        .map_or(FinishReason::Stop, FinishReason::from_provider);
    let mut last = ChatChunk::finished(content, reason);
    if let Some(usage) = usage_from_counts(chunk.prompt_eval_count, chunk.eval_count) {
        last = last.with_usage(usage);
    }
    Ok(Some(last))
}

#[async_trait]
impl AiProvider for OllamaProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn health_check(&self) -> HealthStatus {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .timeout(http::HEALTH_CHECK_TIMEOUT.min(self.config.timeout))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => HealthStatus::Healthy,
            Ok(resp) => {
                warn!(status = %resp.status(), "Ollama health check failed");
                HealthStatus::Degraded
            }
            Err(e) => {
                error!(error = %e, "Ollama health check error");
                HealthStatus::Unhealthy
            }
        }
    }

    async fn list_models(&self) -> GatewayResult<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| http::map_request_error(&self.config.id, self.config.timeout, &e))?;
        let response = http::check_status(&self.config.id, self.config.timeout, response).await?;
        let tags: OllamaTagsResponse =
            http::decode_json(&self.config.id, self.config.timeout, response).await?;

        Ok(tags
            .models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name,
                size_bytes: m.size,
                modified_at: m.modified_at,
            })
            .collect())
    }

    async fn chat_completion(&self, request: &ChatRequest) -> GatewayResult<ChatResponse> {
        debug!(model = %request.model, "Sending chat request to Ollama");

        let parsed = self
            .post_json("/api/chat", &Self::transform_request(request, false))
            .await?;
        Ok(Self::transform_response(parsed))
    }

    async fn chat_completion_stream(&self, request: &ChatRequest) -> GatewayResult<ChunkStream> {
        debug!(model = %request.model, "Starting streaming chat request to Ollama");

        let response = self
            .open_stream("/api/chat", &Self::transform_request(request, true))
            .await?;
        Ok(ndjson_chunks(self.config.id.clone(), self.config.timeout, response))
    }

    async fn completion(&self, request: &CompletionRequest) -> GatewayResult<ChatResponse> {
        debug!(model = %request.model, "Sending prompt completion to Ollama");

        let parsed = self
            .post_json("/api/generate", &Self::transform_completion(request, false))
            .await?;
        Ok(Self::transform_response(parsed))
    }

    async fn completion_stream(&self, request: &CompletionRequest) -> GatewayResult<ChunkStream> {
        debug!(model = %request.model, "Starting streaming prompt completion to Ollama");

        let response = self
            .open_stream("/api/generate", &Self::transform_completion(request, true))
            .await?;
        Ok(ndjson_chunks(self.config.id.clone(), self.config.timeout, response))
    }

    async fn pull_model(&self, model: &str) -> GatewayResult<PullResult> {
        let (id, timeout) = (&self.config.id, self.config.timeout);
        debug!(model = %model, "Pulling model through Ollama");

        let response = self
            .client
            .post(self.url("/api/pull"))
            .json(&OllamaPullRequest {
                name: model,
                stream: false,
            })
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| http::map_request_error(id, timeout, &e))?;
        let response = http::check_status(id, timeout, response).await?;
        let parsed: OllamaPullResponse = http::decode_json(id, timeout, response).await?;

        if let Some(message) = parsed.error {
            return Err(GatewayError::provider(id, None, message));
        }
        Ok(PullResult {
            model: model.to_string(),
            status: parsed.status.unwrap_or_else(|| "success".to_string()),
        })
    }

    async fn embeddings(&self, request: &EmbeddingRequest) -> GatewayResult<EmbeddingVector> {
        let url = self.url("/api/embeddings");

        debug!(url = %url, model = %request.model, "Requesting embedding from Ollama");

        let response = self
            .client
            .post(&url)
            .json(&OllamaEmbeddingRequest {
                model: &request.model,
                prompt: &request.text,
            })
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| http::map_request_error(&self.config.id, self.config.timeout, &e))?;
        let response = http::check_status(&self.config.id, self.config.timeout, response).await?;
        let parsed: OllamaEmbeddingResponse =
            http::decode_json(&self.config.id, self.config.timeout, response).await?;

        Ok(parsed.embedding)
    }

    async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> GatewayResult<TranscriptionResult> {
        match &self.worker {
            Some(worker) => worker.transcribe(request).await,
            None => Err(GatewayError::unsupported_capability(
                &self.config.id,
                gateway_core::Capability::Transcription,
            )),
        }
    }
}

// ============================================================================
// Ollama API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a ChatMessage> for OllamaMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        Self {
            role: msg.role.as_str(),
            content: &msg.content,
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

/// Non-streaming body of `/api/chat` (`message`) and `/api/generate` (`response`)
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    model: String,
    message: Option<OllamaResponseMessage>,
    response: Option<String>,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamChunk {
    message: Option<OllamaResponseMessage>,
    response: Option<String>,
    #[serde(default)]
    done: bool,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct OllamaPullRequest<'a> {
    name: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaPullResponse {
    status: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
    size: Option<u64>,
    modified_at: Option<String>,
}
