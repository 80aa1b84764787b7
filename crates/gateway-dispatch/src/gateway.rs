//! The gateway facade.
//!
//! Every call runs the same pre-flight sequence before the provider sees it:
//!
//! 1. request validation (`Validation`)
//! 2. capability check against the provider's declared set
//!    (`CapabilityNotSupported`)
//! 3. for transcription, payload and sample-rate checks (`UnsupportedFormat`)
//! 4. default model substitution when the request names none
//!
//! A call rejected by pre-flight never reaches the network or a subprocess.
//!
//! Streams are logged and recorded twice over their life: a failure to open
//! is recorded immediately, and an opened stream is recorded when it ends,
//! with the outcome of its terminal item.

use futures::Future;
use gateway_core::{
    AiProvider, Capability, ChatRequest, ChatResponse, ChatStream, ChunkStream,
    CompletionRequest, EmbeddingRequest, EmbeddingVector, FinishReason, GatewayError,
    GatewayResult, HealthStatus, ModelInfo, ProviderCapabilities, PullResult, StreamEnd,
    TranscriptionRequest, TranscriptionResult, Usage,
};
use gateway_telemetry::{
    new_request_id, provider_span, GatewayMetrics, OUTCOME_CANCELLED, OUTCOME_SUCCESS,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Models substituted when a request leaves `model` empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefaults {
    /// Default chat model
    pub chat: String,
    /// Default embedding model
    pub embedding: String,
}

impl ModelDefaults {
    /// Create defaults
    pub fn new(chat: impl Into<String>, embedding: impl Into<String>) -> Self {
        Self {
            chat: chat.into(),
            embedding: embedding.into(),
        }
    }
}

/// Result of [`Gateway::chat_completion`], depending on `request.stream`.
#[derive(Debug)]
pub enum ChatOutcome {
    /// A complete response
    Complete(ChatResponse),
    /// A lazy fragment stream
    Stream(ChatStream),
}

impl ChatOutcome {
    /// Whether this is a stream
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// Resolve to a complete response, draining the stream if necessary
    pub async fn into_response(self) -> GatewayResult<ChatResponse> {
        match self {
            Self::Complete(response) => Ok(response),
            Self::Stream(stream) => stream.collect_response().await,
        }
    }
}

/// Uniform capability interface over one configured provider.
///
/// Cheap to share behind an `Arc`; holds no per-call state.
#[derive(Clone)]
pub struct Gateway {
    provider: Arc<dyn AiProvider>,
    defaults: ModelDefaults,
    metrics: Option<GatewayMetrics>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("provider", &self.provider.id())
            .field("kind", &self.provider.kind())
            .field("defaults", &self.defaults)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl Gateway {
    /// Wrap a provider
    pub fn new(provider: Arc<dyn AiProvider>, defaults: ModelDefaults) -> Self {
        Self {
            provider,
            defaults,
            metrics: None,
        }
    }

    /// Record every call into `metrics`
    #[must_use]
    pub fn with_metrics(mut self, metrics: GatewayMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The active provider
    pub fn provider(&self) -> &Arc<dyn AiProvider> {
        &self.provider
    }

    /// Declared capabilities of the active provider
    pub fn capabilities(&self) -> &ProviderCapabilities {
        self.provider.capabilities()
    }

    /// Default models
    pub fn defaults(&self) -> &ModelDefaults {
        &self.defaults
    }

    /// Attached metrics, if any
    pub fn metrics(&self) -> Option<&GatewayMetrics> {
        self.metrics.as_ref()
    }

    /// Chat completion; streams when `request.stream` is set.
    pub async fn chat_completion(&self, request: ChatRequest) -> GatewayResult<ChatOutcome> {
        if request.stream {
            self.stream(request).await.map(ChatOutcome::Stream)
        } else {
            self.complete(request).await.map(ChatOutcome::Complete)
        }
    }

    /// Non-streaming chat completion, regardless of `request.stream`
    pub async fn complete(&self, mut request: ChatRequest) -> GatewayResult<ChatResponse> {
        request.stream = false;
        request.validate()?;
        self.require(Capability::Chat)?;
        self.resolve_chat_model(&mut request);

        let provider = Arc::clone(&self.provider);
        let model = request.model.clone();

        let response = self
            .observe(Capability::Chat, &model, async move {
                debug!(messages = request.messages.len(), "Dispatching chat completion");
                let response = provider.chat_completion(&request).await?;
                normalize_response(provider.id(), &request.model, response)
            })
            .await?;

        if let (Some(metrics), Some(usage)) = (&self.metrics, response.usage) {
            metrics.record_tokens(self.provider.id(), usage.prompt_tokens, usage.completion_tokens);
        }
        Ok(response)
    }

    /// Streaming chat completion, regardless of `request.stream`.
    ///
    /// Errors raised while opening the stream are returned here; errors after
    /// the first fragment arrive as the stream's terminal item.
    pub async fn stream(&self, mut request: ChatRequest) -> GatewayResult<ChatStream> {
        request.stream = true;
        request.validate()?;
        self.require(Capability::ChatStreaming)?;
        self.resolve_chat_model(&mut request);

        let provider = Arc::clone(&self.provider);
        let model = request.model.clone();

        self.observe_stream(Capability::ChatStreaming, model, async move {
            debug!(messages = request.messages.len(), "Opening chat stream");
            provider.chat_completion_stream(&request).await
        })
        .await
    }

    /// Raw prompt completion; streams when `request.stream` is set.
    pub async fn completion(&self, request: CompletionRequest) -> GatewayResult<ChatOutcome> {
        if request.stream {
            self.completion_stream(request).await.map(ChatOutcome::Stream)
        } else {
            self.complete_prompt(request).await.map(ChatOutcome::Complete)
        }
    }

    /// Non-streaming raw prompt completion, regardless of `request.stream`
    pub async fn complete_prompt(
        &self,
        mut request: CompletionRequest,
    ) -> GatewayResult<ChatResponse> {
        request.stream = false;
        request.validate()?;
        self.require(Capability::Completion)?;
        if request.model.is_empty() {
            request.model.clone_from(&self.defaults.chat);
        }

        let provider = Arc::clone(&self.provider);
        let model = request.model.clone();

        let response = self
            .observe(Capability::Completion, &model, async move {
                debug!(prompt_chars = request.prompt.len(), "Dispatching prompt completion");
                let response = provider.completion(&request).await?;
                normalize_response(provider.id(), &request.model, response)
            })
            .await?;

        if let (Some(metrics), Some(usage)) = (&self.metrics, response.usage) {
            metrics.record_tokens(self.provider.id(), usage.prompt_tokens, usage.completion_tokens);
        }
        Ok(response)
    }

    /// Streaming raw prompt completion, regardless of `request.stream`
    pub async fn completion_stream(
        &self,
        mut request: CompletionRequest,
    ) -> GatewayResult<ChatStream> {
        request.stream = true;
        request.validate()?;
        self.require(Capability::CompletionStreaming)?;
        if request.model.is_empty() {
            request.model.clone_from(&self.defaults.chat);
        }

        let provider = Arc::clone(&self.provider);
        let model = request.model.clone();

        self.observe_stream(Capability::CompletionStreaming, model, async move {
            debug!(prompt_chars = request.prompt.len(), "Opening completion stream");
            provider.completion_stream(&request).await
        })
        .await
    }

    /// Ask the provider to download `model`
    pub async fn pull_model(&self, model: &str) -> GatewayResult<PullResult> {
        if model.trim().is_empty() {
            return Err(GatewayError::validation("model name cannot be empty", Some("model")));
        }
        self.require(Capability::ModelPull)?;

        let provider = Arc::clone(&self.provider);
        self.observe(Capability::ModelPull, model, async move {
            info!(model = %model, "Pulling model");
            provider.pull_model(model).await
        })
        .await
    }

    /// Embed a single text
    pub async fn embeddings(&self, mut request: EmbeddingRequest) -> GatewayResult<EmbeddingVector> {
        self.require(Capability::Embeddings)?;
        if request.model.is_empty() {
            request.model.clone_from(&self.defaults.embedding);
        }

        let provider = Arc::clone(&self.provider);
        let model = request.model.clone();

        self.observe(Capability::Embeddings, &model, async move {
            let vector = provider.embeddings(&request).await?;
            if vector.is_empty() {
                return Err(GatewayError::provider(
                    provider.id(),
                    None,
                    "Backend returned an empty embedding",
                ));
            }
            debug!(dimensions = vector.len(), "Embedding received");
            Ok(vector)
        })
        .await
    }

    /// Embed several texts; one vector per input, in input order.
    ///
    /// An empty `model` selects the default embedding model.
    pub async fn embeddings_batch(
        &self,
        texts: &[String],
        model: &str,
    ) -> GatewayResult<Vec<EmbeddingVector>> {
        self.require(Capability::Embeddings)?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = if model.is_empty() {
            self.defaults.embedding.as_str()
        } else {
            model
        };

        let provider = Arc::clone(&self.provider);

        self.observe(Capability::Embeddings, model, async move {
            let vectors = provider.embeddings_batch(texts, model).await?;
            if vectors.len() != texts.len() {
                return Err(GatewayError::provider(
                    provider.id(),
                    None,
                    format!("Expected {} embeddings, received {}", texts.len(), vectors.len()),
                ));
            }
            if vectors.iter().any(Vec::is_empty) {
                return Err(GatewayError::provider(
                    provider.id(),
                    None,
                    "Backend returned an empty embedding",
                ));
            }
            Ok(vectors)
        })
        .await
    }

    /// Speech-to-text
    pub async fn transcribe(
        &self,
        request: TranscriptionRequest,
    ) -> GatewayResult<TranscriptionResult> {
        self.require(Capability::Transcription)?;

        if request.audio.is_empty() {
            return Err(GatewayError::unsupported_format("Audio payload is empty"));
        }
        let capabilities = self.provider.capabilities();
        if request.sample_rate == 0 || !capabilities.accepts_sample_rate(request.sample_rate) {
            warn!(
                provider = %self.provider.id(),
                sample_rate = request.sample_rate,
                accepted = ?capabilities.sample_rates,
                "Rejecting transcription sample rate"
            );
            return Err(GatewayError::unsupported_format(format!(
                "Sample rate {} Hz is not accepted by provider '{}'{}",
                request.sample_rate,
                self.provider.id(),
                capabilities
                    .sample_rates
                    .as_ref()
                    .map(|rates| format!(" (accepted: {rates:?})"))
                    .unwrap_or_default()
            )));
        }

        let provider = Arc::clone(&self.provider);

        self.observe(Capability::Transcription, "", async move {
            debug!(
                audio_bytes = request.audio.len(),
                sample_rate = request.sample_rate,
                "Dispatching transcription"
            );
            provider.transcribe(&request).await
        })
        .await
    }

    /// Probe the provider
    pub async fn health(&self) -> HealthStatus {
        let status = self.provider.health_check().await;
        debug!(provider = %self.provider.id(), status = ?status, "Health check");
        status
    }

    /// Models available at the provider
    pub async fn list_models(&self) -> GatewayResult<Vec<ModelInfo>> {
        self.provider.list_models().await
    }

    fn require(&self, capability: Capability) -> GatewayResult<()> {
        if self.provider.capabilities().supports(capability) {
            return Ok(());
        }

        warn!(
            provider = %self.provider.id(),
            capability = %capability,
            "Capability not supported by provider"
        );
        let err = GatewayError::unsupported_capability(self.provider.id(), capability);
        self.record(capability, Err(&err), Instant::now());
        Err(err)
    }

    fn resolve_chat_model(&self, request: &mut ChatRequest) {
        if request.model.is_empty() {
            request.model.clone_from(&self.defaults.chat);
        }
    }

    fn recorder(&self, capability: Capability, model: &str) -> CallRecorder {
        CallRecorder {
            request_id: new_request_id(),
            provider: self.provider.id().to_string(),
            capability,
            model: model.to_string(),
            started: Instant::now(),
            metrics: self.metrics.clone(),
        }
    }

    /// Run one provider call inside a request span, then log and record it.
    async fn observe<T, F>(&self, capability: Capability, model: &str, call: F) -> GatewayResult<T>
    where
        F: Future<Output = GatewayResult<T>>,
    {
        let recorder = self.recorder(capability, model);
        let result = call.instrument(recorder.span()).await;
        recorder.finish(result.as_ref().map(|_| ()));
        result
    }

    /// Open a stream inside a request span. An open failure is recorded now;
    /// an opened stream is recorded by its end hook.
    async fn observe_stream<F>(
        &self,
        capability: Capability,
        model: String,
        open: F,
    ) -> GatewayResult<ChatStream>
    where
        F: Future<Output = GatewayResult<ChunkStream>>,
    {
        let recorder = self.recorder(capability, &model);
        match open.instrument(recorder.span()).await {
            Ok(inner) => {
                debug!(request_id = %recorder.request_id, provider = %recorder.provider, "Stream opened");
                Ok(ChatStream::new(self.provider.id(), model, inner)
                    .on_end(move |end| recorder.finish_stream(end)))
            }
            Err(e) => {
                recorder.finish(Err(&e));
                Err(e)
            }
        }
    }

    fn record(&self, capability: Capability, result: Result<(), &GatewayError>, started: Instant) {
        if let Some(metrics) = &self.metrics {
            let outcome = result.map_or_else(GatewayError::kind, |()| OUTCOME_SUCCESS);
            metrics.record_request(capability.as_str(), self.provider.id(), outcome, started.elapsed());
        }
    }
}

/// Logs and records the outcome of one call. Owns everything it needs so a
/// stream can report after [`Gateway::stream`] has returned.
struct CallRecorder {
    request_id: String,
    provider: String,
    capability: Capability,
    model: String,
    started: Instant,
    metrics: Option<GatewayMetrics>,
}

impl CallRecorder {
    fn span(&self) -> tracing::Span {
        provider_span!(self.request_id, self.provider, self.capability, self.model)
    }

    fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn finish(&self, result: Result<(), &GatewayError>) {
        match result {
            Ok(()) => info!(
                request_id = %self.request_id,
                provider = %self.provider,
                capability = %self.capability,
                model = %self.model,
                duration_ms = self.elapsed_ms(),
                "Provider call succeeded"
            ),
            Err(e) => warn!(
                request_id = %self.request_id,
                provider = %self.provider,
                capability = %self.capability,
                model = %self.model,
                kind = e.kind(),
                error = %e,
                "Provider call failed"
            ),
        }
        self.count(result.map_or_else(GatewayError::kind, |()| OUTCOME_SUCCESS));
    }

    fn finish_stream(self, end: StreamEnd<'_>) {
        match end {
            StreamEnd::Completed(usage) => {
                if let (Some(metrics), Some(Usage { prompt_tokens, completion_tokens, .. })) =
                    (&self.metrics, usage)
                {
                    metrics.record_tokens(&self.provider, prompt_tokens, completion_tokens);
                }
                self.finish(Ok(()));
            }
            StreamEnd::Failed(e) => self.finish(Err(e)),
            StreamEnd::Abandoned => {
                info!(
                    request_id = %self.request_id,
                    provider = %self.provider,
                    capability = %self.capability,
                    model = %self.model,
                    duration_ms = self.elapsed_ms(),
                    "Stream abandoned before completion"
                );
                self.count(OUTCOME_CANCELLED);
            }
        }
    }

    fn count(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request(
                self.capability.as_str(),
                &self.provider,
                outcome,
                self.started.elapsed(),
            );
        }
    }
}

/// Enforce the non-streaming completion contract
fn normalize_response(
    provider: &str,
    requested_model: &str,
    mut response: ChatResponse,
) -> GatewayResult<ChatResponse> {
    match response.finish_reason {
        FinishReason::Error => Err(GatewayError::provider(
            provider,
            None,
            "Backend reported an error finish reason",
        )),
        FinishReason::Stop if response.content.is_empty() => Err(GatewayError::provider(
            provider,
            None,
            "Backend finished without producing content",
        )),
        _ => {
            if response.model.is_empty() {
                response.model = requested_model.to_string();
            }
            Ok(response)
        }
    }
}
