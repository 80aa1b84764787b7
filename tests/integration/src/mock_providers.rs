//! Mock backends for integration testing
//!
//! Wiremock servers that simulate the Ollama and OpenAI APIs, plus an
//! in-process provider that reports when its stream has been released.

use crate::fixtures::{
    ollama_chat_response, ollama_embedding_response, ollama_generate_response,
    ollama_generate_stream_body, ollama_stream_body, ollama_tags_response, openai_chat_response, openai_embedding_response, openai_error_response, openai_sse_body,
};
use async_trait::async_trait;
use gateway_core::{
    AiProvider, ChatChunk, ChatRequest, ChunkStream, GatewayError, GatewayResult, HealthStatus,
    ProviderCapabilities, ProviderKind,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock Ollama server
pub struct MockOllama {
    pub server: MockServer,
}

impl MockOllama {
    /// Start a new mock Ollama server
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL for this mock server
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Number of requests the server has received
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }

    /// Body of the most recent request, as JSON
    pub async fn last_body(&self) -> serde_json::Value {
        self.server
            .received_requests()
            .await
            .and_then(|requests| requests.last().and_then(|r| r.body_json().ok()))
            .unwrap_or_default()
    }

    /// Answer `/api/chat` (non-streaming) for a model
    pub async fn mock_chat(&self, model: &str, content: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"model": model, "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(ollama_chat_response(model, content)))
            .mount(&self.server)
            .await;
    }

    /// Answer `/api/chat` (non-streaming) after a delay
    pub async fn mock_chat_delayed(&self, model: &str, content: &str, delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(ollama_chat_response(model, content))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer streaming `/api/chat` with NDJSON fragments
    pub async fn mock_chat_stream(&self, model: &str, parts: &[&str], done_reason: Option<&str>) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"model": model, "stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                ollama_stream_body(model, parts, done_reason),
                "application/x-ndjson",
            ))
            .mount(&self.server)
            .await;
    }

    /// Fail `/api/chat` with a status and Ollama-style error body
    pub async fn mock_chat_error(&self, status: u16, message: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({"error": message})))
            .mount(&self.server)
            .await;
    }

    /// Answer `/api/embeddings` for a model
    pub async fn mock_embeddings(&self, model: &str, vector: &[f32]) {
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_partial_json(json!({"model": model})))
            .respond_with(ResponseTemplate::new(200).set_body_json(ollama_embedding_response(vector)))
            .mount(&self.server)
            .await;
    }

    /// Answer `/api/generate`, streaming or not, for a model
    pub async fn mock_generate(&self, model: &str, parts: &[&str]) {
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({"model": model, "stream": false})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(ollama_generate_response(model, &parts.concat())),
            )
            .mount(&self.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({"model": model, "stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                ollama_generate_stream_body(model, parts),
                "application/x-ndjson",
            ))
            .mount(&self.server)
            .await;
    }

    /// Answer `/api/pull` with a status code and body
    pub async fn mock_pull(&self, status: u16, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/api/pull"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Answer `/api/tags`
    pub async fn mock_tags(&self, models: &[(&str, u64)]) {
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ollama_tags_response(models)))
            .mount(&self.server)
            .await;
    }
}

/// Mock OpenAI API server
pub struct MockOpenAI {
    pub server: MockServer,
}

impl MockOpenAI {
    /// API key the mock expects
    pub const API_KEY: &'static str = "sk-test-key";

    /// Start a new mock OpenAI server
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL for this mock server, including the `/v1` prefix
    pub fn url(&self) -> String {
        format!("{}/v1", self.server.uri())
    }

    /// Number of requests the server has received
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }

    /// Answer `/v1/chat/completions` (non-streaming)
    pub async fn mock_chat_completion(&self, model: &str, content: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", format!("Bearer {}", Self::API_KEY).as_str()))
            .and(body_partial_json(json!({"model": model, "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_chat_response(model, content)))
            .mount(&self.server)
            .await;
    }

    /// Answer `/v1/chat/completions` with server-sent events
    pub async fn mock_chat_stream(&self, model: &str, parts: &[&str], finish_reason: Option<&str>) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"model": model, "stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                openai_sse_body(model, parts, finish_reason),
                "text/event-stream",
            ))
            .mount(&self.server)
            .await;
    }

    /// Fail `/v1/chat/completions` with an OpenAI-style error
    pub async fn mock_chat_error(&self, status: u16, error_type: &str, message: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(openai_error_response(error_type, message)),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer `/v1/embeddings` with the given vectors
    pub async fn mock_embeddings(&self, vectors: &[Vec<f32>]) {
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_embedding_response(vectors)))
            .mount(&self.server)
            .await;
    }

    /// Answer `/v1/audio/transcriptions`
    pub async fn mock_transcription(&self, text: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": text})))
            .mount(&self.server)
            .await;
    }

    /// Answer `/v1/models`
    pub async fn mock_models(&self, ids: &[&str]) {
        let data: Vec<_> = ids
            .iter()
            .map(|id| json!({"id": id, "object": "model", "owned_by": "openai"}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"object": "list", "data": data})))
            .mount(&self.server)
            .await;
    }

    /// Fail `/v1/models` with a status
    pub async fn mock_models_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(openai_error_response("rate_limit_exceeded", "Slow down")),
            )
            .mount(&self.server)
            .await;
    }
}

/// Decrements a shared counter when dropped.
struct ReleaseGuard(Arc<AtomicUsize>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Streaming provider that never finishes on its own and counts open streams.
///
/// Each stream yields `fragments` deltas and then waits forever, holding a
/// guard until the consumer drops it.
pub struct EndlessStreamProvider {
    capabilities: ProviderCapabilities,
    fragments: usize,
    open: Arc<AtomicUsize>,
}

impl EndlessStreamProvider {
    /// Create a provider whose streams yield `fragments` deltas
    pub fn new(fragments: usize) -> Arc<Self> {
        Arc::new(Self {
            capabilities: ProviderCapabilities::chat_only(),
            fragments,
            open: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Streams not yet released
    pub fn open_streams(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiProvider for EndlessStreamProvider {
    fn id(&self) -> &str {
        "endless"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn base_url(&self) -> &str {
        "memory://endless"
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus::Healthy
    }

    async fn chat_completion_stream(&self, _request: &ChatRequest) -> GatewayResult<ChunkStream> {
        self.open.fetch_add(1, Ordering::SeqCst);
        let guard = ReleaseGuard(Arc::clone(&self.open));
        let fragments = self.fragments;

        let stream = async_stream::stream! {
            let _guard = guard;
            for i in 0..fragments {
                yield Ok::<_, GatewayError>(ChatChunk::delta(format!("part{i} ")));
            }
            futures::future::pending::<()>().await;
        };
        Ok(Box::pin(stream))
    }
}
