//! Local provider tests against a mock Ollama server

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::MockOllama;
use futures::StreamExt;
use gateway_core::{CompletionRequest, EmbeddingRequest, FinishReason, HealthStatus};
use gateway_telemetry::OUTCOME_SUCCESS;
use std::time::Duration;

#[tokio::test]
async fn test_chat_uses_default_model() {
    let mock = MockOllama::new().await;
    mock.mock_chat("llama3", "I'm doing well.").await;
    let (gateway, metrics) = local_gateway(&mock.url());

    let response = gateway.complete(simple_chat_request()).await.unwrap();

    assert_eq!(response.content, "I'm doing well.");
    assert_eq!(response.model, "llama3");
    assert_eq!(response.finish_reason, FinishReason::Stop);
    let usage = response.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 12);
    assert_eq!(usage.completion_tokens, 7);

    assert_eq!(metrics.request_count("chat", "ollama", OUTCOME_SUCCESS), 1);
    assert_eq!(metrics.token_count("ollama", "prompt"), 12);
}

#[tokio::test]
async fn test_chat_request_body() {
    let mock = MockOllama::new().await;
    mock.mock_chat("mistral", "8").await;
    let (gateway, _) = local_gateway(&mock.url());

    let request = multi_turn_chat_request()
        .with_model("mistral")
        .with_temperature(0.1)
        .with_max_tokens(5);
    gateway.complete(request).await.unwrap();

    let body = mock.last_body().await;
    assert_eq!(body["stream"], false);
    assert_eq!(body["messages"].as_array().unwrap().len(), 4);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][2]["role"], "assistant");
    assert_eq!(body["options"]["num_predict"], 5);
    assert!((body["options"]["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
}

#[tokio::test]
async fn test_chat_omits_num_predict_without_max_tokens() {
    let mock = MockOllama::new().await;
    mock.mock_chat("llama3", "ok").await;
    let (gateway, _) = local_gateway(&mock.url());

    gateway.complete(simple_chat_request()).await.unwrap();

    let body = mock.last_body().await;
    assert!(body["options"].get("num_predict").is_none());
}

#[tokio::test]
async fn test_chat_backend_error() {
    let mock = MockOllama::new().await;
    mock.mock_chat_error(404, "model 'nope' not found").await;
    let (gateway, metrics) = local_gateway(&mock.url());

    let err = gateway.complete(chat_request_for("nope")).await.unwrap_err();

    assert_eq!(err.kind(), "provider_error");
    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().contains("model 'nope' not found"));
    assert_eq!(metrics.request_count("chat", "ollama", "provider_error"), 1);
}

#[tokio::test]
async fn test_chat_unreachable() {
    let (gateway, _) = local_gateway(&unreachable_url());

    let err = gateway.complete(simple_chat_request()).await.unwrap_err();

    assert_eq!(err.kind(), "provider_unavailable");
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_chat_timeout() {
    let mock = MockOllama::new().await;
    mock.mock_chat_delayed("llama3", "too late", Duration::from_secs(5)).await;
    let (gateway, metrics) =
        local_gateway_with_timeout(&mock.url(), Duration::from_millis(200));

    let err = gateway.complete(simple_chat_request()).await.unwrap_err();

    assert_eq!(err.kind(), "timeout");
    assert_eq!(metrics.request_count("chat", "ollama", "timeout"), 1);
}

#[tokio::test]
async fn test_stream_fragments_in_order() {
    let mock = MockOllama::new().await;
    mock.mock_chat_stream("llama3", &["The ", "sky ", "is blue."], Some("stop"))
        .await;
    let (gateway, _) = local_gateway(&mock.url());

    let mut stream = gateway.stream(simple_chat_request()).await.unwrap();
    let mut fragments = Vec::new();
    let mut finals = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        if chunk.is_final() {
            finals += 1;
            assert_eq!(chunk.finish_reason, Some(FinishReason::Stop));
        }
        fragments.push(chunk.content);
    }

    assert_eq!(finals, 1);
    assert_eq!(fragments.concat(), "The sky is blue.");
    assert_eq!(stream.content(), "The sky is blue.");
}

#[tokio::test]
async fn test_stream_length_finish() {
    let mock = MockOllama::new().await;
    mock.mock_chat_stream("llama3", &["Once upon"], Some("length")).await;
    let (gateway, _) = local_gateway(&mock.url());

    let response = gateway
        .stream(simple_chat_request())
        .await
        .unwrap()
        .collect_response()
        .await
        .unwrap();

    assert_eq!(response.content, "Once upon");
    assert_eq!(response.finish_reason, FinishReason::Length);
    assert_eq!(response.usage.unwrap().completion_tokens, 1);
}

#[tokio::test]
async fn test_stream_ending_without_final_line_is_unavailable() {
    let mock = MockOllama::new().await;
    mock.mock_chat_stream("llama3", &["partial ", "answer"], None).await;
    let (gateway, _) = local_gateway(&mock.url());

    let mut stream = gateway.stream(simple_chat_request()).await.unwrap();
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item);
    }

    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok());
    assert!(items[1].is_ok());
    let err = items[2].as_ref().unwrap_err();
    assert_eq!(err.kind(), "provider_unavailable");
}

#[tokio::test]
async fn test_stream_connection_lost_is_unavailable() {
    let first = ollama_stream_body("llama3", &["partial "], None);
    let url = spawn_truncating_server("application/x-ndjson", first).await;
    let (gateway, metrics) = local_gateway(&url);

    let mut stream = gateway.stream(simple_chat_request()).await.unwrap();
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item);
    }

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().content, "partial ");
    let err = items[1].as_ref().unwrap_err();
    assert_eq!(err.kind(), "provider_unavailable");
    assert_eq!(stream.content(), "partial ");
    assert_eq!(
        metrics.request_count("chat_streaming", "ollama", "provider_unavailable"),
        1
    );
}

#[tokio::test]
async fn test_stream_open_bounded_while_reading_error_body() {
    let url = spawn_stalling_error_server().await;
    let (gateway, metrics) = local_gateway_with_timeout(&url, Duration::from_millis(200));

    let started = std::time::Instant::now();
    let err = gateway.stream(simple_chat_request()).await.unwrap_err();

    assert_eq!(err.kind(), "timeout");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(metrics.request_count("chat_streaming", "ollama", "timeout"), 1);
}

#[tokio::test]
async fn test_stream_open_error() {
    let mock = MockOllama::new().await;
    mock.mock_chat_error(500, "out of memory").await;
    let (gateway, metrics) = local_gateway(&mock.url());

    let err = gateway.stream(simple_chat_request()).await.unwrap_err();

    assert_eq!(err.kind(), "provider_error");
    assert_eq!(err.status(), Some(500));
    assert_eq!(metrics.request_count("chat_streaming", "ollama", "provider_error"), 1);
}

#[tokio::test]
async fn test_stream_and_complete_converge() {
    let mock = MockOllama::new().await;
    mock.mock_chat("llama3", "Paris is the capital of France.").await;
    mock.mock_chat_stream(
        "llama3",
        &["Paris ", "is the capital ", "of France."],
        Some("stop"),
    )
    .await;
    let (gateway, _) = local_gateway(&mock.url());

    let complete = gateway.complete(simple_chat_request()).await.unwrap();
    let streamed = gateway
        .stream(simple_chat_request())
        .await
        .unwrap()
        .collect_response()
        .await
        .unwrap();

    assert_eq!(complete.content, streamed.content);
    assert_eq!(complete.finish_reason, streamed.finish_reason);
    assert_eq!(complete.model, streamed.model);
}

#[tokio::test]
async fn test_embeddings_default_model_and_stable_dimensions() {
    let mock = MockOllama::new().await;
    mock.mock_embeddings("nomic-embed-text", &test_vector(768, 0.0))
        .await;
    let (gateway, metrics) = local_gateway(&mock.url());

    let first = gateway
        .embeddings(EmbeddingRequest::new("first text"))
        .await
        .unwrap();
    let second = gateway
        .embeddings(EmbeddingRequest::new("a much longer second text"))
        .await
        .unwrap();

    assert_eq!(first.len(), 768);
    assert_eq!(first.len(), second.len());
    assert_eq!(metrics.request_count("embeddings", "ollama", OUTCOME_SUCCESS), 2);
}

#[tokio::test]
async fn test_embeddings_batch_one_call_per_text() {
    let mock = MockOllama::new().await;
    mock.mock_embeddings("all-minilm", &test_vector(384, 0.5)).await;
    let (gateway, _) = local_gateway(&mock.url());

    let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let vectors = gateway.embeddings_batch(&texts, "all-minilm").await.unwrap();

    assert_eq!(vectors.len(), 3);
    assert!(vectors.iter().all(|v| v.len() == 384));
    assert_eq!(mock.request_count().await, 3);
}

#[tokio::test]
async fn test_empty_embedding_is_provider_error() {
    let mock = MockOllama::new().await;
    mock.mock_embeddings("nomic-embed-text", &[]).await;
    let (gateway, _) = local_gateway(&mock.url());

    let err = gateway
        .embeddings(EmbeddingRequest::new("text"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "provider_error");
}

#[tokio::test]
async fn test_transcription_without_worker_makes_no_calls() {
    let mock = MockOllama::new().await;
    let (gateway, metrics) = local_gateway(&mock.url());

    let err = gateway
        .transcribe(gateway_core::TranscriptionRequest::new(vec![1_u8; 32], 16_000))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "capability_not_supported");
    assert_eq!(mock.request_count().await, 0);
    assert_eq!(
        metrics.request_count("transcription", "ollama", "capability_not_supported"),
        1
    );
}

#[tokio::test]
async fn test_list_models_and_health() {
    let mock = MockOllama::new().await;
    mock.mock_tags(&[("llama3:latest", 4_661_224_676), ("nomic-embed-text:latest", 274_302_450)])
        .await;
    let (gateway, _) = local_gateway(&mock.url());

    let models = gateway.list_models().await.unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].id, "llama3:latest");
    assert_eq!(models[0].size_bytes, Some(4_661_224_676));

    assert_eq!(gateway.health().await, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_health_unreachable() {
    let (gateway, _) = local_gateway(&unreachable_url());
    assert_eq!(gateway.health().await, HealthStatus::Unhealthy);
}

#[tokio::test]
async fn test_prompt_completion() {
    let mock = MockOllama::new().await;
    mock.mock_generate("llama3", &["Once ", "upon ", "a time"]).await;
    let (gateway, metrics) = local_gateway(&mock.url());

    let response = gateway
        .complete_prompt(CompletionRequest::new("Start a story").with_max_tokens(12))
        .await
        .unwrap();

    assert_eq!(response.content, "Once upon a time");
    assert_eq!(response.model, "llama3");
    assert_eq!(response.usage.unwrap().completion_tokens, 9);
    assert_eq!(metrics.request_count("completion", "ollama", OUTCOME_SUCCESS), 1);

    let body = mock.last_body().await;
    assert_eq!(body["prompt"], "Start a story");
    assert_eq!(body["options"]["num_predict"], 12);
}

#[tokio::test]
async fn test_prompt_completion_stream() {
    let mock = MockOllama::new().await;
    mock.mock_generate("llama3", &["Once ", "upon ", "a time"]).await;
    let (gateway, metrics) = local_gateway(&mock.url());

    let mut stream = gateway
        .completion_stream(CompletionRequest::new("Start a story"))
        .await
        .unwrap();
    let mut fragments = Vec::new();
    while let Some(chunk) = stream.next().await {
        fragments.push(chunk.unwrap());
    }

    assert_eq!(fragments.len(), 4);
    assert_eq!(stream.content(), "Once upon a time");
    assert_eq!(stream.finish_reason(), Some(FinishReason::Length));
    assert_eq!(
        metrics.request_count("completion_streaming", "ollama", OUTCOME_SUCCESS),
        1
    );
}

#[tokio::test]
async fn test_pull_model() {
    let mock = MockOllama::new().await;
    mock.mock_pull(200, serde_json::json!({"status": "success"})).await;
    let (gateway, _) = local_gateway(&mock.url());

    let result = gateway.pull_model("mistral").await.unwrap();

    assert_eq!(result.model, "mistral");
    assert_eq!(result.status, "success");
    let body = mock.last_body().await;
    assert_eq!(body["name"], "mistral");
    assert_eq!(body["stream"], false);
}

#[tokio::test]
async fn test_pull_unknown_model_is_provider_error() {
    let mock = MockOllama::new().await;
    mock.mock_pull(500, serde_json::json!({"error": "pull model manifest: file does not exist"}))
        .await;
    let (gateway, metrics) = local_gateway(&mock.url());

    let err = gateway.pull_model("no-such-model").await.unwrap_err();

    assert_eq!(err.kind(), "provider_error");
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("file does not exist"));
    assert_eq!(metrics.request_count("model_pull", "ollama", "provider_error"), 1);
}

#[tokio::test]
async fn test_cloud_has_no_prompt_completion_or_pull() {
    let mock = crate::mock_providers::MockOpenAI::new().await;
    let (gateway, _) = cloud_gateway(&mock.url());

    let err = gateway
        .complete_prompt(CompletionRequest::new("hi"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "capability_not_supported");
    let err = gateway.pull_model("gpt-4").await.unwrap_err();
    assert_eq!(err.kind(), "capability_not_supported");
    assert_eq!(mock.request_count().await, 0);
}
