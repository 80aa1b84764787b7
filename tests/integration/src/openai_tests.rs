//! Cloud provider tests against a mock OpenAI server

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::MockOpenAI;
use futures::StreamExt;
use gateway_core::{EmbeddingRequest, FinishReason, HealthStatus, TranscriptionRequest};
use gateway_telemetry::{OUTCOME_CANCELLED, OUTCOME_SUCCESS};

#[tokio::test]
async fn test_chat_completion() {
    let mock = MockOpenAI::new().await;
    mock.mock_chat_completion("gpt-4", "Hello there!").await;
    let (gateway, metrics) = cloud_gateway(&mock.url());

    let response = gateway.complete(simple_chat_request()).await.unwrap();

    assert_eq!(response.content, "Hello there!");
    assert_eq!(response.model, "gpt-4");
    assert_eq!(response.finish_reason, FinishReason::Stop);
    assert_eq!(response.usage.unwrap().total_tokens, 30);
    assert_eq!(metrics.request_count("chat", "openai", OUTCOME_SUCCESS), 1);
    assert_eq!(metrics.token_count("openai", "completion"), 20);
}

#[tokio::test]
async fn test_chat_rate_limited() {
    let mock = MockOpenAI::new().await;
    mock.mock_chat_error(429, "rate_limit_exceeded", "Rate limit exceeded")
        .await;
    let (gateway, _) = cloud_gateway(&mock.url());

    let err = gateway.complete(simple_chat_request()).await.unwrap_err();

    assert_eq!(err.kind(), "provider_error");
    assert_eq!(err.status(), Some(429));
    assert!(err.is_transient());
    assert!(err.to_string().contains("Rate limit exceeded"));
}

#[tokio::test]
async fn test_chat_unauthorized() {
    let mock = MockOpenAI::new().await;
    mock.mock_chat_error(401, "invalid_api_key", "Incorrect API key provided")
        .await;
    let (gateway, _) = cloud_gateway(&mock.url());

    let err = gateway.complete(simple_chat_request()).await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_stream_sse() {
    let mock = MockOpenAI::new().await;
    mock.mock_chat_stream("gpt-4", &["Hello", ", ", "world!"], Some("stop"))
        .await;
    let (gateway, _) = cloud_gateway(&mock.url());

    let mut stream = gateway.stream(simple_chat_request()).await.unwrap();
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk.unwrap());
    }

    let last = chunks.last().unwrap();
    assert!(last.is_final());
    assert_eq!(last.finish_reason, Some(FinishReason::Stop));
    assert_eq!(chunks.iter().filter(|c| c.is_final()).count(), 1);
    assert_eq!(stream.content(), "Hello, world!");
}

#[tokio::test]
async fn test_stream_without_finish_reason_ends_at_done() {
    let mock = MockOpenAI::new().await;
    let body = format!("{}data: [DONE]\n\n", openai_sse_body("gpt-4", &["Hi"], None));
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path("/v1/chat/completions"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&mock.server)
        .await;
    let (gateway, _) = cloud_gateway(&mock.url());

    let response = gateway
        .stream(simple_chat_request())
        .await
        .unwrap()
        .collect_response()
        .await
        .unwrap();

    assert_eq!(response.content, "Hi");
    assert_eq!(response.finish_reason, FinishReason::Stop);
}

#[tokio::test]
async fn test_stream_ending_without_finish_is_unavailable() {
    let mock = MockOpenAI::new().await;
    mock.mock_chat_stream("gpt-4", &["Half an ", "answer"], None).await;
    let (gateway, _) = cloud_gateway(&mock.url());

    let err = gateway
        .stream(simple_chat_request())
        .await
        .unwrap()
        .collect_response()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "provider_unavailable");
}

#[tokio::test]
async fn test_stream_connection_lost_is_unavailable() {
    let first = openai_sse_body("gpt-4", &["Half an "], None);
    let url = spawn_truncating_server("text/event-stream", first).await;
    let (gateway, _) = cloud_gateway(&format!("{url}/v1"));

    let mut stream = gateway.stream(simple_chat_request()).await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.content, "Half an ");

    let err = stream.next().await.unwrap().unwrap_err();
    assert_eq!(err.kind(), "provider_unavailable");
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_stream_open_error_carries_status() {
    let mock = MockOpenAI::new().await;
    mock.mock_chat_error(503, "server_error", "The server is overloaded")
        .await;
    let (gateway, _) = cloud_gateway(&mock.url());

    let result = match gateway.stream(simple_chat_request()).await {
        Ok(stream) => stream.collect_response().await,
        Err(e) => Err(e),
    };
    let err = result.unwrap_err();

    assert_eq!(err.kind(), "provider_error");
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_stream_rejected_on_first_poll_is_recorded_as_failure() {
    let mock = MockOpenAI::new().await;
    mock.mock_chat_error(401, "invalid_api_key", "Incorrect API key provided")
        .await;
    let (gateway, metrics) = cloud_gateway(&mock.url());

    let err = match gateway.stream(simple_chat_request()).await {
        Ok(stream) => stream.collect_response().await.unwrap_err(),
        Err(e) => e,
    };

    assert_eq!(err.status(), Some(401));
    assert_eq!(metrics.request_count("chat_streaming", "openai", "provider_error"), 1);
    assert_eq!(metrics.request_count("chat_streaming", "openai", OUTCOME_SUCCESS), 0);
}

#[tokio::test]
async fn test_stream_metrics_follow_terminal_item() {
    let mock = MockOpenAI::new().await;
    mock.mock_chat_stream("gpt-4", &["Hello", " world"], Some("stop"))
        .await;
    let (gateway, metrics) = cloud_gateway(&mock.url());

    let response = gateway
        .stream(simple_chat_request())
        .await
        .unwrap()
        .collect_response()
        .await
        .unwrap();
    assert_eq!(response.content, "Hello world");
    assert_eq!(metrics.request_count("chat_streaming", "openai", OUTCOME_SUCCESS), 1);

    let mut stream = gateway.stream(simple_chat_request()).await.unwrap();
    stream.next().await.unwrap().unwrap();
    stream.cancel();
    assert_eq!(metrics.request_count("chat_streaming", "openai", OUTCOME_CANCELLED), 1);
    assert_eq!(metrics.request_count("chat_streaming", "openai", OUTCOME_SUCCESS), 1);
}

#[tokio::test]
async fn test_stream_and_complete_converge() {
    let mock = MockOpenAI::new().await;
    mock.mock_chat_completion("gpt-4", "Rust is a systems language.")
        .await;
    mock.mock_chat_stream(
        "gpt-4",
        &["Rust ", "is a ", "systems language."],
        Some("stop"),
    )
    .await;
    let (gateway, _) = cloud_gateway(&mock.url());

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
}

#[tokio::test]
async fn test_embeddings_batch_keeps_input_order() {
    let mock = MockOpenAI::new().await;
    let vectors = vec![test_vector(1536, 0.0), test_vector(1536, 1.0), test_vector(1536, 2.0)];
    mock.mock_embeddings(&vectors).await;
    let (gateway, _) = cloud_gateway(&mock.url());

    let texts = vec!["zero".to_string(), "one".to_string(), "two".to_string()];
    let result = gateway.embeddings_batch(&texts, "").await.unwrap();

    assert_eq!(result, vectors);
    assert_eq!(mock.request_count().await, 1);
}

#[tokio::test]
async fn test_embeddings_count_mismatch() {
    let mock = MockOpenAI::new().await;
    mock.mock_embeddings(&[test_vector(8, 0.0)]).await;
    let (gateway, _) = cloud_gateway(&mock.url());

    let texts = vec!["a".to_string(), "b".to_string()];
    let err = gateway.embeddings_batch(&texts, "").await.unwrap_err();

    assert_eq!(err.kind(), "provider_error");
}

#[tokio::test]
async fn test_single_embedding() {
    let mock = MockOpenAI::new().await;
    mock.mock_embeddings(&[test_vector(1536, 0.25)]).await;
    let (gateway, _) = cloud_gateway(&mock.url());

    let vector = gateway
        .embeddings(EmbeddingRequest::new("hello"))
        .await
        .unwrap();

    assert_eq!(vector.len(), 1536);
    let body: serde_json::Value = mock.server.received_requests().await.unwrap()[0]
        .body_json()
        .unwrap();
    assert_eq!(body["model"], "text-embedding-ada-002");
    assert_eq!(body["input"], serde_json::json!(["hello"]));
}

#[tokio::test]
async fn test_transcription_upload() {
    let mock = MockOpenAI::new().await;
    mock.mock_transcription("hello from the recording").await;
    let (gateway, metrics) = cloud_gateway(&mock.url());

    let request = TranscriptionRequest::new(vec![7_u8; 2048], 44_100).with_language("en");
    let result = gateway.transcribe(request).await.unwrap();

    assert_eq!(result.text, "hello from the recording");
    assert_eq!(metrics.request_count("transcription", "openai", OUTCOME_SUCCESS), 1);

    let requests = mock.server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains(r#"name="file"; filename="audio.wav""#));
    assert!(body.contains("whisper-1"));
    assert!(body.contains(r#"name="language""#));
}

#[tokio::test]
async fn test_empty_audio_rejected_before_upload() {
    let mock = MockOpenAI::new().await;
    let (gateway, _) = cloud_gateway(&mock.url());

    let err = gateway
        .transcribe(TranscriptionRequest::new(Vec::new(), 16_000))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "unsupported_format");
    assert_eq!(mock.request_count().await, 0);
}

#[tokio::test]
async fn test_configured_sample_rates_apply_to_cloud() {
    let mock = MockOpenAI::new().await;
    mock.mock_transcription("unused").await;
    let config = cloud_config(&mock.url()).with_sample_rates(Some(vec![16_000]));
    let (gateway, _) = gateway_for(&config);

    let err = gateway
        .transcribe(TranscriptionRequest::new(vec![7_u8; 512], 8_000))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "unsupported_format");
    assert!(err.to_string().contains("8000"));
    assert_eq!(mock.request_count().await, 0);
}

#[tokio::test]
async fn test_models_and_health() {
    let mock = MockOpenAI::new().await;
    mock.mock_models(&["gpt-4", "whisper-1"]).await;
    let (gateway, _) = cloud_gateway(&mock.url());

    let models = gateway.list_models().await.unwrap();
    let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["gpt-4", "whisper-1"]);
    assert_eq!(gateway.health().await, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_health_degraded_when_throttled() {
    let mock = MockOpenAI::new().await;
    mock.mock_models_status(429).await;
    let (gateway, _) = cloud_gateway(&mock.url());

    assert_eq!(gateway.health().await, HealthStatus::Degraded);
}
