//! Test fixtures and sample wire payloads for integration tests

use gateway_core::{ChatMessage, ChatRequest};
use serde_json::{json, Value};

/// Create a simple chat request that relies on the default model
pub fn simple_chat_request() -> ChatRequest {
    ChatRequest::new(vec![ChatMessage::user("Hello, how are you?")])
}

/// Create a chat request naming an explicit model
pub fn chat_request_for(model: &str) -> ChatRequest {
    simple_chat_request().with_model(model)
}

/// Create a multi-turn conversation request
pub fn multi_turn_chat_request() -> ChatRequest {
    ChatRequest::new(vec![
        ChatMessage::user("What is 2 + 2?"),
        ChatMessage::assistant("4"),
        ChatMessage::user("And times 3?"),
    ])
    .with_system_prompt("You are a calculator.")
}

// ============================================================================
// Ollama payloads
// ============================================================================

/// Non-streaming `/api/chat` response
pub fn ollama_chat_response(model: &str, content: &str) -> Value {
    json!({
        "model": model,
        "created_at": "2024-05-01T12:00:00Z",
        "message": {"role": "assistant", "content": content},
        "done": true,
        "done_reason": "stop",
        "prompt_eval_count": 12,
        "eval_count": 7
    })
}

/// Streaming `/api/chat` body: one NDJSON line per part, then a final line
/// when `done_reason` is given
pub fn ollama_stream_body(model: &str, parts: &[&str], done_reason: Option<&str>) -> String {
    let mut body = String::new();
    for part in parts {
        body.push_str(
            &json!({
                "model": model,
                "message": {"role": "assistant", "content": part},
                "done": false
            })
            .to_string(),
        );
        body.push('\n');
    }
    if let Some(reason) = done_reason {
        body.push_str(
            &json!({
                "model": model,
                "message": {"role": "assistant", "content": ""},
                "done": true,
                "done_reason": reason,
                "prompt_eval_count": 12,
                "eval_count": parts.len()
            })
            .to_string(),
        );
        body.push('\n');
    }
    body
}

/// Non-streaming `/api/generate` response
pub fn ollama_generate_response(model: &str, text: &str) -> Value {
    json!({
        "model": model,
        "created_at": "2024-05-01T12:00:00Z",
        "response": text,
        "done": true,
        "done_reason": "stop",
        "prompt_eval_count": 4,
        "eval_count": 9
    })
}

/// Streaming `/api/generate` body: one NDJSON line per part, then a final line
pub fn ollama_generate_stream_body(model: &str, parts: &[&str]) -> String {
    let mut body = String::new();
    for part in parts {
        body.push_str(&json!({"model": model, "response": part, "done": false}).to_string());
        body.push('\n');
    }
    body.push_str(
        &json!({
            "model": model,
            "response": "",
            "done": true,
            "done_reason": "length",
            "eval_count": parts.len()
        })
        .to_string(),
    );
    body.push('\n');
    body
}

/// `/api/embeddings` response
pub fn ollama_embedding_response(vector: &[f32]) -> Value {
    json!({ "embedding": vector })
}

/// `/api/tags` response
pub fn ollama_tags_response(models: &[(&str, u64)]) -> Value {
    let models: Vec<Value> = models
        .iter()
        .map(|(name, size)| {
            json!({
                "name": name,
                "size": size,
                "modified_at": "2024-05-01T12:00:00Z",
                "digest": "sha256:0000"
            })
        })
        .collect();
    json!({ "models": models })
}

// ============================================================================
// OpenAI payloads
// ============================================================================

/// `/chat/completions` response
pub fn openai_chat_response(model: &str, content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
    })
}

/// Server-sent events body for a streamed completion.
///
/// With `finish_reason` set the body ends with a finishing event and
/// `[DONE]`; without it the body simply stops after the deltas.
pub fn openai_sse_body(model: &str, parts: &[&str], finish_reason: Option<&str>) -> String {
    let mut body = String::new();
    for part in parts {
        let event = json!({
            "id": "chatcmpl-test",
            "object": "chat.completion.chunk",
            "model": model,
            "choices": [{"index": 0, "delta": {"content": part}, "finish_reason": null}]
        });
        body.push_str(&format!("data: {event}\n\n"));
    }
    if let Some(reason) = finish_reason {
        let event = json!({
            "id": "chatcmpl-test",
            "object": "chat.completion.chunk",
            "model": model,
            "choices": [{"index": 0, "delta": {}, "finish_reason": reason}]
        });
        body.push_str(&format!("data: {event}\n\n"));
        body.push_str("data: [DONE]\n\n");
    }
    body
}

/// `/embeddings` response; `data` is emitted in reverse index order
pub fn openai_embedding_response(vectors: &[Vec<f32>]) -> Value {
    let data: Vec<Value> = vectors
        .iter()
        .enumerate()
        .rev()
        .map(|(index, embedding)| {
            json!({"object": "embedding", "index": index, "embedding": embedding})
        })
        .collect();
    json!({
        "object": "list",
        "data": data,
        "model": "text-embedding-ada-002",
        "usage": {"prompt_tokens": 8, "total_tokens": 8}
    })
}

/// OpenAI error body
pub fn openai_error_response(error_type: &str, message: &str) -> Value {
    json!({
        "error": {
            "message": message,
            "type": error_type,
            "param": null,
            "code": error_type
        }
    })
}

/// A fixed-dimension test vector
pub fn test_vector(dimensions: usize, seed: f32) -> Vec<f32> {
    (0..dimensions).map(|i| seed + i as f32 / 100.0).collect()
}
