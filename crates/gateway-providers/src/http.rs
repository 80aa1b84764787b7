//! HTTP plumbing shared by the HTTP-backed providers.
//!
//! Every transport failure goes through here so that both backends map
//! errors the same way:
//!
//! - request timed out → `Timeout`
//! - connection or request failure, including a body cut off mid-read → `ProviderUnavailable`
//! - non-2xx status → `ProviderError` with the status and the backend's message
//! - malformed payload → `ProviderError` without a status

use gateway_core::{GatewayError, GatewayResult};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound for health probes, independent of the request timeout
pub(crate) const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the shared client.
///
/// Only the connect phase is bounded here. Whole-request timeouts are set per
/// request so that streamed bodies are bounded per fragment instead.
pub(crate) fn build_client(provider: &str, timeout: Duration) -> GatewayResult<Client> {
    Client::builder()
        .connect_timeout(timeout)
        .pool_max_idle_per_host(16)
        .build()
        .map_err(|e| {
            GatewayError::configuration(format!(
                "Failed to create HTTP client for provider '{provider}': {e}"
            ))
        })
}

/// Join a base URL and an absolute path
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Map a reqwest failure onto the gateway taxonomy
pub(crate) fn map_request_error(
    provider: &str,
    timeout: Duration,
    err: &reqwest::Error,
) -> GatewayError {
    if err.is_timeout() {
        warn!(provider = %provider, timeout_secs = timeout.as_secs_f64(), "Provider request timed out");
        GatewayError::timeout(provider, timeout)
    } else if err.is_body() || err.is_decode() {
        // JSON is parsed with serde_json after the body is read, so reqwest
        // only reports these kinds when the body itself could not be read.
        warn!(provider = %provider, error = %err, "Connection lost while reading response body");
        GatewayError::unavailable(
            provider,
            format!("Connection lost while reading response: {}", root_cause(err)),
        )
    } else {
        warn!(provider = %provider, error = %err, "Provider unreachable");
        GatewayError::unavailable(provider, format!("Request failed: {err}"))
    }
}

fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

/// Pass a successful response through, or turn an error status into a
/// `ProviderError` carrying the backend's message.
pub(crate) async fn check_status(
    provider: &str,
    timeout: Duration,
    response: Response,
) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .map_err(|e| map_request_error(provider, timeout, &e))?;

    debug!(provider = %provider, status = %status, body = %body, "Provider returned error status");

    Err(GatewayError::provider(
        provider,
        Some(status.as_u16()),
        error_message(&body, status.as_u16()),
    ))
}

/// Read and decode a JSON body
pub(crate) async fn decode_json<T: DeserializeOwned>(
    provider: &str,
    timeout: Duration,
    response: Response,
) -> GatewayResult<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| map_request_error(provider, timeout, &e))?;

    serde_json::from_slice(&bytes).map_err(|e| {
        GatewayError::provider(provider, None, format!("Failed to parse response: {e}"))
    })
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed { message: String },
    Plain(String),
}

/// Extract the human-readable message from an error body.
///
/// Understands `{"error": {"message": ".."}}` and `{"error": ".."}`; anything
/// else is returned as-is.
pub(crate) fn error_message(body: &str, status: u16) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error: ErrorBody::Detailed { message } | ErrorBody::Plain(message),
        }) => message,
        Err(_) if body.trim().is_empty() => format!("HTTP {status}"),
        Err(_) => body.trim().to_string(),
    }
}
