//! Local speech-to-text through a worker subprocess.
//!
//! The worker protocol is deliberately small:
//!
//! - the raw audio payload is written to the worker's stdin, then stdin is closed;
//! - `--sample-rate N` and, when requested, `--language L` are appended to the
//!   configured arguments;
//! - the worker prints `{"text": "..."}` on stdout and exits with status 0.
//!
//! One process is spawned per request. The process is killed if the request
//! times out or the calling future is dropped.

use gateway_core::{GatewayError, GatewayResult, TranscriptionRequest, TranscriptionResult};
use serde::Deserialize;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Worker lifetime bound used when none is configured
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest stderr excerpt carried into an error message
const STDERR_EXCERPT_LEN: usize = 512;

/// Transcription worker invoked once per request.
#[derive(Debug, Clone)]
pub struct WhisperWorker {
    provider: String,
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct WorkerOutput {
    text: String,
}

impl WhisperWorker {
    /// Create a worker definition
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            provider: "whisper".to_string(),
            command: command.into(),
            args,
            timeout: DEFAULT_WORKER_TIMEOUT,
        }
    }

    /// Bound the total lifetime of each worker process
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Report errors under the given provider id
    #[must_use]
    pub fn with_provider_id(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Executable this worker runs
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Full argument list for a request
    fn arguments(&self, request: &TranscriptionRequest) -> Vec<String> {
        let mut args = self.args.clone();
        args.push("--sample-rate".to_string());
        args.push(request.sample_rate.to_string());
        if let Some(language) = &request.language {
            args.push("--language".to_string());
            args.push(language.clone());
        }
        args
    }

    /// Run the worker on one audio payload
    pub async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> GatewayResult<TranscriptionResult> {
        let started = Instant::now();
        let args = self.arguments(request);

        debug!(
            provider = %self.provider,
            command = %self.command,
            args = ?args,
            audio_bytes = request.audio.len(),
            "Spawning transcription worker"
        );

        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                GatewayError::unavailable(
                    &self.provider,
                    format!("Failed to start transcription worker '{}': {e}", self.command),
                )
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            GatewayError::unavailable(&self.provider, "Transcription worker stdin unavailable")
        })?;
        let audio = request.audio.clone();

        let feed = async move {
            let written = stdin.write_all(&audio).await;
            drop(stdin);
            match written {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            }
        };

        // Feed stdin while draining stdout so neither pipe can fill up.
        let run = async { tokio::join!(feed, child.wait_with_output()) };

        let (fed, output) = tokio::time::timeout(self.timeout, run).await.map_err(|_| {
            warn!(
                provider = %self.provider,
                command = %self.command,
                timeout_secs = self.timeout.as_secs_f64(),
                "Transcription worker timed out, killing it"
            );
            GatewayError::timeout(&self.provider, self.timeout)
        })?;

        let output = output.map_err(|e| {
            GatewayError::provider(
                &self.provider,
                None,
                format!("Failed to collect transcription worker output: {e}"),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT_LEN).collect();
            warn!(
                provider = %self.provider,
                status = %output.status,
                stderr = %excerpt,
                "Transcription worker failed"
            );
            return Err(GatewayError::provider(
                &self.provider,
                None,
                format!("Transcription worker exited with {}: {excerpt}", output.status),
            ));
        }

        fed.map_err(|e| {
            GatewayError::provider(
                &self.provider,
                None,
                format!("Failed to send audio to transcription worker: {e}"),
            )
        })?;

        let parsed: WorkerOutput = serde_json::from_slice(&output.stdout).map_err(|e| {
            GatewayError::provider(
                &self.provider,
                None,
                format!("Malformed transcription worker output: {e}"),
            )
        })?;

        debug!(
            provider = %self.provider,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            chars = parsed.text.len(),
            "Transcription worker finished"
        );

        Ok(TranscriptionResult { text: parsed.text })
    }
}
