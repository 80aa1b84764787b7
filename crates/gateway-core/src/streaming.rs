//! Streaming chat completions.
//!
//! Providers hand back a raw [`ChunkStream`]. The gateway wraps it in a
//! [`ChatStream`], which enforces the termination rules callers rely on:
//!
//! - the stream ends with exactly one terminal item, either a fragment with a
//!   `finish_reason` or an error;
//! - the inner transport stream is dropped at that terminal item, so the
//!   connection is released even if the caller keeps the `ChatStream` around;
//! - a transport that ends without a final fragment surfaces as
//!   `ProviderUnavailable`.
//!
//! Dropping a `ChatStream` early drops the inner stream and with it the
//! underlying connection.
//!
//! A hook registered with [`ChatStream::on_end`] runs exactly once with the
//! way the stream ended, which is where the gateway logs and records it.

use crate::error::{GatewayError, GatewayResult};
use crate::response::{ChatResponse, FinishReason, Usage};
use futures::stream::{BoxStream, FusedStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Raw fragment stream produced by a provider.
pub type ChunkStream = BoxStream<'static, GatewayResult<ChatChunk>>;

/// One incremental fragment of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Content delta
    pub content: String,
    /// Populated only on the final fragment
    pub finish_reason: Option<FinishReason>,
    /// Token usage, when the provider reports it on the final fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatChunk {
    /// An intermediate fragment
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: None,
            usage: None,
        }
    }

    /// The final fragment
    pub fn finished(content: impl Into<String>, reason: FinishReason) -> Self {
        Self {
            content: content.into(),
            finish_reason: Some(reason),
            usage: None,
        }
    }

    /// Attach usage information
    #[must_use]
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Whether this fragment terminates the stream
    pub fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// How a [`ChatStream`] ended.
#[derive(Debug, Clone, Copy)]
pub enum StreamEnd<'a> {
    /// The final fragment arrived
    Completed(Option<Usage>),
    /// The terminal item was this error
    Failed(&'a GatewayError),
    /// Cancelled or dropped before a terminal item
    Abandoned,
}

type EndHook = Box<dyn FnOnce(StreamEnd<'_>) + Send>;

/// A lazy, finite, non-restartable stream of chat fragments.
pub struct ChatStream {
    inner: Option<ChunkStream>,
    on_end: Option<EndHook>,
    provider: String,
    model: String,
    buffer: String,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
    chunk_count: usize,
}

impl ChatStream {
    /// Wrap a provider's fragment stream
    pub fn new(provider: impl Into<String>, model: impl Into<String>, inner: ChunkStream) -> Self {
        Self {
            inner: Some(inner),
            on_end: None,
            provider: provider.into(),
            model: model.into(),
            buffer: String::new(),
            finish_reason: None,
            usage: None,
            chunk_count: 0,
        }
    }

    /// Run `hook` once when the stream ends, however it ends
    #[must_use]
    pub fn on_end(mut self, hook: impl FnOnce(StreamEnd<'_>) + Send + 'static) -> Self {
        self.on_end = Some(Box::new(hook));
        self
    }

    /// Model the stream was requested for
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Provider serving the stream
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Content received so far
    pub fn content(&self) -> &str {
        &self.buffer
    }

    /// Finish reason, once the final fragment has been received
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    /// Number of fragments yielded so far
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Whether the stream has reached a terminal item (or was cancelled)
    pub fn is_done(&self) -> bool {
        self.inner.is_none()
    }

    /// Stop consuming and release the underlying connection now.
    pub fn cancel(&mut self) {
        if self.inner.take().is_some() {
            tracing::debug!(
                provider = %self.provider,
                model = %self.model,
                chunks = self.chunk_count,
                "Chat stream cancelled by caller"
            );
            self.fire(StreamEnd::Abandoned);
        }
    }

    /// Drain the stream into a single response.
    pub async fn collect_response(mut self) -> GatewayResult<ChatResponse> {
        while let Some(item) = self.next().await {
            item?;
        }

        let finish_reason = self.finish_reason.ok_or_else(|| {
            GatewayError::unavailable(&self.provider, "stream cancelled before completion")
        })?;

        Ok(ChatResponse {
            content: std::mem::take(&mut self.buffer),
            model: std::mem::take(&mut self.model),
            finish_reason,
            usage: self.usage,
        })
    }

    fn terminate(&mut self, item: GatewayResult<ChatChunk>) -> Poll<Option<GatewayResult<ChatChunk>>> {
        self.inner = None;
        match &item {
            Ok(_) => self.fire(StreamEnd::Completed(self.usage)),
            Err(e) => self.fire(StreamEnd::Failed(e)),
        }
        Poll::Ready(Some(item))
    }

    fn fire(&mut self, end: StreamEnd<'_>) {
        if let Some(hook) = self.on_end.take() {
            hook(end);
        }
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        if self.inner.is_some() {
            self.fire(StreamEnd::Abandoned);
        }
    }
}

impl Stream for ChatStream {
    type Item = GatewayResult<ChatChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(None) => {
                let err = GatewayError::unavailable(
                    &this.provider,
                    "stream ended before a final fragment",
                );
                this.terminate(Err(err))
            }
            Poll::Ready(Some(Err(e))) => this.terminate(Err(e)),
            Poll::Ready(Some(Ok(chunk))) => {
                this.buffer.push_str(&chunk.content);
                this.chunk_count += 1;

                match chunk.finish_reason {
                    None => Poll::Ready(Some(Ok(chunk))),
                    Some(FinishReason::Error) => {
                        let err = GatewayError::provider(
                            &this.provider,
                            None,
                            "backend reported an error mid-stream",
                        );
                        this.terminate(Err(err))
                    }
                    Some(FinishReason::Stop) if this.buffer.is_empty() => {
                        let err = GatewayError::provider(
                            &this.provider,
                            None,
                            "backend finished without producing content",
                        );
                        this.terminate(Err(err))
                    }
                    Some(reason) => {
                        this.finish_reason = Some(reason);
                        this.usage = chunk.usage;
                        this.terminate(Ok(chunk))
                    }
                }
            }
        }
    }
}

impl FusedStream for ChatStream {
    fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }
}

impl fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatStream")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("chunk_count", &self.chunk_count)
            .field("finish_reason", &self.finish_reason)
            .field("done", &self.is_done())
            .finish_non_exhaustive()
    }
}
