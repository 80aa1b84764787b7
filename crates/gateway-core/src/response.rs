//! Response types returned by the gateway.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// Natural end of the completion
    Stop,
    /// Hit the token limit
    Length,
    /// The backend reported a failure in-band
    Error,
}

impl FinishReason {
    /// Map a backend's finish reason string onto the gateway's enum.
    ///
    /// Unknown reasons from a backend that otherwise completed normally are
    /// treated as `Stop`.
    pub fn from_provider(reason: &str) -> Self {
        match reason {
            "length" | "max_tokens" => Self::Length,
            "error" => Self::Error,
            _ => Self::Stop,
        }
    }

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token accounting, when the provider reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,
    /// Tokens generated
    pub completion_tokens: u32,
    /// Sum of both
    pub total_tokens: u32,
}

impl Usage {
    /// Build usage from prompt and completion counts
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// A complete, non-streaming chat response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated text
    pub content: String,
    /// Model that produced it
    pub model: String,
    /// Why generation stopped
    pub finish_reason: FinishReason,
    /// Token usage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Create a response without usage information
    pub fn new(
        content: impl Into<String>,
        model: impl Into<String>,
        finish_reason: FinishReason,
    ) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            finish_reason,
            usage: None,
        }
    }

    /// Attach usage information
    #[must_use]
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// An embedding vector. Its length is fixed per model.
pub type EmbeddingVector = Vec<f32>;

/// Result of a transcription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Transcribed text
    pub text: String,
}

/// Outcome of asking the provider to download a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResult {
    /// Model that was pulled
    pub model: String,
    /// Final status reported by the provider
    pub status: String,
}

/// A model the provider reports as available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier as accepted in requests
    pub id: String,
    /// On-disk size, for local models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Last modification timestamp as reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

impl ModelInfo {
    /// Create model info with only an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            size_bytes: None,
            modified_at: None,
        }
    }
}
