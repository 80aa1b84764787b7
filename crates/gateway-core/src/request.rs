//! Request types for the gateway.
//!
//! These are the provider-agnostic shapes callers hand to the gateway. Each
//! provider adapter translates them into its own wire format.

use crate::error::{GatewayError, GatewayResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sampling temperature used when the caller does not specify one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Sample rate most speech models expect.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions
    System,
    /// End user
    User,
    /// Model output
    Assistant,
}

impl MessageRole {
    /// Wire name of the role
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message
    pub role: MessageRole,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a message with an explicit role
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// Chat completion request.
///
/// Messages are kept in chronological order. An empty `model` means "use the
/// configured default"; any other value is forwarded to the provider untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation so far, oldest first
    pub messages: Vec<ChatMessage>,

    /// Target model identifier
    #[serde(default)]
    pub model: String,

    /// Sampling temperature; bounds are the provider's to enforce
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate; `None` defers to the provider default
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Return a stream of fragments instead of a single response
    #[serde(default)]
    pub stream: bool,
}

impl ChatRequest {
    /// Create a request for the given conversation using default settings
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            stream: false,
        }
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set max_tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Enable or disable streaming
    #[must_use]
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Prepend a system prompt unless the conversation already opens with one.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let starts_with_system = self
            .messages
            .first()
            .is_some_and(|m| m.role == MessageRole::System);
        if !starts_with_system {
            self.messages.insert(0, ChatMessage::system(prompt));
        }
        self
    }

    /// Validate the parts of the request the gateway is responsible for.
    ///
    /// Model names and temperature bounds are left to the provider.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.messages.is_empty() {
            return Err(GatewayError::validation(
                "messages cannot be empty",
                Some("messages"),
            ));
        }

        if self.max_tokens == Some(0) {
            return Err(GatewayError::validation(
                "max_tokens must be a positive integer",
                Some("max_tokens"),
            ));
        }

        Ok(())
    }
}

/// Embedding request for a single text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Text to embed
    pub text: String,
    /// Embedding model; empty means the configured default
    #[serde(default)]
    pub model: String,
}

impl EmbeddingRequest {
    /// Create a request that uses the default embedding model
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: String::new(),
        }
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Raw prompt completion request, without chat roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Prompt text
    pub prompt: String,

    /// Target model identifier; empty means the configured chat default
    #[serde(default)]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate; `None` defers to the provider default
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Return a stream of fragments instead of a single response
    #[serde(default)]
    pub stream: bool,
}

impl CompletionRequest {
    /// Create a request for `prompt` using default settings
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            stream: false,
        }
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set max_tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Enable or disable streaming
    #[must_use]
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Same rules as chat: a prompt is required and `max_tokens` must be positive.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.prompt.trim().is_empty() {
            return Err(GatewayError::validation("prompt cannot be empty", Some("prompt")));
        }

        if self.max_tokens == Some(0) {
            return Err(GatewayError::validation(
                "max_tokens must be a positive integer",
                Some("max_tokens"),
            ));
        }

        Ok(())
    }
}

/// Speech-to-text request.
///
/// The gateway never resamples or transcodes `audio`; the caller must supply
/// it at a rate the active provider accepts.
#[derive(Clone, PartialEq, Eq)]
pub struct TranscriptionRequest {
    /// Raw audio payload
    pub audio: Bytes,
    /// Sample rate of `audio` in Hz
    pub sample_rate: u32,
    /// Optional language code (e.g. "en")
    pub language: Option<String>,
}

impl TranscriptionRequest {
    /// Create a request with no language hint
    pub fn new(audio: impl Into<Bytes>, sample_rate: u32) -> Self {
        Self {
            audio: audio.into(),
            sample_rate,
            language: None,
        }
    }

    /// Set the language hint
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

impl fmt::Debug for TranscriptionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptionRequest")
            .field("audio_bytes", &self.audio.len())
            .field("sample_rate", &self.sample_rate)
            .field("language", &self.language)
            .finish()
    }
}
