//! # Gateway Core
//!
//! Core types, traits, and error handling for the AI provider gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Chat, completion, embedding and transcription request/response types
//! - The [`AiProvider`] trait and capability declarations
//! - The error taxonomy
//! - [`ChatStream`], the streaming completion wrapper

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod provider;
pub mod request;
pub mod response;
pub mod streaming;

// Re-export commonly used types
pub use error::{GatewayError, GatewayResult};
pub use provider::{AiProvider, Capability, HealthStatus, ProviderCapabilities, ProviderKind};
pub use request::{
    ChatMessage, ChatRequest, CompletionRequest, EmbeddingRequest, MessageRole, TranscriptionRequest,
    DEFAULT_SAMPLE_RATE, DEFAULT_TEMPERATURE,
};
pub use response::{
    ChatResponse, EmbeddingVector, FinishReason, ModelInfo, PullResult, TranscriptionResult, Usage,
};
pub use streaming::{ChatChunk, ChatStream, ChunkStream, StreamEnd};
