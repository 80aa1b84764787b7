//! # Gateway Providers
//!
//! Backend adapters for the AI provider gateway:
//! - Ollama (`local`): chat, streaming, embeddings, and transcription through a
//!   worker subprocess when one is configured
//! - OpenAI and compatible servers (`cloud`): chat, streaming, embeddings,
//!   transcription

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod http;

pub mod ollama;
pub mod openai;
pub mod worker;

pub use ollama::{OllamaConfig, OllamaProvider};
pub use openai::{OpenAIConfig, OpenAIProvider};
pub use worker::WhisperWorker;
