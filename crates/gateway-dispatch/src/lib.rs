//! # Gateway Dispatch
//!
//! The [`Gateway`] facade: one configured provider behind a uniform
//! `chat_completion` / `embeddings` / `transcribe` interface.
//!
//! ```no_run
//! # async fn run() -> gateway_core::GatewayResult<()> {
//! use gateway_config::ConfigLoader;
//! use gateway_core::{ChatMessage, ChatRequest};
//! use gateway_dispatch::Gateway;
//!
//! let config = ConfigLoader::new().load().await?;
//! let gateway = Gateway::from_config(&config)?;
//!
//! let response = gateway
//!     .complete(ChatRequest::new(vec![ChatMessage::user("Hello")]))
//!     .await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod gateway;

pub use builder::build_provider;
pub use gateway::{ChatOutcome, Gateway, ModelDefaults};
