//! CLI command implementations.

pub mod chat;
pub mod config;
pub mod embed;
pub mod generate;
pub mod health;
pub mod models;
pub mod transcribe;
