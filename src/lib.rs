//! Retrieval-augmented chat webhook service
//!
//! Forwards chat messages to a hosted LLM, augments prompts through a
//! similarity-search tool over a vector index, persists conversation turns
//! to Postgres, and returns the generated reply. Every subject-area
//! deployment is served by one parameterized handler.
//!
//! PIPELINE:
//! REQUEST → VALIDATE → HISTORY → COMPOSE → GENERATE → PERSIST → RESPOND

pub mod compose;
pub mod config;
pub mod error;
pub mod gemini;
pub mod memory;
pub mod models;
pub mod retrieval;
pub mod store;
pub mod tools;
pub mod webhook;

pub use error::Result;

// Re-export common types
pub use config::{AppConfig, HistoryMode, VariantProfile};
pub use models::{ChatTurnMessage, MessageRole};
