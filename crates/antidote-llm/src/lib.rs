//! Antidote LLM collaborators
//!
//! An OpenAI-compatible chat completions client that proposes hypotheses
//! and judges validation samples for the search session.

pub mod client;
pub mod config;
pub mod parse;
pub mod prompts;

pub use client::{LlmError, OpenAiClient};
pub use config::LlmConfig;
