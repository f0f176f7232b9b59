//! Language understanding for the desky support chatbot.
//!
//! This crate is the only part of the system that talks to an LLM:
//! - `LlmClient` - pluggable trait for single-shot text completions
//! - `GeminiClient` - HTTP client for the Gemini `generateContent` API
//! - `IntentClassifier` - maps a free-form customer message onto the fixed
//!   intent set the conversation core routes on
//!
//! # Safety Principle
//!
//! The LLM is strictly a labeler. It never writes customer-facing text and it
//! never decides order, policy, or handoff outcomes. Those are deterministic
//! decisions made by the conversation core.

pub mod classifier;
pub mod gemini;
pub mod llm;

pub use classifier::IntentClassifier;
pub use gemini::GeminiClient;
pub use llm::{CompletionRequest, LlmClient, LlmError};
