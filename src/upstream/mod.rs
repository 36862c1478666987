//! External-service collaborators.

pub mod llm;

pub use llm::{ChatMessage, CompletionRequest, LlmClient, LlmError};
