//! # Generation Provider
//!
//! The external language-generation collaborator behind a narrow trait:
//! classify, generate, chat. The OpenAI-backed implementation is the one the
//! system ships with; tests substitute [`llm::MockGenerationProvider`].

pub mod llm;
pub mod openai_chat;
pub mod types;

pub use llm::{strip_code_fences, GenerationProvider, MockGenerationProvider};
pub use openai_chat::OpenAIChatProvider;
pub use types::{ProviderError, ProviderResult, ProviderSecret};
