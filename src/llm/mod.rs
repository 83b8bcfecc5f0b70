//! Language model backends
//!
//! Both backends take one raw prompt string; no chat template or role
//! structure is applied server-side, so the caller owns the prompt format.

pub mod ollama;
pub mod openai;

use async_trait::async_trait;

pub use ollama::OllamaModel;
pub use openai::OpenAiCompletions;

/// Default generation budget per reply
pub const DEFAULT_MAX_TOKENS: u32 = 256;

/// A loaded text-generation model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a continuation of `prompt`
    ///
    /// # Errors
    ///
    /// Returns error if the backend request fails
    async fn generate(&self, prompt: &str, max_tokens: u32) -> crate::Result<String>;

    /// Model identifier, for logging
    fn model(&self) -> &str;
}
