//! Generative-language provider abstraction.
//!
//! The chat pipeline only needs three provider operations: list the models the
//! credential can see, instantiate one by name, and generate text from a
//! prompt. `GeminiTextProvider` talks to the real API; `MockTextProvider` is a
//! scriptable double for tests.

pub mod gemini;
pub mod mock;

use crate::models::{ModelCandidate, ModelHandle, Prompt};
use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Model {0} returned no text")]
    EmptyResponse(String),

    #[error("Model {0} does not support content generation")]
    UnsupportedModel(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Trait for text generation providers (e.g., Gemini).
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Whether a credential is present. Checked before any network call.
    fn is_configured(&self) -> bool;

    /// Every model the credential has access to.
    async fn list_models(&self) -> Result<Vec<ModelCandidate>, ProviderError>;

    /// Instantiate a model by name, failing if it is unknown or cannot generate.
    async fn load_model(&self, name: &str) -> Result<ModelHandle, ProviderError>;

    /// Generate text for `prompt`. Returns the raw, untrimmed text.
    async fn generate(&self, model: &ModelHandle, prompt: &Prompt)
        -> Result<String, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
