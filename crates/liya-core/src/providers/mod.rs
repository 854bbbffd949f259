//! ============================================================================
//! Providers - External embedding and text generation services
//! ============================================================================
//! The core only needs two capabilities from the outside world:
//! - turn text into a fixed-length vector
//! - complete a prompt into text
//!
//! Failures come back as `ProviderError` and are never retried here; the
//! caller decides how to degrade.
//! ============================================================================

mod ollama;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

use crate::error::ProviderError;

pub use ollama::OllamaClient;

/// Produces embeddings for text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text. An empty vector is reported as
    /// `ProviderError::EmptyResponse`, never returned as `Ok`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Produces free-form text completions
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}
