//! Dense text embeddings for the embedding-based vectorizer methods.
//!
//! Provides the [`EmbeddingProvider`] trait and a local ONNX implementation of
//! all-MiniLM-L6-v2 (384 dimensions, L2-normalized), created via [`create_provider`].

pub mod local;

use anyhow::Result;

/// Number of dimensions produced by all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Trait for embedding text into dense vectors.
///
/// Implementations must be deterministic for identical input. All methods are
/// synchronous; callers in async contexts should use `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create an embedding provider from config.
///
/// Only `"local"` is supported (ONNX Runtime + all-MiniLM-L6-v2). Fails if the model
/// files are missing; run `mnemos model download` first.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = local::OnnxEmbedder::new(config)?;
            Ok(Box::new(provider))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}
