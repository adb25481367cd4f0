//! Text-to-vector conversion through a remote embedding service.

use std::sync::Arc;

use crate::error::EmbeddingError;

pub mod openai;

pub use openai::OpenAiEmbedder;

/// Dimensionality produced by `text-embedding-3-small`.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Produces one embedding vector per input text.
///
/// Implementations must report failures instead of returning empty vectors;
/// callers decide whether a failure drops a chunk or empties a context.
pub trait Embedder: Send + Sync {
    /// Embeds a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text)
    }
}

impl<T: Embedder + ?Sized> Embedder for &T {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text)
    }
}
