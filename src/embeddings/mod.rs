// Embeddings module
// Talks to the external embedding backend, one text per request

pub mod ollama;
pub mod retry;

use thiserror::Error;

pub use ollama::{EmbeddingClient, SENTINEL_TEXT};
pub use retry::RetryPolicy;

/// Failures raised while producing an embedding
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Connection refused, timeout or a non-200 status. Eligible for retry.
    #[error("Embedding backend unreachable: {0}")]
    Connectivity(String),

    /// The backend answered, but not with the expected payload. Never retried.
    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("Embedding dimension changed: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding request failed: {0}")]
    Request(String),
}

impl EmbeddingError {
    #[inline]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

/// Anything that can turn text into a vector
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed every text in order. The backend has no batch endpoint, so this is sequential.
    #[inline]
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.embed_many_with_progress(texts, &mut |_, _| {})
    }

    /// Like [`Embedder::embed_many`], calling `progress(done, total)` after each text
    #[inline]
    fn embed_many_with_progress(
        &self,
        texts: &[String],
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            embeddings.push(self.embed(text)?);
            progress(i + 1, texts.len());
        }
        Ok(embeddings)
    }
}

impl<E: Embedder + ?Sized> Embedder for &E {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text)
    }
}
