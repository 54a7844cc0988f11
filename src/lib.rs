use std::path::PathBuf;

use thiserror::Error;

use crate::embeddings::EmbeddingError;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid chunking parameters: {0}")]
    InvalidChunking(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Could not decode {} as UTF-8 or Latin-1 text", path.display())]
    Encoding { path: PathBuf },

    #[error("Index not found at {}. Run indexing first", .0.display())]
    IndexNotFound(PathBuf),

    #[error("Index is empty or corrupted: {0}")]
    IndexCorrupted(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub mod chunking;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod indexer;
pub mod retriever;
pub mod store;
