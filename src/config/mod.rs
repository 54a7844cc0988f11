// Configuration management module
// Handles the TOML settings file for the embedding backend, indexing and retrieval

pub mod settings;

pub use settings::{
    CONFIG_FILE_NAME, Config, ConfigError, EmbeddingConfig, IndexingConfig, RetrievalConfig,
};
