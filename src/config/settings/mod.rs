
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::chunking::ChunkingConfig;
use crate::embeddings::RetryPolicy;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Connection settings for the embedding backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub endpoint: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    /// Base unit of the exponential backoff between retries
    pub backoff_millis: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            endpoint: "/api/embeddings".to_string(),
            model: "nomic-embed-text".to_string(),
            timeout_seconds: 30,
            retry_attempts: 3,
            backoff_millis: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexingConfig {
    pub docs_dir: PathBuf,
    pub index_path: PathBuf,
    /// Window width in characters
    pub chunk_size: usize,
    /// Characters shared by adjacent windows
    pub overlap: usize,
    /// File extensions picked up by the directory scan, without the leading dot
    pub extensions: Vec<String>,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("docs"),
            index_path: PathBuf::from("data").join("embeddings.json"),
            chunk_size: 500,
            overlap: 50,
            extensions: vec!["txt".to_string(), "md".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid endpoint: {0} (must start with '/')")]
    InvalidEndpoint(String),
    #[error("Invalid request timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid chunk size: {0} (must be between 1 and 100000)")]
    InvalidChunkSize(usize),
    #[error("Overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("At least one file extension must be configured for indexing")]
    NoExtensions,
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
}

impl Config {
    /// Load `config.toml` from `config_dir`, falling back to defaults when it does not exist
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the directory relative paths in the configuration resolve against
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.indexing.validate()?;

        if !(1..=100).contains(&self.retrieval.top_k) {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// Root of the knowledge base documents
    #[inline]
    pub fn docs_dir(&self) -> PathBuf {
        self.get_base_dir().join(&self.indexing.docs_dir)
    }

    /// Location of the persisted index snapshot
    #[inline]
    pub fn index_path(&self) -> PathBuf {
        self.get_base_dir().join(&self.indexing.index_path)
    }

    #[inline]
    pub fn chunking_config(&self) -> crate::Result<ChunkingConfig> {
        ChunkingConfig::new(self.indexing.chunk_size, self.indexing.overlap)
    }

    #[inline]
    pub fn embedding_url(&self) -> Result<Url, ConfigError> {
        self.embedding.endpoint_url()
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if !self.endpoint.starts_with('/') {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }

        self.endpoint_url()?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    /// Full URL of the embedding endpoint, e.g. `http://localhost:11434/api/embeddings`
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        let base = Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str.clone()))?;
        base.join(&self.endpoint)
            .map_err(|_| ConfigError::InvalidUrl(format!("{}{}", url_str, self.endpoint)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.backoff_millis),
        )
    }
}

impl IndexingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100_000).contains(&self.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        if self.overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(self.overlap, self.chunk_size));
        }

        if self.extensions.iter().all(|ext| ext.trim().is_empty()) {
            return Err(ConfigError::NoExtensions);
        }

        Ok(())
    }
}
