use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use crate::chunking::{ChunkingConfig, DocumentChunk};
use crate::{RagError, Result};

/// A chunk together with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(flatten)]
    pub chunk: DocumentChunk,
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    #[inline]
    pub fn new(chunk: DocumentChunk, embedding: Vec<f32>) -> Self {
        Self { chunk, embedding }
    }
}

/// The persisted snapshot: metadata plus every entry in insertion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// Written as RFC 3339. Also accepts an ISO-8601 date-time without offset, read as UTC
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub indexed_at: DateTime<Utc>,
    pub config: ChunkingConfig,
    pub chunks: Vec<IndexEntry>,
}

/// Summary of a loaded index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total_chunks: usize,
    pub indexed_at: DateTime<Utc>,
    /// Distinct source files, sorted
    pub source_files: Vec<PathBuf>,
    pub config: ChunkingConfig,
}

impl Index {
    /// Stamp a new index with the current time
    #[inline]
    pub fn new(config: ChunkingConfig, chunks: Vec<IndexEntry>) -> Self {
        Self {
            indexed_at: Utc::now(),
            config,
            chunks,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embedding length shared by all entries, fixed by the first one
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.chunks.first().map(|entry| entry.embedding.len())
    }

    /// Check the invariants every readable index must hold
    #[inline]
    pub fn validate(&self) -> Result<()> {
        let Some(dimension) = self.dimension() else {
            return Err(RagError::IndexCorrupted(
                "index contains no chunks".to_string(),
            ));
        };

        if dimension == 0 {
            return Err(RagError::IndexCorrupted(
                "index entries have empty embeddings".to_string(),
            ));
        }

        let mut seen_ids = HashSet::with_capacity(self.chunks.len());
        for entry in &self.chunks {
            if entry.embedding.len() != dimension {
                return Err(RagError::IndexCorrupted(format!(
                    "chunk {} has dimension {}, expected {}",
                    entry.chunk.chunk_id,
                    entry.embedding.len(),
                    dimension
                )));
            }

            if !seen_ids.insert(entry.chunk.chunk_id.as_str()) {
                return Err(RagError::IndexCorrupted(format!(
                    "duplicate chunk id {}",
                    entry.chunk.chunk_id
                )));
            }
        }

        Ok(())
    }

    #[inline]
    pub fn stats(&self) -> IndexStats {
        let source_files: BTreeSet<&PathBuf> = self
            .chunks
            .iter()
            .map(|entry| &entry.chunk.source_file)
            .collect();

        IndexStats {
            total_chunks: self.chunks.len(),
            indexed_at: self.indexed_at,
            source_files: source_files.into_iter().cloned().collect(),
            config: self.config,
        }
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .map_err(|e| de::Error::custom(format!("invalid indexed_at '{}': {}", raw, e)))
}

fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(timestamp) => Ok(timestamp.with_timezone(&Utc)),
        Err(_) => raw.parse::<NaiveDateTime>().map(|naive| naive.and_utc()),
    }
}
