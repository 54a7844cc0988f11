// Retriever module
// Brute-force cosine ranking of the stored chunks against a query


use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use crate::embeddings::Embedder;
use crate::store::{IndexStats, IndexStore};
use crate::{RagError, Result};

pub const DEFAULT_TOP_K: usize = 3;

/// A ranked chunk returned by [`Retriever::search`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub text: String,
    pub source_file: PathBuf,
    /// Cosine similarity in [-1, 1]
    pub similarity_score: f32,
    pub position: usize,
}

/// Answers similarity queries against the persisted index
#[derive(Debug)]
pub struct Retriever<E> {
    store: IndexStore,
    embedder: E,
}

impl<E: Embedder> Retriever<E> {
    #[inline]
    pub fn new(store: IndexStore, embedder: E) -> Self {
        Self { store, embedder }
    }

    #[inline]
    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Return at most `top_k` chunks ranked by similarity to `query`.
    ///
    /// The index is (re)loaded first if it has never been loaded or the file changed.
    /// Equal scores keep index order.
    #[inline]
    pub fn search(&mut self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let index = self.store.ensure_fresh()?;
        let query_embedding = self.embedder.embed(query)?;

        match index.dimension() {
            Some(dimension) if dimension != query_embedding.len() => {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: query_embedding.len(),
                });
            }
            _ => {}
        }

        let mut scored: Vec<(usize, f32)> = index
            .chunks
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(&query_embedding, &entry.embedding)))
            .collect();

        // Stable sort, so ties stay in insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let results: Vec<SearchResult> = scored
            .into_iter()
            .take(top_k)
            .map(|(i, score)| {
                let chunk = &index.chunks[i].chunk;
                SearchResult {
                    chunk_id: chunk.chunk_id.clone(),
                    text: chunk.text.clone(),
                    source_file: chunk.source_file.clone(),
                    similarity_score: score,
                    position: chunk.position,
                }
            })
            .collect();

        debug!(
            "Query matched {} of {} chunks (top_k {})",
            results.len(),
            index.len(),
            top_k
        );
        Ok(results)
    }

    #[inline]
    pub fn stats(&mut self) -> Result<IndexStats> {
        self.store.stats()
    }
}

/// Render results as a numbered context block for the chat prompt
#[inline]
pub fn format_for_prompt(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No relevant documents found.".to_string();
    }

    let blocks: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "[{}] Source: {} (relevance: {:.2})\n{}",
                i + 1,
                result.source_file.display(),
                result.similarity_score,
                result.text
            )
        })
        .collect();

    format!("Found documents:\n\n{}", blocks.join("\n\n"))
}

/// Cosine similarity between two vectors of equal length.
///
/// Returns 0 when either vector has zero norm.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
