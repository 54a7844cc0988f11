// Indexer module
// Runs a full indexing pass: scan, read, chunk, embed, save


use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::chunking::{DocumentChunker, chunk_stem};
use crate::config::Config;
use crate::embeddings::Embedder;
use crate::store::{IndexEntry, IndexStore};
use crate::{RagError, Result};

/// Outcome of an indexing pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingReport {
    pub total_files: usize,
    pub total_chunks: usize,
    pub indexed_files: Vec<PathBuf>,
    /// One `<path>: <error>` line per file that was skipped
    pub errors: Vec<String>,
}

/// Builds the index from every supported document under the docs directory
#[derive(Debug)]
pub struct DocumentIndexer {
    docs_dir: PathBuf,
    chunker: DocumentChunker,
    store: IndexStore,
}

impl DocumentIndexer {
    #[inline]
    pub fn new<P: Into<PathBuf>>(docs_dir: P, chunker: DocumentChunker, store: IndexStore) -> Self {
        Self {
            docs_dir: docs_dir.into(),
            chunker,
            store,
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let chunker = DocumentChunker::new(
            config.chunking_config()?,
            config.indexing.extensions.as_slice(),
        )?;
        Ok(Self::new(
            config.docs_dir(),
            chunker,
            IndexStore::new(config.index_path()),
        ))
    }

    #[inline]
    pub fn docs_dir(&self) -> &Path {
        &self.docs_dir
    }

    #[inline]
    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    #[inline]
    pub fn index_all<E: Embedder>(&self, embedder: &E) -> Result<IndexingReport> {
        self.index_all_with_progress(embedder, &mut |_, _, _| {})
    }

    /// Index every document, calling `progress(file_number, total_files, path)` before each file.
    ///
    /// A file that cannot be read or embedded is skipped as a whole and reported in
    /// [`IndexingReport::errors`]. A connectivity failure that survived all retries aborts
    /// the run without touching the existing index, since every later request would fail
    /// the same way.
    #[inline]
    pub fn index_all_with_progress<E: Embedder>(
        &self,
        embedder: &E,
        progress: &mut dyn FnMut(usize, usize, &Path),
    ) -> Result<IndexingReport> {
        let files = self.chunker.scan(&self.docs_dir)?;
        info!(
            "Found {} documents to index in {}",
            files.len(),
            self.docs_dir.display()
        );

        let mut report = IndexingReport {
            total_files: files.len(),
            ..IndexingReport::default()
        };
        let mut entries = Vec::new();
        let mut used_stems = HashSet::new();

        for (i, path) in files.iter().enumerate() {
            progress(i + 1, files.len(), path);
            let stem = unique_stem(&mut used_stems, path);

            match self.index_file(embedder, path, stem) {
                Ok(file_entries) => {
                    debug!("{}: {} chunks", path.display(), file_entries.len());
                    entries.extend(file_entries);
                    report.indexed_files.push(path.clone());
                }
                Err(RagError::Embedding(e)) if e.is_connectivity() => {
                    error!("Aborting indexing at {}: {}", path.display(), e);
                    return Err(RagError::Embedding(e));
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.errors.push(format!("{}: {}", path.display(), e));
                }
            }
        }

        report.total_chunks = entries.len();

        if entries.is_empty() {
            warn!(
                "No chunks produced from {}, leaving {} untouched",
                self.docs_dir.display(),
                self.store.path().display()
            );
            return Ok(report);
        }

        self.store.save(self.chunker.config(), entries)?;

        info!(
            "Indexed {} chunks from {} files ({} errors)",
            report.total_chunks,
            report.indexed_files.len(),
            report.errors.len()
        );
        Ok(report)
    }

    fn index_file<E: Embedder>(
        &self,
        embedder: &E,
        path: &Path,
        stem: String,
    ) -> Result<Vec<IndexEntry>> {
        let text = self.chunker.read(path)?;

        let mut entries = Vec::new();
        for chunk in self.chunker.chunk_with_stem(&text, path, stem) {
            let embedding = embedder.embed(&chunk.text)?;
            entries.push(IndexEntry::new(chunk, embedding));
        }

        Ok(entries)
    }
}

/// File stem for chunk ids, suffixed with `-2`, `-3`, ... when another file already used it
fn unique_stem(used: &mut HashSet<String>, path: &Path) -> String {
    let base = chunk_stem(path);
    let mut candidate = base.clone();
    let mut n = 1;

    while !used.insert(candidate.clone()) {
        n += 1;
        candidate = format!("{}-{}", base, n);
    }

    candidate
}
