// Index store module
// Persists the index as a single JSON snapshot and tracks staleness through the file mtime

pub mod models;


use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::chunking::ChunkingConfig;
use crate::{RagError, Result};

pub use models::{Index, IndexEntry, IndexStats};

/// Freshness of the in-memory snapshot relative to the file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Unloaded,
    Fresh,
    Stale,
}

/// Reads and writes the index snapshot file.
///
/// The loaded snapshot is shared as an `Arc<Index>` and never mutated; a reload
/// swaps in a whole new snapshot.
#[derive(Debug)]
pub struct IndexStore {
    path: PathBuf,
    snapshot: Option<Arc<Index>>,
    loaded_mtime: Option<SystemTime>,
    load_count: usize,
}

impl IndexStore {
    #[inline]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            snapshot: None,
            loaded_mtime: None,
            load_count: 0,
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write a new index containing `entries`, replacing any previous file.
    ///
    /// The JSON goes to a temporary file in the same directory which is then renamed
    /// over the target, so readers see either the old or the new file in full.
    #[inline]
    pub fn save(&self, config: ChunkingConfig, entries: Vec<IndexEntry>) -> Result<Index> {
        let index = Index::new(config, entries);
        index.validate().map_err(|e| match e {
            RagError::IndexCorrupted(reason) => {
                RagError::IndexCorrupted(format!("refusing to write index: {}", reason))
            }
            other => other,
        })?;

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut temp_file = NamedTempFile::new_in(parent)?;
        {
            let mut writer = BufWriter::new(temp_file.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &index)?;
            writer.flush()?;
        }
        temp_file.as_file().sync_all()?;
        temp_file.persist(&self.path).map_err(|e| e.error)?;

        info!(
            "Saved index with {} chunks to {}",
            index.len(),
            self.path.display()
        );
        Ok(index)
    }

    /// Load and validate the index file.
    ///
    /// Returns `Ok(None)` when the file does not exist and
    /// [`RagError::IndexCorrupted`] when it cannot be used.
    #[inline]
    pub fn load(&mut self) -> Result<Option<Arc<Index>>> {
        // The mtime is taken before reading so that a concurrent rewrite shows up as stale
        let Some(modified) = self.current_mtime()? else {
            debug!("No index file at {}", self.path.display());
            return Ok(None);
        };

        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let index: Index = serde_json::from_slice(&bytes).map_err(|e| {
            RagError::IndexCorrupted(format!("{}: {}", self.path.display(), e))
        })?;
        index.validate()?;

        let index = Arc::new(index);
        self.snapshot = Some(Arc::clone(&index));
        self.loaded_mtime = Some(modified);
        self.load_count += 1;

        info!(
            "Loaded index with {} chunks from {}",
            index.len(),
            self.path.display()
        );
        Ok(Some(index))
    }

    #[inline]
    pub fn state(&self) -> Result<IndexState> {
        let Some(recorded) = self.loaded_mtime else {
            return Ok(IndexState::Unloaded);
        };

        // A file deleted after loading leaves the snapshot in service
        match self.current_mtime()? {
            Some(current) if current != recorded => Ok(IndexState::Stale),
            _ => Ok(IndexState::Fresh),
        }
    }

    /// Current snapshot, loading or reloading first when unloaded or stale
    #[inline]
    pub fn ensure_fresh(&mut self) -> Result<Arc<Index>> {
        match (self.state()?, &self.snapshot) {
            (IndexState::Fresh, Some(snapshot)) => return Ok(Arc::clone(snapshot)),
            (IndexState::Stale, _) => info!("Index file changed on disk, reloading"),
            _ => {}
        }

        self.load()?
            .ok_or_else(|| RagError::IndexNotFound(self.path.clone()))
    }

    /// The snapshot from the last successful load, without checking freshness
    #[inline]
    pub fn snapshot(&self) -> Option<Arc<Index>> {
        self.snapshot.clone()
    }

    /// Number of successful loads so far
    #[inline]
    pub fn load_count(&self) -> usize {
        self.load_count
    }

    #[inline]
    pub fn stats(&mut self) -> Result<IndexStats> {
        let index = match &self.snapshot {
            Some(snapshot) => Arc::clone(snapshot),
            None => self
                .load()?
                .ok_or_else(|| RagError::IndexNotFound(self.path.clone()))?,
        };

        Ok(index.stats())
    }

    fn current_mtime(&self) -> Result<Option<SystemTime>> {
        match fs::metadata(&self.path) {
            Ok(metadata) => Ok(Some(metadata.modified()?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
