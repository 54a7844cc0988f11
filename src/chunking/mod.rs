
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{RagError, Result};

/// A bounded slice of a document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    #[serde(rename = "id")]
    pub chunk_id: String,
    pub text: String,
    #[serde(rename = "source")]
    pub source_file: PathBuf,
    /// Character offset of the chunk within the source text
    pub position: usize,
}

/// Sliding window parameters, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

impl ChunkingConfig {
    /// Fails when the window could never advance
    #[inline]
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidChunking(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        if self.overlap >= self.chunk_size {
            return Err(RagError::InvalidChunking(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }

        Ok(())
    }

    /// Distance between the starts of two consecutive windows
    #[inline]
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Scans a document root, reads files and slices them into overlapping chunks
#[derive(Debug, Clone)]
pub struct DocumentChunker {
    config: ChunkingConfig,
    extensions: Vec<String>,
}

impl DocumentChunker {
    #[inline]
    pub fn new<S: AsRef<str>>(config: ChunkingConfig, extensions: &[S]) -> Result<Self> {
        config.validate()?;

        let extensions = extensions
            .iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Ok(Self { config, extensions })
    }

    #[inline]
    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Recursively list allow-listed files under `root`, sorted.
    ///
    /// A missing root is created empty.
    #[inline]
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.exists() {
            debug!("Creating missing document root {}", root.display());
            fs::create_dir_all(root)?;
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };

            if entry.file_type().is_file() && self.is_supported(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        debug!("Found {} documents under {}", files.len(), root.display());
        Ok(files)
    }

    #[inline]
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }

    /// Read a document as trimmed text.
    ///
    /// Content that is not UTF-8 is decoded as Latin-1 unless it contains NUL bytes.
    #[inline]
    pub fn read(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path)?;

        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                let bytes = err.into_bytes();
                if bytes.contains(&0) {
                    return Err(RagError::Encoding {
                        path: path.to_path_buf(),
                    });
                }
                debug!("{} is not UTF-8, decoding as Latin-1", path.display());
                bytes.iter().map(|&b| char::from(b)).collect()
            }
        };

        Ok(text.trim().to_string())
    }

    /// Lazily slice `text` into windows named after the file stem of `source`.
    ///
    /// Windows are `chunk_size` characters wide and start `chunk_size - overlap`
    /// characters apart; the last one may be shorter. A text of length `L > overlap`
    /// yields `ceil((L - overlap) / (chunk_size - overlap))` chunks.
    #[inline]
    pub fn chunk<'a>(&self, text: &'a str, source: &'a Path) -> Chunks<'a> {
        self.chunk_with_stem(text, source, chunk_stem(source))
    }

    /// Like [`DocumentChunker::chunk`] with an explicit id stem
    #[inline]
    pub fn chunk_with_stem<'a>(&self, text: &'a str, source: &'a Path, stem: String) -> Chunks<'a> {
        Chunks {
            text,
            source,
            stem,
            chunk_size: self.config.chunk_size,
            step: self.config.step(),
            start_byte: 0,
            start_char: 0,
            sequence: 0,
        }
    }
}

/// Iterator over the sliding windows of one document
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    source: &'a Path,
    stem: String,
    chunk_size: usize,
    step: usize,
    start_byte: usize,
    start_char: usize,
    sequence: usize,
}

impl Iterator for Chunks<'_> {
    type Item = DocumentChunk;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.start_byte >= self.text.len() {
            return None;
        }

        let (_, rest) = self.text.split_at(self.start_byte);
        let window_end = byte_offset(rest, self.chunk_size);
        let (window, _) = rest.split_at(window_end);

        let chunk = DocumentChunk {
            chunk_id: chunk_id(&self.stem, self.sequence),
            text: window.to_string(),
            source_file: self.source.to_path_buf(),
            position: self.start_char,
        };

        // A window that reaches the end of the text is the last one: any later start
        // would only repeat its tail.
        if window_end == rest.len() {
            self.start_byte = self.text.len();
        } else {
            self.start_byte += byte_offset(rest, self.step);
        }
        self.start_char += self.step;
        self.sequence += 1;

        Some(chunk)
    }
}

/// Byte offset of the `chars`-th character, or the end of `text`
fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(offset, _)| offset)
}

/// Base name of `source` without its extension
#[inline]
pub fn chunk_stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<stem>_chunk_<4-digit sequence>`
#[inline]
pub fn chunk_id(stem: &str, sequence: usize) -> String {
    format!("{}_chunk_{:04}", stem, sequence)
}
