use anyhow::{Context, Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::EmbeddingClient;
use crate::indexer::DocumentIndexer;
use crate::retriever::{Retriever, format_for_prompt};
use crate::store::IndexStore;

fn embedding_client(config: &Config) -> Result<EmbeddingClient> {
    EmbeddingClient::new(&config.embedding).context("Invalid embedding backend configuration")
}

/// Rebuild the index from every document under the configured docs directory
#[inline]
pub fn run_index(config: &Config) -> Result<()> {
    let client = embedding_client(config)?;
    if !client.is_available() {
        bail!(
            "Embedding backend at {} is not reachable. Is Ollama running with model '{}'?",
            client.endpoint(),
            client.model()
        );
    }

    let indexer = DocumentIndexer::from_config(config)?;
    info!(
        "Indexing {} into {}",
        indexer.docs_dir().display(),
        indexer.store().path().display()
    );

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(0).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Indexing {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let result = indexer.index_all_with_progress(&client, &mut |n, total, path| {
        bar.set_length(total as u64);
        bar.set_position((n - 1) as u64);
        bar.set_message(path.display().to_string());
    });
    bar.finish_and_clear();

    let report = result.context("Indexing aborted")?;

    if report.total_chunks == 0 {
        eprintln!(
            "{}",
            style(format!(
                "⚠ No documents indexed. Add .{} files to {}",
                config.indexing.extensions.join(", ."),
                indexer.docs_dir().display()
            ))
            .yellow()
        );
    } else {
        eprintln!(
            "{}",
            style(format!(
                "✓ Indexed {} chunks from {} of {} files",
                report.total_chunks,
                report.indexed_files.len(),
                report.total_files
            ))
            .green()
        );
        eprintln!(
            "Index file: {}",
            style(indexer.store().path().display()).dim()
        );
    }

    if !report.errors.is_empty() {
        eprintln!();
        eprintln!(
            "{}",
            style(format!("Skipped {} files:", report.errors.len()))
                .bold()
                .yellow()
        );
        for error in &report.errors {
            eprintln!("  {}", style(error).red());
        }
    }

    Ok(())
}

/// Print the chunks most similar to `query`, formatted for a chat prompt
#[inline]
pub fn run_search(config: &Config, query: &str, top_k: Option<usize>) -> Result<()> {
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let client = embedding_client(config)?;
    let mut retriever = Retriever::new(IndexStore::new(config.index_path()), client);

    let results = retriever
        .search(query, top_k)
        .with_context(|| format!("Search for '{}' failed", query))?;

    println!("{}", format_for_prompt(&results));
    Ok(())
}

/// Show a summary of the persisted index
#[inline]
pub fn show_stats(config: &Config) -> Result<()> {
    let mut store = IndexStore::new(config.index_path());
    let stats = store.stats()?;

    eprintln!("{}", style("📊 Index Statistics").bold().cyan());
    eprintln!();
    eprintln!("  Total chunks: {}", style(stats.total_chunks).cyan());
    eprintln!(
        "  Indexed at: {}",
        style(stats.indexed_at.format("%Y-%m-%d %H:%M:%S UTC")).cyan()
    );
    eprintln!(
        "  Chunking: size {}, overlap {}",
        style(stats.config.chunk_size).cyan(),
        style(stats.config.overlap).cyan()
    );
    eprintln!();
    eprintln!(
        "{}",
        style(format!("Source files ({}):", stats.source_files.len()))
            .bold()
            .yellow()
    );
    for source in &stats.source_files {
        eprintln!("  {}", source.display());
    }
    eprintln!();
    eprintln!("Index file: {}", style(store.path().display()).dim());

    Ok(())
}

/// Check the embedding backend and report the vector dimension
#[inline]
pub fn check_backend(config: &Config) -> Result<()> {
    let client = embedding_client(config)?;

    eprintln!(
        "Checking {} (model {})...",
        style(client.endpoint()).cyan(),
        style(client.model()).cyan()
    );

    match client.dimension() {
        Ok(dimension) => {
            eprintln!("{}", style("✓ Embedding backend is available").green());
            eprintln!("  Embedding dimension: {}", style(dimension).cyan());
            Ok(())
        }
        Err(e) => {
            warn!("Backend check failed: {}", e);
            eprintln!(
                "{}",
                style("⚠ Embedding backend is not available").yellow()
            );
            Err(e).context("Backend check failed")
        }
    }
}

/// Display the effective configuration
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Backend:").bold().yellow());
    match config.embedding_url() {
        Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!(
        "  Timeout: {}s",
        style(config.embedding.timeout_seconds).cyan()
    );
    eprintln!(
        "  Retries: {} (backoff {}ms)",
        style(config.embedding.retry_attempts).cyan(),
        style(config.embedding.backoff_millis).cyan()
    );
    eprintln!();

    eprintln!("{}", style("Indexing:").bold().yellow());
    eprintln!("  Docs directory: {}", style(config.docs_dir().display()).cyan());
    eprintln!("  Index file: {}", style(config.index_path().display()).cyan());
    eprintln!(
        "  Chunk size: {} (overlap {})",
        style(config.indexing.chunk_size).cyan(),
        style(config.indexing.overlap).cyan()
    );
    eprintln!(
        "  Extensions: {}",
        style(config.indexing.extensions.join(", ")).cyan()
    );
    eprintln!();

    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!();

    let config_path = config.config_file_path();
    if config_path.exists() {
        eprintln!("Config file: {}", style(config_path.display()).dim());
    } else {
        eprintln!(
            "Config file: {} {}",
            style(config_path.display()).dim(),
            style("(not present, using defaults)").yellow()
        );
    }

    Ok(())
}

/// Write the effective configuration to `config.toml`
#[inline]
pub fn write_config(config: &Config) -> Result<()> {
    config.save()?;
    eprintln!("{}", style("✓ Configuration saved successfully!").green());
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).cyan()
    );
    Ok(())
}
