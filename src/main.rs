use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use helpdesk_rag::commands::{
    check_backend, run_index, run_search, show_config, show_stats, write_config,
};
use helpdesk_rag::config::Config;

#[derive(Parser)]
#[command(name = "helpdesk-rag")]
#[command(about = "Index support documents and retrieve relevant passages for a help-desk assistant")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml; relative paths in the config resolve against it
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and index every document in the docs directory
    Index,
    /// Find the passages most relevant to a question
    Search {
        /// Question or search text
        query: String,
        /// Number of passages to return (defaults to retrieval.top_k)
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Show statistics about the current index
    Stats,
    /// Check that the embedding backend is reachable
    Check,
    /// Show or write the configuration
    Config {
        /// Show current configuration instead of writing config.toml
        #[arg(long)]
        show: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.dir)?;

    match cli.command {
        Commands::Index => run_index(&config)?,
        Commands::Search { query, top_k } => run_search(&config, &query, top_k)?,
        Commands::Stats => show_stats(&config)?,
        Commands::Check => check_backend(&config)?,
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                write_config(&config)?;
            }
        }
    }

    Ok(())
}
