use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "mempack CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a pack + ANN index from a directory of text files
    Build {
        /// directory to walk for input documents
        #[arg(long)]
        input: PathBuf,
        /// glob pattern (relative to `input`) selecting files to ingest
        #[arg(long, default_value = "**/*.txt")]
        pattern: String,
        /// output pack path
        #[arg(long)]
        pack: PathBuf,
        /// output ANN sidecar path
        #[arg(long)]
        ann: PathBuf,
        /// optional TOML config overriding the defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run a semantic search against a built pack + ANN pair
    Search {
        #[arg(long)]
        pack: PathBuf,
        #[arg(long)]
        ann: PathBuf,
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        /// metadata filter as `key=value`, matched against string fields
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Verify pack integrity (checksums over every block, directory, trailer)
    Verify {
        #[arg(long)]
        pack: PathBuf,
    },

    /// Print build/pack statistics
    Stats {
        #[arg(long)]
        pack: PathBuf,
        #[arg(long)]
        ann: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
