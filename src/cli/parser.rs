//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `psl`: a personal, local-first search layer over a corpus of text documents.
#[derive(Parser, Debug)]
#[command(name = "psl")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the `psl` `SQLite` database file.
    ///
    /// Defaults to `.psl/search.db` in the current directory.
    #[arg(long, env = "PSL_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Path to a JSON configuration file overriding built-in defaults.
    #[arg(long, env = "PSL_CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json, ndjson).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a directory of text files into the store.
    Ingest {
        /// Root directory to walk.
        path: PathBuf,
    },

    /// Rebuild the vector index from the store's current chunk set.
    Index,

    /// Answer a query (or return ranked chunks in search mode).
    Query {
        /// Query text.
        query: String,

        /// Return ranked chunks only, skipping synthesis and verification.
        #[arg(long)]
        search: bool,

        /// Override the router's recommended retrieval depth.
        #[arg(long)]
        top_k: Option<usize>,

        /// Skip vector retrieval, using lexical search only.
        #[arg(long)]
        skip_vector: bool,
    },

    /// Run an eval case file and report metrics against the configured gates.
    Eval {
        /// Path to a JSONL case file.
        cases: PathBuf,
    },

    /// Show store status (document/chunk/embedding counts, active manifest).
    Status,

    /// Reset all stored state, preserving the schema.
    Reset {
        /// Skip confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| PathBuf::from(crate::storage::DEFAULT_DB_PATH))
    }
}
