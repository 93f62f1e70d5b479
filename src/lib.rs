//! # psl
//!
//! A personal, local-first search layer over a corpus of plain-text
//! documents: ingest, index, query (extractive answer synthesis with
//! citation verification), and evaluate against a case file.
//!
//! ## Pipeline
//!
//! - **Ingest** (`ingest`): walks a directory, normalizes and chunks text
//!   files, and stores them.
//! - **Index** (`index_build`): embeds every chunk and activates a vector
//!   index manifest.
//! - **Query** (`orchestrator`): routes, retrieves (lexical + vector fusion),
//!   optionally reranks, synthesizes an extractive draft answer, and verifies
//!   it against the evidence before returning it.
//! - **Eval** (`eval`): runs a JSONL case file through the query pipeline and
//!   reports metrics against hard/soft gates.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod core;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod index_build;
pub mod ingest;
pub mod orchestrator;
pub mod retrieval;
pub mod router;
pub mod storage;
pub mod synthesis;
pub mod telemetry;
pub mod text;
pub mod verification;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export config types
pub use config::Config;

// Re-export core domain types
pub use core::{Chunk, Document, DraftAnswer, Intent, RouteDecision, RunRecord, ScoredChunk};

// Re-export storage types
pub use storage::{DEFAULT_DB_PATH, SqliteStore, Store};

// Re-export embedding types
#[cfg(feature = "fastembed-embeddings")]
pub use embedding::FastEmbedEmbedder;
pub use embedding::{DEFAULT_DIMENSIONS, Embedder, FallbackEmbedder, create_embedder};

// Re-export orchestration types
pub use orchestrator::{OrchestrationResult, QueryMode, QueryOverrides, run_query};

// Re-export router types
pub use router::{RouterPolicy, route};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
