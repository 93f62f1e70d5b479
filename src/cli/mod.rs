//! CLI layer for `psl`.
//!
//! Provides the command-line interface using clap, with commands for
//! ingesting, indexing, querying, and evaluating a corpus.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
