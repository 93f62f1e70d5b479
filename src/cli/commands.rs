//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

#![allow(clippy::too_many_lines)]

use crate::cli::output::{format_eval_report, format_index_summary, format_ingest_summary, format_query_result, format_status, OutputFormat};
use crate::cli::parser::{Cli, Commands};
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::error::{CommandError, Result, StorageError};
use crate::index_build::build_index;
use crate::ingest::ingest_path;
use crate::orchestrator::{run_query, QueryMode, QueryOverrides};
use crate::router::RouterPolicy;
use crate::storage::{SqliteStore, Store};
use std::path::Path;
use std::time::Instant;

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();
    let config = Config::load(cli.config_path.as_deref())?;

    match &cli.command {
        Commands::Ingest { path } => cmd_ingest(&db_path, path, &config, format),
        Commands::Index => cmd_index(&db_path, &config, format),
        Commands::Query { query, search, top_k, skip_vector } => cmd_query(&db_path, &config, query, *search, *top_k, *skip_vector, format),
        Commands::Eval { cases } => cmd_eval(&db_path, &config, cases, format),
        Commands::Status => cmd_status(&db_path, format),
        Commands::Reset { yes } => cmd_reset(&db_path, *yes),
    }
}

fn open_store_for_write(db_path: &Path) -> Result<SqliteStore> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| CommandError::ExecutionFailed(format!("failed to create directory: {e}")))?;
    }
    let mut store = SqliteStore::open(db_path)?;
    store.init()?;
    Ok(store)
}

fn open_initialized_store(db_path: &Path) -> Result<SqliteStore> {
    let store = SqliteStore::open(db_path)?;
    if !store.is_initialized()? {
        return Err(StorageError::NotInitialized.into());
    }
    Ok(store)
}

fn cmd_ingest(db_path: &Path, path: &Path, config: &Config, format: OutputFormat) -> Result<String> {
    let mut store = open_store_for_write(db_path)?;
    let summary = ingest_path(&mut store, path, &config.ingestion)?;
    Ok(format_ingest_summary(&summary, format))
}

fn cmd_index(db_path: &Path, config: &Config, format: OutputFormat) -> Result<String> {
    let mut store = open_initialized_store(db_path)?;
    let embedder = create_embedder(&config.embedding)?;
    let summary = build_index(&mut store, embedder.as_ref(), &config.embedding)?;
    Ok(format_index_summary(&summary, format))
}

fn cmd_query(db_path: &Path, config: &Config, query: &str, search: bool, top_k: Option<usize>, skip_vector: bool, format: OutputFormat) -> Result<String> {
    let mut store = open_initialized_store(db_path)?;
    let embedder = create_embedder(&config.embedding)?;
    let policy = RouterPolicy::from_config(&config.router)?;
    let mode = if search { QueryMode::Search } else { QueryMode::Answer };
    let overrides = QueryOverrides {
        top_k,
        skip_vector: skip_vector.then_some(true),
    };

    let start = Instant::now();
    let result = run_query(&store, embedder.as_ref(), &policy, config, query, mode, overrides, 0)?;
    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    let run = crate::core::RunRecord {
        run_id: format!("run-{}", store.chunk_snapshot_hash().unwrap_or_default()),
        query: query.to_string(),
        intent: format!("{:?}", result.intent).to_lowercase(),
        tool_trace: result.tool_trace.clone(),
        latency_ms: elapsed_ms,
        created_at: 0,
    };
    store.log_run(&run)?;

    Ok(format_query_result(&result, format))
}

fn cmd_eval(db_path: &Path, config: &Config, cases_path: &Path, _format: OutputFormat) -> Result<String> {
    let store = open_initialized_store(db_path)?;
    let embedder = create_embedder(&config.embedding)?;
    let policy = RouterPolicy::from_config(&config.router)?;

    let jsonl = std::fs::read_to_string(cases_path).map_err(|e| CommandError::ExecutionFailed(format!("cannot read case file {}: {e}", cases_path.display())))?;
    let cases = crate::eval::load_cases(&jsonl)?;
    let report = crate::eval::run_eval(&cases, &store, embedder.as_ref(), &policy, config)?;
    Ok(format_eval_report(&report))
}

fn cmd_status(db_path: &Path, format: OutputFormat) -> Result<String> {
    let store = open_initialized_store(db_path)?;
    let stats = store.stats()?;
    Ok(format_status(&stats, format))
}

fn cmd_reset(db_path: &Path, yes: bool) -> Result<String> {
    if !yes {
        return Err(CommandError::ExecutionFailed("use --yes to confirm reset. This will delete all data.".to_string()).into());
    }
    let mut store = open_initialized_store(db_path)?;
    store.reset()?;
    Ok("psl store reset successfully.\n".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parser::Cli;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(args)
    }

    #[test]
    fn ingest_then_status_round_trips_through_cli() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("notes.md"), "Some notes about retrieval systems and evaluation").expect("write");
        let db_path = dir.path().join("search.db");
        let db_arg = db_path.to_string_lossy().to_string();
        let doc_arg = dir.path().to_string_lossy().to_string();

        let ingest_cli = parse(&["psl", "--db-path", &db_arg, "ingest", &doc_arg]);
        let out = execute(&ingest_cli).expect("ingest");
        assert!(out.contains("Documents inserted"));

        let status_cli = parse(&["psl", "--db-path", &db_arg, "status"]);
        let out = execute(&status_cli).expect("status");
        assert!(out.contains("Documents"));
    }

    #[test]
    fn status_before_ingest_reports_not_initialized() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("search.db");
        let db_arg = db_path.to_string_lossy().to_string();
        let status_cli = parse(&["psl", "--db-path", &db_arg, "status"]);
        assert!(execute(&status_cli).is_err());
    }

    #[test]
    fn reset_without_yes_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "some content here for ingestion").expect("write");
        let db_path = dir.path().join("search.db");
        let db_arg = db_path.to_string_lossy().to_string();
        let doc_arg = dir.path().to_string_lossy().to_string();
        execute(&parse(&["psl", "--db-path", &db_arg, "ingest", &doc_arg])).expect("ingest");

        let reset_cli = parse(&["psl", "--db-path", &db_arg, "reset"]);
        assert!(execute(&reset_cli).is_err());
    }
}
