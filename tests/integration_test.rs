//! Integration tests for `psl`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use psl_rs::config::IngestionConfig;
use psl_rs::core::{Chunk, Document};
use psl_rs::storage::{SqliteStore, Store};
use psl_rs::{Cli, Commands, OutputFormat};
use std::fs;
use tempfile::TempDir;

/// Helper to create a test store instance.
fn create_test_store() -> (SqliteStore, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let mut store = SqliteStore::open(&db_path).expect("failed to open store");
    store.init().expect("failed to init store");
    (store, temp_dir)
}

#[test]
fn store_init_and_status() {
    let (store, _temp) = create_test_store();

    assert!(store.is_initialized().expect("is_initialized failed"));

    let stats = store.stats().expect("stats failed");
    assert_eq!(stats.document_count, 0);
    assert_eq!(stats.chunk_count, 0);
    assert!(!stats.has_active_manifest);
}

#[test]
fn document_insert_is_idempotent_by_hash() {
    let (mut store, _temp) = create_test_store();

    let doc = Document::new(
        "notes.md".to_string(),
        "markdown".to_string(),
        "notes".to_string(),
        "abc123".to_string(),
    );

    let (id, inserted) = store.insert_document(&doc).expect("insert_document failed");
    assert!(id > 0);
    assert!(inserted);

    let (second_id, inserted_again) = store.insert_document(&doc).expect("insert_document failed");
    assert_eq!(second_id, id);
    assert!(!inserted_again);

    assert_eq!(store.document_count().expect("document_count failed"), 1);
}

#[test]
fn chunk_round_trip() {
    let (mut store, _temp) = create_test_store();

    let doc = Document::new(
        "hello.txt".to_string(),
        "text".to_string(),
        "hello".to_string(),
        "deadbeef".to_string(),
    );
    let (doc_id, _) = store.insert_document(&doc).expect("insert_document failed");

    let chunks = vec![
        Chunk::new(doc_id, "Hello, world!".to_string(), 0, 13, 0),
        Chunk::new(doc_id, " This is test content.".to_string(), 13, 35, 1),
    ];

    let ids = store.insert_chunks(&chunks).expect("insert_chunks failed");
    assert_eq!(ids.len(), 2);

    let loaded = store.get_chunks_for_document(doc_id).expect("get_chunks_for_document failed");
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].chunk_text, "Hello, world!");
    assert_eq!(loaded[1].chunk_index, 1);

    assert_eq!(store.chunk_count().expect("chunk_count failed"), 2);
}

#[test]
fn ingest_path_inserts_documents_and_chunks() {
    let (mut store, temp) = create_test_store();
    let corpus_dir = temp.path().join("corpus");
    fs::create_dir_all(&corpus_dir).expect("failed to create corpus dir");
    fs::write(
        corpus_dir.join("one.txt"),
        "Rust is a systems programming language.\nIt is fast and memory-safe.\n".repeat(20),
    )
    .expect("failed to write fixture");
    fs::write(corpus_dir.join("empty.txt"), "   \n").expect("failed to write fixture");

    let config = IngestionConfig::default();
    let summary = psl_rs::ingest::ingest_path(&mut store, &corpus_dir, &config).expect("ingest_path failed");

    assert_eq!(summary.documents_inserted, 1);
    assert_eq!(summary.documents_skipped, 1);
    assert!(summary.chunks_inserted > 0);

    let stats = store.stats().expect("stats failed");
    assert_eq!(stats.document_count, 1);
    assert_eq!(stats.chunk_count, summary.chunks_inserted);

    // Re-ingesting the same corpus is a no-op (duplicate content hash).
    let second = psl_rs::ingest::ingest_path(&mut store, &corpus_dir, &config).expect("ingest_path failed");
    assert_eq!(second.documents_inserted, 0);
}

#[test]
fn store_reset_clears_documents_and_chunks() {
    let (mut store, _temp) = create_test_store();

    let doc = Document::new(
        "a.txt".to_string(),
        "text".to_string(),
        "a".to_string(),
        "hash-a".to_string(),
    );
    store.insert_document(&doc).expect("insert_document failed");

    let stats = store.stats().expect("stats failed");
    assert_eq!(stats.document_count, 1);

    store.reset().expect("reset failed");

    let stats = store.stats().expect("stats after reset failed");
    assert_eq!(stats.document_count, 0);
    assert_eq!(stats.chunk_count, 0);
}

#[test]
fn cli_parses_all_subcommands() {
    use clap::Parser;

    let cli = Cli::parse_from(["psl", "ingest", "./docs"]);
    assert!(matches!(cli.command, Commands::Ingest { .. }));

    let cli = Cli::parse_from(["psl", "query", "what is rust", "--search", "--top-k", "5"]);
    match cli.command {
        Commands::Query { query, search, top_k, skip_vector } => {
            assert_eq!(query, "what is rust");
            assert!(search);
            assert_eq!(top_k, Some(5));
            assert!(!skip_vector);
        }
        other => panic!("unexpected command: {other:?}"),
    }

    let cli = Cli::parse_from(["psl", "status"]);
    assert!(matches!(cli.command, Commands::Status));
}

#[test]
fn output_format_parses_known_values() {
    assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
    assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
    assert_eq!(OutputFormat::parse("ndjson"), OutputFormat::Ndjson);
    assert_eq!(OutputFormat::parse("unknown"), OutputFormat::Text);
}

mod cli_binary {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn status_on_fresh_db_reports_zero_counts() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let db_path = temp.path().join("search.db");

        Command::cargo_bin("psl")
            .expect("binary not found")
            .args(["--db-path", db_path.to_str().unwrap(), "--format", "json", "status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"document_count\":0"));
    }

    #[test]
    fn ingest_then_status_reflects_corpus() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let db_path = temp.path().join("search.db");
        let corpus = temp.path().join("corpus");
        fs::create_dir_all(&corpus).expect("failed to create corpus dir");
        fs::write(
            corpus.join("doc.txt"),
            "The quick brown fox jumps over the lazy dog. ".repeat(50),
        )
        .expect("failed to write fixture");

        Command::cargo_bin("psl")
            .expect("binary not found")
            .args(["--db-path", db_path.to_str().unwrap(), "ingest", corpus.to_str().unwrap()])
            .assert()
            .success();

        Command::cargo_bin("psl")
            .expect("binary not found")
            .args(["--db-path", db_path.to_str().unwrap(), "--format", "json", "status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"document_count\":1"));
    }

    #[test]
    fn query_before_index_reports_error() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let db_path = temp.path().join("search.db");

        Command::cargo_bin("psl")
            .expect("binary not found")
            .args(["--db-path", db_path.to_str().unwrap(), "query", "anything"])
            .assert()
            .failure();
    }
}

mod property_tests {
    use proptest::prelude::*;
    use psl_rs::core::Chunk;

    proptest! {
        #[test]
        fn chunk_round_trip_preserves_text(content in "[a-z]{1,100}") {
            let len = content.len();
            let chunk = Chunk::new(1, content.clone(), 0, len + 1, 0);
            prop_assert_eq!(chunk.chunk_text, content);
        }

        #[test]
        fn chunk_offsets_cover_text(start in 0usize..1000, len in 1usize..100) {
            let content = "x".repeat(len);
            let end = start + len;
            let chunk = Chunk::new(1, content, start, end, 0);
            prop_assert_eq!(chunk.start_offset, start);
            prop_assert_eq!(chunk.end_offset, end);
        }
    }
}
