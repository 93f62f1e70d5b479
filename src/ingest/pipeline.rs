//! Ingestion reference producer.
//!
//! Walks a root path, reads UTF-8 text files, normalizes and chunks them,
//! and inserts the result via the [`Store`] contract. Not a full-featured
//! loader (no PDF/HTML parsing); the concrete producer this crate ships so
//! `ingest` is runnable end-to-end.

use crate::config::IngestionConfig;
use crate::core::{Chunk, Document, IngestSummary, sha256_hex};
use crate::error::Result;
use crate::ingest::chunk::chunk_text;
use crate::ingest::normalize::normalize_text;
use crate::ingest::walker::collect_files;
use crate::storage::Store;
use std::path::Path;
use tracing::{info, warn};

/// Ingests every eligible file under `root` into `store`.
///
/// # Errors
///
/// Returns an error if the root path is invalid or a store write fails.
/// Per-file problems (oversized, undecodable, empty after normalization,
/// already present) are recorded in the returned [`IngestSummary`] rather
/// than aborting the run.
pub fn ingest_path(store: &mut dyn Store, root: &Path, config: &IngestionConfig) -> Result<IngestSummary> {
    let files = collect_files(root, &config.blocked_suffixes)?;
    let mut summary = IngestSummary::default();

    for path in files {
        if let Err(reason) = ingest_one(store, &path, config, &mut summary) {
            warn!(path = %path.display(), %reason, "skipping file");
        }
    }

    info!(
        documents_inserted = summary.documents_inserted,
        documents_skipped = summary.documents_skipped,
        chunks_inserted = summary.chunks_inserted,
        "ingestion complete"
    );
    Ok(summary)
}

fn ingest_one(store: &mut dyn Store, path: &Path, config: &IngestionConfig, summary: &mut IngestSummary) -> std::result::Result<(), String> {
    let metadata = std::fs::metadata(path).map_err(|err| err.to_string())?;
    if metadata.len() > config.max_doc_bytes {
        summary.record_skip("oversized");
        return Ok(());
    }

    let raw = std::fs::read(path).map_err(|err| err.to_string())?;
    let text = String::from_utf8(raw).map_err(|_| {
        summary.record_skip("decode_failure");
        "not valid utf-8".to_string()
    })?;

    let normalized = if config.normalize_text { normalize_text(&text) } else { text.trim().to_string() };
    if normalized.is_empty() {
        summary.record_skip("empty_after_normalization");
        return Ok(());
    }

    let content_hash = sha256_hex(normalized.as_bytes());
    let source_path = path.to_string_lossy().to_string();
    let source_type = source_type_for(path);
    let title = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| source_path.clone());

    let document = Document::new(source_path, source_type, title, content_hash);
    let (doc_id, inserted) = store.insert_document(&document).map_err(|err| err.to_string())?;
    if !inserted {
        summary.record_skip("duplicate");
        return Ok(());
    }
    summary.documents_inserted += 1;

    let spans = chunk_text(&normalized, config.chunk_size, config.chunk_overlap).map_err(|err| err.to_string())?;
    let chunks: Vec<Chunk> = spans
        .into_iter()
        .enumerate()
        .map(|(index, span)| Chunk::new(doc_id, span.text, span.start_offset, span.end_offset, index))
        .collect();
    if !chunks.is_empty() {
        let inserted_ids = store.insert_chunks(&chunks).map_err(|err| err.to_string())?;
        summary.chunks_inserted += inserted_ids.len();
    }
    Ok(())
}

fn source_type_for(path: &Path) -> String {
    match path.extension().and_then(|ext| ext.to_str()).map(str::to_lowercase).as_deref() {
        Some("md") => "markdown".to_string(),
        _ => "text".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;

    fn store_with_schema() -> SqliteStore {
        let mut store = SqliteStore::in_memory().expect("open");
        store.init().expect("init");
        store
    }

    #[test]
    fn ingests_a_single_markdown_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("notes.md"), "Some Notes About Retrieval Systems").expect("write");
        let mut store = store_with_schema();
        let config = IngestionConfig::default();
        let summary = ingest_path(&mut store, dir.path(), &config).expect("ingest");
        assert_eq!(summary.documents_inserted, 1);
        assert!(summary.chunks_inserted >= 1);
        assert_eq!(store.document_count().expect("count"), 1);
    }

    #[test]
    fn reingesting_the_same_file_is_a_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "repeated content for dedup test").expect("write");
        let mut store = store_with_schema();
        let config = IngestionConfig::default();
        ingest_path(&mut store, dir.path(), &config).expect("first ingest");
        let second = ingest_path(&mut store, dir.path(), &config).expect("second ingest");
        assert_eq!(second.documents_inserted, 0);
        assert_eq!(*second.skip_reasons.get("duplicate").unwrap_or(&0), 1);
    }

    #[test]
    fn oversized_files_are_skipped_and_counted() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("big.txt"), "x".repeat(100)).expect("write");
        let mut store = store_with_schema();
        let mut config = IngestionConfig::default();
        config.max_doc_bytes = 10;
        let summary = ingest_path(&mut store, dir.path(), &config).expect("ingest");
        assert_eq!(summary.documents_inserted, 0);
        assert_eq!(*summary.skip_reasons.get("oversized").unwrap_or(&0), 1);
    }

    #[test]
    fn blocked_suffixes_are_not_walked_in() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("data.json"), "{}").expect("write");
        let mut store = store_with_schema();
        let config = IngestionConfig::default();
        let summary = ingest_path(&mut store, dir.path(), &config).expect("ingest");
        assert_eq!(summary.documents_inserted, 0);
        assert_eq!(summary.documents_skipped, 0);
    }
}
