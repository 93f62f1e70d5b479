//! Store trait definition.
//!
//! Defines the contract the core consumes from a persistent backend (see
//! the Store component design), enabling a pluggable storage implementation.

use crate::core::{Chunk, Document, IndexManifest, RunRecord};
use crate::error::Result;
use serde::Serialize;

/// Trait for the persistent store backing `psl`.
///
/// All write operations must retry on transient busy/locked conditions with
/// exponential backoff, and schema changes are versioned.
pub trait Store: Send + Sync {
    /// Initializes the store (creates schema, runs migrations).
    ///
    /// Idempotent - safe to call multiple times.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation, migration, or version detection fails.
    fn init(&mut self) -> Result<()>;

    /// Checks whether the store has been initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be performed.
    fn is_initialized(&self) -> Result<bool>;

    /// Resets all stored state, preserving the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn reset(&mut self) -> Result<()>;

    // ==================== Document operations ====================

    /// Inserts a document, idempotent by content hash.
    ///
    /// Returns the document's stable id, and whether it was newly inserted
    /// (`false` means a document with this content hash already existed).
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn insert_document(&mut self, document: &Document) -> Result<(i64, bool)>;

    /// Retrieves a document by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_document(&self, doc_id: i64) -> Result<Option<Document>>;

    /// Retrieves a document by content hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_document_by_hash(&self, content_hash: &str) -> Result<Option<Document>>;

    /// Counts documents in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    fn document_count(&self) -> Result<usize>;

    // ==================== Chunk operations ====================

    /// Inserts chunks for a document; mirrored to the full-text index.
    ///
    /// Returns the assigned chunk ids in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if chunk insertion fails.
    fn insert_chunks(&mut self, chunks: &[Chunk]) -> Result<Vec<i64>>;

    /// Retrieves all chunks for a document, in `chunk_index` order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_chunks_for_document(&self, doc_id: i64) -> Result<Vec<Chunk>>;

    /// Retrieves all chunks in the store, in ascending `chunk_id` order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_all_chunks(&self) -> Result<Vec<Chunk>>;

    /// Retrieves chunks by id, preserving the order of `ids`.
    ///
    /// Ids with no matching row are silently omitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_chunks_by_ids(&self, ids: &[i64]) -> Result<Vec<Chunk>>;

    /// Counts chunks in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    fn chunk_count(&self) -> Result<usize>;

    /// Computes the current chunk snapshot hash (SHA-256 over sorted chunk ids).
    ///
    /// # Errors
    ///
    /// Returns an error if chunk ids cannot be listed.
    fn chunk_snapshot_hash(&self) -> Result<String>;

    // ==================== Lexical search ====================

    /// Performs FTS5 BM25 full-text search given a pre-rewritten query expression.
    ///
    /// Returns `(chunk_id, score)` pairs, higher score is a better match.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    fn search_fts(&self, fts_expression: &str, limit: usize) -> Result<Vec<(i64, f64)>>;

    // ==================== Embeddings & manifests ====================

    /// Clears all embeddings and inserts the given rows within one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the rewrite fails.
    fn rewrite_embeddings(&mut self, rows: &[(i64, String, Vec<f32>)]) -> Result<()>;

    /// Returns all stored embeddings as `(chunk_id, vector)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_all_embeddings(&self) -> Result<Vec<(i64, Vec<f32>)>>;

    /// Counts rows in the embeddings table.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    fn embedding_count(&self) -> Result<usize>;

    /// Inserts a new manifest and activates it, deactivating any previous active row.
    ///
    /// # Errors
    ///
    /// Returns an error if the activation transaction fails.
    fn activate_manifest(&mut self, manifest: &IndexManifest) -> Result<i64>;

    /// Returns the currently active manifest, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_active_manifest(&self) -> Result<Option<IndexManifest>>;

    // ==================== Run log ====================

    /// Appends a run record.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn log_run(&mut self, run: &RunRecord) -> Result<()>;

    /// Gets storage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be gathered.
    fn stats(&self) -> Result<StoreStats>;
}

/// Store statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// Number of documents stored.
    pub document_count: usize,
    /// Number of chunks stored.
    pub chunk_count: usize,
    /// Number of embedding rows stored.
    pub embedding_count: usize,
    /// Whether an active manifest exists.
    pub has_active_manifest: bool,
    /// Schema version.
    pub schema_version: u32,
    /// Database file size in bytes (if applicable).
    pub db_size: Option<u64>,
}
