//! `SQLite` store implementation.
//!
//! Uses WAL mode and a busy timeout for concurrent readers, plus an explicit
//! retry-with-backoff wrapper around writes so transient "database is
//! locked" errors are recovered rather than surfaced to the caller.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::core::{Chunk, Document, IndexManifest, RunRecord, chunk_snapshot_hash};
use crate::error::{Result, StorageError};
use crate::storage::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL,
};
use crate::storage::traits::{Store, StoreStats};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Maximum number of attempts for a write retried on busy/locked errors.
const MAX_RETRY_ATTEMPTS: u32 = 3;
/// Base backoff delay; doubled on each retry.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(20);

/// `SQLite`-based store implementation.
///
/// # Examples
///
/// ```no_run
/// use psl_rs::storage::{SqliteStore, Store};
///
/// let mut store = SqliteStore::open("search.db").unwrap();
/// store.init().unwrap();
/// ```
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens or creates a `SQLite` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or configured.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Database(e.to_string()))?;
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;
        Self::configure(&conn)?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Creates an in-memory `SQLite` database, useful for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        Self::configure(&conn)?;
        Ok(Self { conn, path: None })
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;
        conn.busy_timeout(Duration::from_millis(5_000))
            .map_err(StorageError::from)?;
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Returns the database path (`None` for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Runs a fallible write, retrying up to [`MAX_RETRY_ATTEMPTS`] times with
    /// exponential backoff if `SQLite` reports the database busy or locked.
    fn with_retry<T>(&self, mut op: impl FnMut(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            match op(&self.conn) {
                Ok(value) => return Ok(value),
                Err(err) if is_busy_or_locked(&err) && attempt + 1 < MAX_RETRY_ATTEMPTS => {
                    thread::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt));
                    attempt += 1;
                }
                Err(err) if is_busy_or_locked(&err) => {
                    return Err(StorageError::Busy {
                        reason: err.to_string(),
                        attempts: attempt + 1,
                    }
                    .into());
                }
                Err(err) => return Err(StorageError::from(err).into()),
            }
        }
    }

    fn get_schema_version(&self) -> Result<Option<u32>> {
        let version: Option<String> = self
            .conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;
        Ok(version.and_then(|v| v.parse().ok()))
    }

    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn
            .execute(SET_VERSION_SQL, params![version.to_string()])
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<Chunk> {
        Ok(Chunk {
            chunk_id: row.get(0)?,
            doc_id: row.get(1)?,
            chunk_text: row.get(2)?,
            start_offset: row.get::<_, i64>(3)? as usize,
            end_offset: row.get::<_, i64>(4)? as usize,
            chunk_index: row.get::<_, i64>(5)? as usize,
            page: row.get::<_, Option<i64>>(6)?.map(|p| p as u32),
            section: row.get(7)?,
        })
    }

    fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
        Ok(Document {
            doc_id: row.get(0)?,
            source_path: row.get(1)?,
            source_type: row.get(2)?,
            title: row.get(3)?,
            content_hash: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn row_to_manifest(row: &rusqlite::Row) -> rusqlite::Result<IndexManifest> {
        Ok(IndexManifest {
            index_id: row.get(0)?,
            model_name: row.get(1)?,
            dim: row.get::<_, i64>(2)? as usize,
            chunk_count: row.get::<_, i64>(3)? as usize,
            chunk_snapshot_hash: row.get(4)?,
            index_file_path: row.get(5)?,
            active: row.get::<_, i64>(6)? != 0,
            created_at: row.get(7)?,
        })
    }

    #[allow(clippy::cast_possible_wrap)]
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

fn is_busy_or_locked(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(ffi_err, _)
            if matches!(
                ffi_err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            )
    )
}

impl Store for SqliteStore {
    fn init(&mut self) -> Result<()> {
        let is_init: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;

        if is_init == 0 {
            self.conn
                .execute_batch(SCHEMA_SQL)
                .map_err(|e| StorageError::Migration(e.to_string()))?;
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
            return Ok(());
        }

        let version = self.get_schema_version()?.unwrap_or(0);
        if version != CURRENT_SCHEMA_VERSION {
            let migrations = crate::storage::schema::get_migrations_from(version);
            if migrations.is_empty() {
                return Err(StorageError::SchemaMismatch {
                    found: version,
                    expected: CURRENT_SCHEMA_VERSION,
                }
                .into());
            }
            for migration in migrations {
                self.conn
                    .execute_batch(migration.sql)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
            }
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        }

        Ok(())
    }

    fn is_initialized(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    fn reset(&mut self) -> Result<()> {
        self.with_retry(|conn| {
            conn.execute_batch(
                "DELETE FROM runs;
                 DELETE FROM index_manifests;
                 DELETE FROM embeddings;
                 DELETE FROM chunks;
                 DELETE FROM documents;",
            )
        })
    }

    fn insert_document(&mut self, document: &Document) -> Result<(i64, bool)> {
        if let Some(existing) = self.get_document_by_hash(&document.content_hash)? {
            return Ok((existing.doc_id, false));
        }

        let created_at = Self::now();
        let doc_id = self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO documents (source_path, source_type, title, content_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    document.source_path,
                    document.source_type,
                    document.title,
                    document.content_hash,
                    created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok((doc_id, true))
    }

    fn get_document(&self, doc_id: i64) -> Result<Option<Document>> {
        self.conn
            .query_row(
                "SELECT doc_id, source_path, source_type, title, content_hash, created_at
                 FROM documents WHERE doc_id = ?1",
                params![doc_id],
                Self::row_to_document,
            )
            .optional()
            .map_err(|e| StorageError::from(e).into())
    }

    fn get_document_by_hash(&self, content_hash: &str) -> Result<Option<Document>> {
        self.conn
            .query_row(
                "SELECT doc_id, source_path, source_type, title, content_hash, created_at
                 FROM documents WHERE content_hash = ?1",
                params![content_hash],
                Self::row_to_document,
            )
            .optional()
            .map_err(|e| StorageError::from(e).into())
    }

    fn document_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count as usize)
    }

    fn insert_chunks(&mut self, chunks: &[Chunk]) -> Result<Vec<i64>> {
        self.with_retry(|conn| {
            let tx = conn.unchecked_transaction()?;
            let mut ids = Vec::with_capacity(chunks.len());
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO chunks (doc_id, chunk_text, start_offset, end_offset, chunk_index, page, section)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for chunk in chunks {
                    stmt.execute(params![
                        chunk.doc_id,
                        chunk.chunk_text,
                        chunk.start_offset as i64,
                        chunk.end_offset as i64,
                        chunk.chunk_index as i64,
                        chunk.page,
                        chunk.section,
                    ])?;
                    ids.push(tx.last_insert_rowid());
                }
            }
            tx.commit()?;
            Ok(ids)
        })
    }

    fn get_chunks_for_document(&self, doc_id: i64) -> Result<Vec<Chunk>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT chunk_id, doc_id, chunk_text, start_offset, end_offset, chunk_index, page, section
                 FROM chunks WHERE doc_id = ?1 ORDER BY chunk_index ASC",
            )
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map(params![doc_id], Self::row_to_chunk)
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(rows)
    }

    fn get_all_chunks(&self) -> Result<Vec<Chunk>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT chunk_id, doc_id, chunk_text, start_offset, end_offset, chunk_index, page, section
                 FROM chunks ORDER BY chunk_id ASC",
            )
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map([], Self::row_to_chunk)
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(rows)
    }

    fn get_chunks_by_ids(&self, ids: &[i64]) -> Result<Vec<Chunk>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT chunk_id, doc_id, chunk_text, start_offset, end_offset, chunk_index, page, section
             FROM chunks WHERE chunk_id IN ({placeholders})"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(StorageError::from)?;
        let params = rusqlite::params_from_iter(ids.iter());
        let by_id = stmt
            .query_map(params, Self::row_to_chunk)
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?
            .into_iter()
            .map(|c| (c.chunk_id, c))
            .collect::<std::collections::HashMap<_, _>>();

        Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
    }

    fn chunk_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count as usize)
    }

    fn chunk_snapshot_hash(&self) -> Result<String> {
        let mut stmt = self
            .conn
            .prepare("SELECT chunk_id FROM chunks")
            .map_err(StorageError::from)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(chunk_snapshot_hash(&ids))
    }

    fn search_fts(&self, fts_expression: &str, limit: usize) -> Result<Vec<(i64, f64)>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT rowid, -bm25(chunks_fts) as score
                 FROM chunks_fts
                 WHERE chunks_fts MATCH ?1
                 ORDER BY score DESC
                 LIMIT ?2",
            )
            .map_err(StorageError::from)?;

        let rows = stmt
            .query_map(params![fts_expression, limit as i64], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        Ok(rows)
    }

    fn rewrite_embeddings(&mut self, rows: &[(i64, String, Vec<f32>)]) -> Result<()> {
        self.with_retry(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM embeddings", [])?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO embeddings (chunk_id, model_name, dim, vector) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (chunk_id, model_name, vector) in rows {
                    let bytes = vector
                        .iter()
                        .flat_map(|f| f.to_le_bytes())
                        .collect::<Vec<u8>>();
                    stmt.execute(params![chunk_id, model_name, vector.len() as i64, bytes])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn get_all_embeddings(&self) -> Result<Vec<(i64, Vec<f32>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT chunk_id, vector FROM embeddings")
            .map_err(StorageError::from)?;

        let rows = stmt
            .query_map([], |row| {
                let chunk_id: i64 = row.get(0)?;
                let bytes: Vec<u8> = row.get(1)?;
                let vector = bytes
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect();
                Ok((chunk_id, vector))
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        Ok(rows)
    }

    fn embedding_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count as usize)
    }

    fn activate_manifest(&mut self, manifest: &IndexManifest) -> Result<i64> {
        let created_at = Self::now();
        self.with_retry(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("UPDATE index_manifests SET active = 0 WHERE active = 1", [])?;
            tx.execute(
                "INSERT INTO index_manifests
                     (model_name, dim, chunk_count, chunk_snapshot_hash, index_file_path, active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
                params![
                    manifest.model_name,
                    manifest.dim as i64,
                    manifest.chunk_count as i64,
                    manifest.chunk_snapshot_hash,
                    manifest.index_file_path,
                    created_at,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(id)
        })
    }

    fn get_active_manifest(&self) -> Result<Option<IndexManifest>> {
        self.conn
            .query_row(
                "SELECT index_id, model_name, dim, chunk_count, chunk_snapshot_hash, index_file_path, active, created_at
                 FROM index_manifests WHERE active = 1 LIMIT 1",
                [],
                Self::row_to_manifest,
            )
            .optional()
            .map_err(|e| StorageError::from(e).into())
    }

    fn log_run(&mut self, run: &RunRecord) -> Result<()> {
        let trace_json = serde_json::to_string(&run.tool_trace).map_err(StorageError::from)?;
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO runs (run_id, query, intent, tool_trace, latency_ms, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    run.run_id,
                    run.query,
                    run.intent,
                    trace_json,
                    run.latency_ms as i64,
                    run.created_at,
                ],
            )?;
            Ok(())
        })
    }

    fn stats(&self) -> Result<StoreStats> {
        let document_count = self.document_count()?;
        let chunk_count = self.chunk_count()?;
        let embedding_count = self.embedding_count()?;
        let has_active_manifest = self.get_active_manifest()?.is_some();
        let schema_version = self.get_schema_version()?.unwrap_or(0);
        let db_size = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len());

        Ok(StoreStats {
            document_count,
            chunk_count,
            embedding_count,
            has_active_manifest,
            schema_version,
            db_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Document;

    fn new_store() -> SqliteStore {
        let mut store = SqliteStore::in_memory().expect("open");
        store.init().expect("init");
        store
    }

    #[test]
    fn insert_document_is_idempotent_by_content_hash() {
        let mut store = new_store();
        let doc = Document::new(
            "notes.md".to_string(),
            "markdown".to_string(),
            "notes".to_string(),
            "hash-a".to_string(),
        );
        let (id1, inserted1) = store.insert_document(&doc).expect("insert");
        let (id2, inserted2) = store.insert_document(&doc).expect("insert again");
        assert!(inserted1);
        assert!(!inserted2);
        assert_eq!(id1, id2);
        assert_eq!(store.document_count().expect("count"), 1);
    }

    #[test]
    fn insert_chunks_mirrors_to_fts() {
        let mut store = new_store();
        let doc = Document::new(
            "notes.md".to_string(),
            "markdown".to_string(),
            "notes".to_string(),
            "hash-b".to_string(),
        );
        let (doc_id, _) = store.insert_document(&doc).expect("insert doc");
        let chunk = Chunk::new(doc_id, "reciprocal rank fusion merges lists".to_string(), 0, 36, 0);
        let ids = store.insert_chunks(&[chunk]).expect("insert chunks");
        assert_eq!(ids.len(), 1);

        let hits = store
            .search_fts("\"reciprocal\" OR \"fusion\"", 10)
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, ids[0]);
    }

    #[test]
    fn get_chunks_by_ids_preserves_caller_order() {
        let mut store = new_store();
        let doc = Document::new(
            "a.md".to_string(),
            "markdown".to_string(),
            "a".to_string(),
            "hash-c".to_string(),
        );
        let (doc_id, _) = store.insert_document(&doc).expect("insert doc");
        let chunks = vec![
            Chunk::new(doc_id, "first".to_string(), 0, 5, 0),
            Chunk::new(doc_id, "second".to_string(), 5, 11, 1),
            Chunk::new(doc_id, "third".to_string(), 11, 16, 2),
        ];
        let ids = store.insert_chunks(&chunks).expect("insert");
        let reordered = [ids[2], ids[0], ids[1]];
        let fetched = store.get_chunks_by_ids(&reordered).expect("fetch");
        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched[0].chunk_text, "third");
        assert_eq!(fetched[1].chunk_text, "first");
        assert_eq!(fetched[2].chunk_text, "second");
    }

    #[test]
    fn activate_manifest_deactivates_previous() {
        let mut store = new_store();
        let first = IndexManifest {
            index_id: 0,
            model_name: "m1".to_string(),
            dim: 4,
            chunk_count: 0,
            chunk_snapshot_hash: "h1".to_string(),
            index_file_path: "idx1.bin".to_string(),
            active: true,
            created_at: 0,
        };
        store.activate_manifest(&first).expect("activate 1");
        let second = IndexManifest {
            model_name: "m2".to_string(),
            chunk_snapshot_hash: "h2".to_string(),
            index_file_path: "idx2.bin".to_string(),
            ..first.clone()
        };
        store.activate_manifest(&second).expect("activate 2");

        let active = store.get_active_manifest().expect("get").expect("some");
        assert_eq!(active.model_name, "m2");

        let count: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM index_manifests WHERE active = 1", [], |r| r.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn chunk_snapshot_hash_reflects_current_chunks() {
        let mut store = new_store();
        let empty_hash = store.chunk_snapshot_hash().expect("hash");
        let doc = Document::new(
            "a.md".to_string(),
            "markdown".to_string(),
            "a".to_string(),
            "hash-d".to_string(),
        );
        let (doc_id, _) = store.insert_document(&doc).expect("insert doc");
        store
            .insert_chunks(&[Chunk::new(doc_id, "x".to_string(), 0, 1, 0)])
            .expect("insert chunk");
        let after_hash = store.chunk_snapshot_hash().expect("hash");
        assert_ne!(empty_hash, after_hash);
    }

    #[test]
    fn reset_clears_documents_and_chunks_but_keeps_schema() {
        let mut store = new_store();
        let doc = Document::new(
            "a.md".to_string(),
            "markdown".to_string(),
            "a".to_string(),
            "hash-e".to_string(),
        );
        store.insert_document(&doc).expect("insert");
        store.reset().expect("reset");
        assert_eq!(store.document_count().expect("count"), 0);
        assert!(store.is_initialized().expect("initialized"));
    }
}
