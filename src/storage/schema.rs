//! Database schema definitions.
//!
//! Versioned `SQLite` schema for the document/chunk/embedding/manifest/run
//! store. Readers refuse to open a store whose on-disk version differs from
//! `CURRENT_SCHEMA_VERSION` until an explicit migration runs.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// SQL schema for initial database setup.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Documents (corpus-level units, content-addressed)
CREATE TABLE IF NOT EXISTS documents (
    doc_id INTEGER PRIMARY KEY,
    source_path TEXT NOT NULL,
    source_type TEXT NOT NULL,
    title TEXT NOT NULL,
    content_hash TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(content_hash);

-- Chunks (retrieval units, offsets index into the stored/normalized text)
CREATE TABLE IF NOT EXISTS chunks (
    chunk_id INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_id INTEGER NOT NULL,
    chunk_text TEXT NOT NULL,
    start_offset INTEGER NOT NULL,
    end_offset INTEGER NOT NULL,
    chunk_index INTEGER NOT NULL,
    page INTEGER,
    section TEXT,
    FOREIGN KEY (doc_id) REFERENCES documents(doc_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chunks_doc ON chunks(doc_id);
CREATE INDEX IF NOT EXISTS idx_chunks_order ON chunks(doc_id, chunk_index);

-- FTS5 full-text mirror of chunks.chunk_text
CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    chunk_text,
    content='chunks',
    content_rowid='chunk_id',
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
    INSERT INTO chunks_fts(rowid, chunk_text) VALUES (new.chunk_id, new.chunk_text);
END;

CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, chunk_text) VALUES('delete', old.chunk_id, old.chunk_text);
END;

CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, chunk_text) VALUES('delete', old.chunk_id, old.chunk_text);
    INSERT INTO chunks_fts(rowid, chunk_text) VALUES (new.chunk_id, new.chunk_text);
END;

-- Embeddings (rewritten wholesale on every index build)
CREATE TABLE IF NOT EXISTS embeddings (
    vector_id INTEGER PRIMARY KEY AUTOINCREMENT,
    chunk_id INTEGER NOT NULL,
    model_name TEXT NOT NULL,
    dim INTEGER NOT NULL,
    vector BLOB NOT NULL,
    FOREIGN KEY (chunk_id) REFERENCES chunks(chunk_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_embeddings_chunk ON embeddings(chunk_id);

-- Index manifests (at most one active at a time, enforced in application code)
CREATE TABLE IF NOT EXISTS index_manifests (
    index_id INTEGER PRIMARY KEY AUTOINCREMENT,
    model_name TEXT NOT NULL,
    dim INTEGER NOT NULL,
    chunk_count INTEGER NOT NULL,
    chunk_snapshot_hash TEXT NOT NULL,
    index_file_path TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_manifests_active ON index_manifests(active);

-- Runs (append-only query trace log)
CREATE TABLE IF NOT EXISTS runs (
    run_id TEXT PRIMARY KEY,
    query TEXT NOT NULL,
    intent TEXT NOT NULL,
    tool_trace TEXT NOT NULL,
    latency_ms INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);
";

/// SQL to check if the schema has been initialized.
pub const CHECK_SCHEMA_SQL: &str = r"
SELECT COUNT(*) FROM sqlite_master
WHERE type='table' AND name='schema_meta';
";

/// SQL to get the schema version.
pub const GET_VERSION_SQL: &str = r"
SELECT value FROM schema_meta WHERE key = 'version';
";

/// SQL to set the schema version.
pub const SET_VERSION_SQL: &str = r"
INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('version', ?);
";

/// A schema migration from one version to the next.
pub struct Migration {
    /// Version this migration upgrades from.
    pub from_version: u32,
    /// Version this migration upgrades to.
    pub to_version: u32,
    /// SQL statements to execute.
    pub sql: &'static str,
}

/// Available migrations; empty until `CURRENT_SCHEMA_VERSION` advances past 1.
pub const MIGRATIONS: &[Migration] = &[];

/// Gets migrations needed to upgrade from a given version.
#[must_use]
pub fn get_migrations_from(current_version: u32) -> Vec<&'static Migration> {
    MIGRATIONS
        .iter()
        .filter(|m| m.from_version >= current_version && m.to_version <= CURRENT_SCHEMA_VERSION)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_sql_declares_every_table() {
        for table in [
            "documents",
            "chunks",
            "chunks_fts",
            "embeddings",
            "index_manifests",
            "runs",
        ] {
            assert!(SCHEMA_SQL.contains(table), "missing table: {table}");
        }
    }

    #[test]
    fn migrations_are_ordered() {
        for migration in MIGRATIONS {
            assert!(migration.to_version > migration.from_version);
        }
    }

    #[test]
    fn get_migrations_from_fresh_install_is_empty_at_v1() {
        assert!(get_migrations_from(0).is_empty());
    }
}
