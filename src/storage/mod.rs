//! Persistent storage for `psl`: documents, chunks, embeddings, manifests, runs.

pub mod schema;
pub mod sqlite;
pub mod traits;

pub use schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL};
pub use sqlite::SqliteStore;
pub use traits::{Store, StoreStats};

/// Default database file name.
pub const DEFAULT_DB_NAME: &str = "search.db";
/// Default database path, relative to the data directory.
pub const DEFAULT_DB_PATH: &str = ".psl/search.db";
