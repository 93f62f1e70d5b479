//! Error types for `psl` operations.
//!
//! A layered `thiserror` hierarchy: one sub-error enum per subsystem, composed
//! into a single top-level [`Error`].

use thiserror::Error;

/// Result type alias for `psl` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for `psl` operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Store-related errors (schema, database operations).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Retrieval-related errors (lexical/vector search, fusion).
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Extractive synthesis errors.
    #[error("synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Verification gate-chain errors.
    #[error("verification error: {0}")]
    Verification(#[from] VerificationError),

    /// Ingestion pipeline errors.
    #[error("ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid state errors not attributable to any single subsystem.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },
}

/// Store-specific errors (schema, transactions, manifests).
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Store has not been initialized (the `init`/`ingest` path never ran).
    #[error("store not initialized. Run: psl ingest <path>")]
    NotInitialized,

    /// Schema version on disk differs from the version this binary expects.
    #[error("schema version mismatch: store is v{found}, expected v{expected}")]
    SchemaMismatch {
        /// Schema version found on disk.
        found: u32,
        /// Schema version this binary was compiled for.
        expected: u32,
    },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Document not found by id or content hash.
    #[error("document not found: {identifier}")]
    DocumentNotFound {
        /// Document id or content hash that was not found.
        identifier: String,
    },

    /// Chunk not found by id.
    #[error("chunk not found: {id}")]
    ChunkNotFound {
        /// Chunk id that was not found.
        id: i64,
    },

    /// No active index manifest.
    #[error("no active index manifest")]
    NoActiveManifest,

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Write was retried against a busy/locked database and still failed.
    #[error("store busy after {attempts} attempts: {reason}")]
    Busy {
        /// Underlying SQLite error message.
        reason: String,
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Retrieval-specific errors (lexical, vector, fusion).
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Embedder failed to produce a vector for the query.
    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    /// Vector index dimension does not match the embedder's dimension.
    #[error("dimension mismatch: index is {index_dim}, embedder is {embedder_dim}")]
    DimensionMismatch {
        /// Dimension recorded in the active manifest.
        index_dim: usize,
        /// Dimension reported by the configured embedder.
        embedder_dim: usize,
    },

    /// Full-text query rewriting failed.
    #[error("query rewrite failed: {0}")]
    QueryRewriteFailed(String),
}

/// Extractive synthesis errors.
#[derive(Error, Debug)]
pub enum SynthesisError {
    /// An internal invariant (e.g. dense claim ids) was violated.
    #[error("synthesis invariant violated: {0}")]
    InvariantViolated(String),
}

/// Verification gate-chain errors.
#[derive(Error, Debug)]
pub enum VerificationError {
    /// The configured verifier mode is not one of the known modes.
    #[error("unknown verifier mode: {0}")]
    UnknownMode(String),

    /// The conflict-detection regex failed to compile.
    #[error("conflict pattern error: {0}")]
    PatternError(String),
}

/// Ingestion pipeline errors.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// Root path does not exist or is not a directory.
    #[error("invalid ingest root: {path}")]
    InvalidRoot {
        /// The path that was rejected.
        path: String,
    },

    /// Document content could not be normalized.
    #[error("normalization failed for {path}: {reason}")]
    NormalizationFailed {
        /// Path to the offending document.
        path: String,
        /// Reason normalization failed.
        reason: String,
    },

    /// Chunking configuration is invalid (e.g. overlap >= chunk_size).
    #[error("invalid chunk configuration: {reason}")]
    InvalidChunkConfig {
        /// Reason the configuration is invalid.
        reason: String,
    },
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Unknown command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing required argument.
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    /// Output formatting error.
    #[error("output format error: {0}")]
    OutputFormat(String),
}

// Implement From traits for standard library and third-party errors.

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::from(err))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<regex::Error> for VerificationError {
    fn from(err: regex::Error) -> Self {
        Self::PatternError(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(StorageError::Serialization(err.to_string()))
    }
}

impl From<std::string::FromUtf8Error> for IngestionError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::NormalizationFailed {
            path: String::new(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_not_initialized_message() {
        let err = StorageError::NotInitialized;
        assert!(err.to_string().contains("psl ingest"));
    }

    #[test]
    fn document_not_found_carries_identifier() {
        let err = StorageError::DocumentNotFound {
            identifier: "abc123".to_string(),
        };
        assert_eq!(err.to_string(), "document not found: abc123");
    }

    #[test]
    fn schema_mismatch_reports_both_versions() {
        let err = StorageError::SchemaMismatch {
            found: 1,
            expected: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains('1') && msg.contains('2'));
    }

    #[test]
    fn error_from_rusqlite_wraps_as_storage() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: Error = rusqlite_err.into();
        assert!(matches!(err, Error::Storage(StorageError::Database(_))));
    }

    #[test]
    fn error_from_regex_wraps_as_pattern_error() {
        let regex_err = regex::Regex::new("[invalid").unwrap_err();
        let err: VerificationError = regex_err.into();
        assert!(matches!(err, VerificationError::PatternError(_)));
    }

    #[test]
    fn config_error_display() {
        let err = Error::Config {
            message: "unknown key 'bogus'".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: unknown key 'bogus'");
    }

    #[test]
    fn busy_error_reports_attempts() {
        let err = StorageError::Busy {
            reason: "database is locked".to_string(),
            attempts: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains('3'));
    }
}
