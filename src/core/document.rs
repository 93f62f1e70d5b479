//! Document representation.
//!
//! A `Document` is the corpus-level unit ingestion inserts; `doc_id` is
//! derived from `content_hash` so re-ingesting the same file is a no-op.

use serde::{Deserialize, Serialize};

/// A single ingested document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable id, deterministic from `content_hash`.
    pub doc_id: i64,
    /// Path the document was read from.
    pub source_path: String,
    /// Coarse content-type label (`"text"`, `"markdown"`, ...).
    pub source_type: String,
    /// Human-readable title, defaulting to the file name.
    pub title: String,
    /// SHA-256 content hash, hex-encoded.
    pub content_hash: String,
    /// Unix timestamp of insertion.
    pub created_at: i64,
}

impl Document {
    /// Builds a `Document` ready for insertion; `doc_id` is assigned by the store.
    #[must_use]
    pub fn new(source_path: String, source_type: String, title: String, content_hash: String) -> Self {
        Self {
            doc_id: 0,
            source_path,
            source_type,
            title,
            content_hash,
            created_at: current_timestamp(),
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_unassigned_id() {
        let doc = Document::new(
            "notes.md".to_string(),
            "markdown".to_string(),
            "notes".to_string(),
            "abc123".to_string(),
        );
        assert_eq!(doc.doc_id, 0);
        assert_eq!(doc.content_hash, "abc123");
    }
}
