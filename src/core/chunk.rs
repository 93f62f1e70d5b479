//! Chunk representation.
//!
//! A contiguous text window from a [`super::document::Document`], the unit
//! of retrieval. Offsets index into the **stored** (possibly normalized)
//! chunk text, never the original on-disk document.

use serde::{Deserialize, Serialize};

/// A contiguous text window from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier (assigned by the store).
    pub chunk_id: i64,
    /// Id of the parent document.
    pub doc_id: i64,
    /// Chunk text, normalized the same way the parent document was.
    pub chunk_text: String,
    /// Start offset into the stored document text, inclusive.
    pub start_offset: usize,
    /// End offset into the stored document text, exclusive.
    pub end_offset: usize,
    /// Sequential index within the document (0-based).
    pub chunk_index: usize,
    /// Optional page number, for paginated sources.
    pub page: Option<u32>,
    /// Optional section label.
    pub section: Option<String>,
}

impl Chunk {
    /// Builds a chunk ready for insertion; `chunk_id` is assigned by the store.
    ///
    /// # Panics
    ///
    /// Panics if `start_offset >= end_offset`, or if `end_offset - start_offset`
    /// is smaller than `chunk_text`'s byte length — both are store-level
    /// invariants callers must uphold before insertion.
    #[must_use]
    pub fn new(
        doc_id: i64,
        chunk_text: String,
        start_offset: usize,
        end_offset: usize,
        chunk_index: usize,
    ) -> Self {
        assert!(start_offset < end_offset, "start_offset must be < end_offset");
        assert!(
            end_offset - start_offset >= chunk_text.len(),
            "offset span must cover chunk_text"
        );
        Self {
            chunk_id: 0,
            doc_id,
            chunk_text,
            start_offset,
            end_offset,
            chunk_index,
            page: None,
            section: None,
        }
    }

    /// Returns the chunk text length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunk_text.len()
    }

    /// Returns whether the chunk text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunk_text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chunk_assigns_offsets() {
        let chunk = Chunk::new(1, "hello".to_string(), 0, 5, 0);
        assert_eq!(chunk.doc_id, 1);
        assert_eq!(chunk.start_offset, 0);
        assert_eq!(chunk.end_offset, 5);
        assert_eq!(chunk.len(), 5);
    }

    #[test]
    #[should_panic(expected = "start_offset must be < end_offset")]
    fn rejects_inverted_offsets() {
        let _ = Chunk::new(1, "x".to_string(), 5, 5, 0);
    }
}
