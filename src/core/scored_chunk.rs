//! Scored chunk, the transient per-query retrieval result unit.

use serde::{Deserialize, Serialize};

/// A chunk annotated with a retrieval score, transient for the life of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// Id of the scored chunk.
    pub chunk_id: i64,
    /// Id of the parent document.
    pub doc_id: i64,
    /// Retriever- or fusion-assigned score; higher is better within a retriever.
    pub score: f64,
    /// Chunk text as stored (already normalized, if ingestion normalized it).
    pub chunk_text: String,
    /// Source path of the parent document, for citation display.
    pub source_path: String,
    /// Optional page number.
    pub page: Option<u32>,
}

impl ScoredChunk {
    /// Builds a scored chunk from a stored [`super::chunk::Chunk`] and document path.
    #[must_use]
    pub fn from_chunk(chunk: &super::chunk::Chunk, source_path: String, score: f64) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            doc_id: chunk.doc_id,
            score,
            chunk_text: chunk.chunk_text.clone(),
            source_path,
            page: chunk.page,
        }
    }
}
