//! Lexical retriever: full-text search over stored chunks.

use crate::core::ScoredChunk;
use crate::error::Result;
use crate::storage::Store;
use crate::text::tokenize_deduped_capped;

/// Maximum number of distinct query terms sent to the full-text index.
const MAX_TERMS: usize = 12;

/// Retrieves chunks by full-text search.
///
/// Tokenizes the query into word/digit tokens of at least two characters,
/// dedupes preserving order, caps at [`MAX_TERMS`], and searches with an
/// OR-of-quoted-terms expression. An empty token set returns no results
/// without touching the store.
///
/// # Errors
///
/// Returns an error if the full-text search or chunk lookup fails.
pub fn retrieve(store: &dyn Store, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
    let terms = tokenize_deduped_capped(query, MAX_TERMS);
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    let expression = terms
        .iter()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ");

    let hits = store.search_fts(&expression, k)?;
    if hits.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = hits.iter().map(|(id, _)| *id).collect();
    let chunks = store.get_chunks_by_ids(&ids)?;
    let scores: std::collections::HashMap<i64, f64> = hits.into_iter().collect();

    let mut scored = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let score = scores.get(&chunk.chunk_id).copied().unwrap_or(0.0);
        let doc = store.get_document(chunk.doc_id)?;
        let source_path = doc.map(|d| d.source_path).unwrap_or_default();
        scored.push(ScoredChunk::from_chunk(&chunk, source_path, score));
    }
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chunk, Document};
    use crate::storage::SqliteStore;

    fn store_with_chunks() -> SqliteStore {
        let mut store = SqliteStore::in_memory().expect("open");
        store.init().expect("init");
        let doc = Document::new(
            "notes.md".to_string(),
            "markdown".to_string(),
            "notes".to_string(),
            "hash-lex".to_string(),
        );
        let (doc_id, _) = store.insert_document(&doc).expect("insert doc");
        store
            .insert_chunks(&[
                Chunk::new(doc_id, "reciprocal rank fusion merges rankings".to_string(), 0, 38, 0),
                Chunk::new(doc_id, "the weather today is sunny and warm".to_string(), 38, 74, 1),
            ])
            .expect("insert chunks");
        store
    }

    #[test]
    fn empty_query_returns_no_results() {
        let store = store_with_chunks();
        let results = retrieve(&store, "   ", 5).expect("retrieve");
        assert!(results.is_empty());
    }

    #[test]
    fn matching_query_ranks_relevant_chunk_first() {
        let store = store_with_chunks();
        let results = retrieve(&store, "reciprocal rank fusion", 5).expect("retrieve");
        assert!(!results.is_empty());
        assert!(results[0].chunk_text.contains("reciprocal"));
    }

    #[test]
    fn non_matching_query_returns_empty() {
        let store = store_with_chunks();
        let results = retrieve(&store, "xyzzy plugh", 5).expect("retrieve");
        assert!(results.is_empty());
    }
}
