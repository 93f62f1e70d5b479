//! Vector retriever: brute-force inner-product search over the embedding table.
//!
//! Brute-force exact search is acceptable at this tool's corpus scale; an
//! alternative ANN backend could be substituted behind [`retrieve`]'s
//! signature without changing retrieval semantics.

use crate::core::{IndexManifest, ScoredChunk};
use crate::embedding::{Embedder, embedder_model_tag, inner_product};
use crate::error::Result;
use crate::storage::Store;

/// Retrieves chunks by embedding the query and ranking stored embeddings by
/// inner product.
///
/// Returns an empty result (rather than an error) whenever the active
/// manifest is missing or stale, per the retriever's "refuse silently"
/// contract — a stale vector index should not block lexical-only service.
///
/// # Errors
///
/// Returns an error if the store or embedder itself fails (not for a stale
/// or absent manifest, which yields `Ok(vec![])`).
pub fn retrieve(
    store: &dyn Store,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
) -> Result<Vec<ScoredChunk>> {
    let Some(manifest) = store.get_active_manifest()? else {
        return Ok(Vec::new());
    };

    if !manifest_is_usable(store, &manifest, embedder)? {
        return Ok(Vec::new());
    }

    let query_vector = embedder.embed(query)?;
    let all_embeddings = store.get_all_embeddings()?;
    if all_embeddings.is_empty() {
        return Ok(Vec::new());
    }

    let mut ranked: Vec<(i64, f64)> = all_embeddings
        .iter()
        .map(|(chunk_id, vector)| {
            (*chunk_id, f64::from(inner_product(&query_vector, vector)))
        })
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(k);

    if ranked.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = ranked.iter().map(|(id, _)| *id).collect();
    let chunks = store.get_chunks_by_ids(&ids)?;
    let scores: std::collections::HashMap<i64, f64> = ranked.into_iter().collect();

    let mut scored = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let score = scores.get(&chunk.chunk_id).copied().unwrap_or(0.0);
        let doc = store.get_document(chunk.doc_id)?;
        let source_path = doc.map(|d| d.source_path).unwrap_or_default();
        scored.push(ScoredChunk::from_chunk(&chunk, source_path, score));
    }
    Ok(scored)
}

/// Checks the manifest-to-store binding: model/dim agreement, row-count
/// agreement, and a matching chunk snapshot hash.
fn manifest_is_usable(
    store: &dyn Store,
    manifest: &IndexManifest,
    embedder: &dyn Embedder,
) -> Result<bool> {
    if manifest.model_name != embedder_model_tag(embedder) || manifest.dim != embedder.dim() {
        return Ok(false);
    }

    let embedding_count = store.embedding_count()?;
    if embedding_count != manifest.chunk_count {
        return Ok(false);
    }

    let current_hash = store.chunk_snapshot_hash()?;
    Ok(manifest.matches_snapshot(&current_hash))
}
