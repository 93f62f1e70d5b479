//! Hybrid retrieval: lexical search, vector search, and reciprocal rank fusion.

pub mod lexical;
pub mod rrf;
pub mod vector;

use crate::core::ScoredChunk;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::storage::Store;
use std::collections::HashMap;

/// Runs lexical and vector retrieval, then fuses them by weighted RRF.
///
/// Candidate pools are widened to `k * 2` before fusion so rank-sensitive
/// fusion has more than `k` items to choose from per list.
///
/// # Errors
///
/// Returns an error if either retriever's underlying store/embedder calls fail.
pub fn retrieve_and_fuse(
    store: &dyn Store,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
    lexical_weight: f64,
    rrf_k: u32,
) -> Result<Vec<ScoredChunk>> {
    let pool = k.saturating_mul(2).max(k);
    let lexical_hits = lexical::retrieve(store, query, pool)?;
    let vector_hits = vector::retrieve(store, embedder, query, pool)?;

    let lexical_ids: Vec<i64> = lexical_hits.iter().map(|c| c.chunk_id).collect();
    let vector_ids: Vec<i64> = vector_hits.iter().map(|c| c.chunk_id).collect();

    let fused = rrf::fuse(&lexical_ids, &vector_ids, lexical_weight, rrf_k);

    // Prefer the lexical payload when a chunk was seen by both retrievers.
    let mut payload: HashMap<i64, ScoredChunk> = HashMap::new();
    for chunk in vector_hits {
        payload.insert(chunk.chunk_id, chunk);
    }
    for chunk in lexical_hits {
        payload.insert(chunk.chunk_id, chunk);
    }

    let results = fused
        .into_iter()
        .take(k)
        .filter_map(|(chunk_id, score)| {
            payload.get(&chunk_id).map(|chunk| ScoredChunk {
                score,
                ..chunk.clone()
            })
        })
        .collect();

    Ok(results)
}
