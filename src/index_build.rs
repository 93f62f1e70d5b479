//! Vector index build.
//!
//! Reads every stored chunk, embeds it in batches, rewrites the embeddings
//! table, and atomically activates a new index manifest. Grounded on the
//! original `indexing.py`'s `build_vector_index`, minus the FAISS on-disk
//! index: this crate's vector retriever is brute-force over the embeddings
//! table (`retrieval::vector`), so there is no separate index file to write.

use crate::config::EmbeddingConfig;
use crate::core::{IndexManifest, IndexSummary};
use crate::embedding::{Embedder, embedder_model_tag};
use crate::error::Result;
use crate::storage::Store;
use std::time::Instant;
use tracing::info;

/// Rebuilds the vector index from the store's current chunk set.
///
/// Embeds all chunks in batches of `config.embed_batch_size`, replaces the
/// embeddings table in one transaction, and activates a new manifest bound
/// to the current chunk snapshot hash, deactivating any previous manifest.
///
/// # Errors
///
/// Returns an error if reading chunks, embedding, rewriting embeddings, or
/// activating the manifest fails.
pub fn build_index(store: &mut dyn Store, embedder: &dyn Embedder, config: &EmbeddingConfig) -> Result<IndexSummary> {
    let start = Instant::now();
    let chunks = store.get_all_chunks()?;
    let chunk_ids: Vec<i64> = chunks.iter().map(|c| c.chunk_id).collect();
    let snapshot_hash = store.chunk_snapshot_hash()?;

    let model_tag = embedder_model_tag(embedder);
    let batch_size = config.embed_batch_size.max(1);
    let mut rows: Vec<(i64, String, Vec<f32>)> = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(batch_size) {
        let texts: Vec<&str> = batch.iter().map(|c| c.chunk_text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        for (chunk, vector) in batch.iter().zip(vectors) {
            rows.push((chunk.chunk_id, model_tag.clone(), vector));
        }
        info!(batch_len = batch.len(), total = chunks.len(), "embedded batch");
    }

    store.rewrite_embeddings(&rows)?;

    let manifest = IndexManifest {
        index_id: 0,
        model_name: model_tag.clone(),
        dim: embedder.dim(),
        chunk_count: chunk_ids.len(),
        chunk_snapshot_hash: snapshot_hash,
        index_file_path: String::new(),
        active: true,
        created_at: 0,
    };
    let manifest_id = store.activate_manifest(&manifest)?;

    let build_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(
        chunk_count = chunk_ids.len(),
        dim = embedder.dim(),
        model_name = %config.model_name,
        build_ms,
        "index build complete"
    );

    Ok(IndexSummary {
        chunk_count: chunk_ids.len(),
        dim: embedder.dim(),
        model_name: config.model_name.clone(),
        manifest_id,
        build_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chunk, Document};
    use crate::embedding::FallbackEmbedder;
    use crate::storage::SqliteStore;

    fn seeded_store() -> SqliteStore {
        let mut store = SqliteStore::in_memory().expect("open");
        store.init().expect("init");
        let doc = Document::new(
            "notes.md".to_string(),
            "markdown".to_string(),
            "notes".to_string(),
            "hash-idx".to_string(),
        );
        let (doc_id, _) = store.insert_document(&doc).expect("insert doc");
        store
            .insert_chunks(&[
                Chunk::new(doc_id, "the capital of france is paris".to_string(), 0, 31, 0),
                Chunk::new(doc_id, "the capital of japan is tokyo".to_string(), 31, 60, 1),
            ])
            .expect("insert chunks");
        store
    }

    #[test]
    fn builds_index_and_activates_manifest() {
        let mut store = seeded_store();
        let embedder = FallbackEmbedder::new(32);
        let config = EmbeddingConfig::default();
        let summary = build_index(&mut store, &embedder, &config).expect("build");
        assert_eq!(summary.chunk_count, 2);
        assert_eq!(summary.dim, 32);
        assert_eq!(store.embedding_count().expect("count"), 2);
        let manifest = store.get_active_manifest().expect("manifest").expect("present");
        assert!(manifest.active);
        assert_eq!(manifest.chunk_count, 2);
    }

    #[test]
    fn rebuild_deactivates_previous_manifest() {
        let mut store = seeded_store();
        let embedder = FallbackEmbedder::new(32);
        let config = EmbeddingConfig::default();
        let first = build_index(&mut store, &embedder, &config).expect("first build");
        let second = build_index(&mut store, &embedder, &config).expect("second build");
        assert_ne!(first.manifest_id, second.manifest_id);
        let manifest = store.get_active_manifest().expect("manifest").expect("present");
        assert_eq!(manifest.index_id, second.manifest_id);
    }

    #[test]
    fn empty_store_builds_empty_index() {
        let mut store = SqliteStore::in_memory().expect("open");
        store.init().expect("init");
        let embedder = FallbackEmbedder::new(32);
        let config = EmbeddingConfig::default();
        let summary = build_index(&mut store, &embedder, &config).expect("build");
        assert_eq!(summary.chunk_count, 0);
    }
}
