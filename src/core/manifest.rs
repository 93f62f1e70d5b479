//! Index manifest.
//!
//! Binds a vector index snapshot to a chunk-set hash. At most one manifest
//! is active at a time; the retriever refuses to serve vector results when
//! the active manifest no longer matches the store's current chunk snapshot.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Describes one built vector index snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Stable id for this manifest row.
    pub index_id: i64,
    /// Name of the model used to build the embeddings.
    pub model_name: String,
    /// Embedding dimensionality.
    pub dim: usize,
    /// Number of chunks covered at build time.
    pub chunk_count: usize,
    /// SHA-256 over sorted chunk ids (hex-encoded), separated by `\n`.
    pub chunk_snapshot_hash: String,
    /// Path to the vector index file this manifest describes.
    pub index_file_path: String,
    /// Whether this manifest is the currently active one.
    pub active: bool,
    /// Unix timestamp of creation.
    pub created_at: i64,
}

impl IndexManifest {
    /// Returns whether this manifest matches a freshly computed snapshot hash.
    #[must_use]
    pub fn matches_snapshot(&self, current_snapshot_hash: &str) -> bool {
        self.chunk_snapshot_hash == current_snapshot_hash
    }
}

/// Computes the chunk snapshot hash: SHA-256 over sorted chunk ids joined by `\n`.
#[must_use]
pub fn chunk_snapshot_hash(chunk_ids: &[i64]) -> String {
    let mut sorted = chunk_ids.to_vec();
    sorted.sort_unstable();
    let joined = sorted
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    sha256_hex(joined.as_bytes())
}

/// Computes a hex-encoded SHA-256 digest of `data`.
///
/// Shared by the manifest snapshot hash and document content hashing.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
