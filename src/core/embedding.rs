//! Embedding row representation.
//!
//! One row per chunk per active index; `vector_id` indexes into the vector
//! file in insertion order.

use serde::{Deserialize, Serialize};

/// A dense embedding row bound to a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// Dense small integer indexing into the vector file, in insertion order.
    pub vector_id: i64,
    /// Id of the embedded chunk.
    pub chunk_id: i64,
    /// Name of the model that produced this vector.
    pub model_name: String,
    /// Unit-norm embedding vector.
    pub vector: Vec<f32>,
}

impl Embedding {
    /// Dimensionality of the stored vector.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.vector.len()
    }
}
