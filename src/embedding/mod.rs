//! Embedding generation for vector retrieval.
//!
//! Provides embeddings via `FastEmbed` (when the `fastembed-embeddings`
//! feature is enabled) or a hash-based deterministic fallback.
//!
//! # Feature Flags
//!
//! - `fastembed-embeddings`: Enables `FastEmbed` with all-MiniLM-L6-v2 (384 dimensions)
//! - Without the feature: Uses hash-based fallback (deterministic but not semantic)

mod fallback;

#[cfg(feature = "fastembed-embeddings")]
mod fastembed_impl;

pub use fallback::FallbackEmbedder;

#[cfg(feature = "fastembed-embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;

use crate::config::EmbeddingConfig;
use crate::error::Result;

/// Default embedding dimensionality for the all-MiniLM-L6-v2 model.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Capability trait for embedding backends.
///
/// Implementations must be thread-safe (`Send + Sync`) to support parallel
/// embedding during ingestion and index build.
///
/// # Examples
///
/// ```
/// use psl_rs::embedding::{Embedder, FallbackEmbedder, DEFAULT_DIMENSIONS};
///
/// let embedder = FallbackEmbedder::new(DEFAULT_DIMENSIONS);
/// let embedding = embedder.embed("Hello, world!").unwrap();
/// assert_eq!(embedding.len(), DEFAULT_DIMENSIONS);
/// ```
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensionality this embedder produces.
    fn dim(&self) -> usize;

    /// Embeds a single piece of text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds a batch of texts.
    ///
    /// The default implementation calls [`Embedder::embed`] sequentially;
    /// implementations may override this for batch parallelism.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails for any text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Builds the configured embedder.
///
/// `"fallback"` always succeeds; `"fastembed"` requires the
/// `fastembed-embeddings` feature and falls back with an error otherwise.
///
/// # Errors
///
/// Returns an error if the configured backend is unavailable or fails to
/// initialize.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.backend.as_str() {
        "fallback" => Ok(Box::new(FallbackEmbedder::new(config.embed_dim))),
        #[cfg(feature = "fastembed-embeddings")]
        "fastembed" => Ok(Box::new(FastEmbedEmbedder::new(config)?)),
        #[cfg(not(feature = "fastembed-embeddings"))]
        "fastembed" => Err(crate::error::RetrievalError::EmbeddingFailed(
            "backend 'fastembed' requested but the fastembed-embeddings feature is disabled"
                .to_string(),
        )
        .into()),
        other => Err(crate::error::RetrievalError::EmbeddingFailed(format!(
            "unknown embedding backend: {other}"
        ))
        .into()),
    }
}

/// Computes the inner product of two equal-length vectors.
///
/// Embeddings stored by this crate are unit-normalized, so this is
/// equivalent to cosine similarity. Returns `0.0` on length mismatch.
#[must_use]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Normalizes a vector to unit L2 norm in place. No-op on a zero vector.
pub fn normalize_in_place(vector: &mut [f32]) {
    let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector {
            *value /= magnitude;
        }
    }
}

/// Tag written to and matched against [`crate::core::IndexManifest::model_name`].
///
/// Embedders don't carry a stable model identity (the deterministic fallback
/// embedder least of all), so the manifest binds on dimensionality alone;
/// the index builder and the vector retriever must agree on this tag.
#[must_use]
pub fn embedder_model_tag(embedder: &dyn Embedder) -> String {
    format!("dim-{}", embedder.dim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_product_of_identical_unit_vectors_is_one() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((inner_product(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn inner_product_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(inner_product(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn inner_product_mismatched_lengths_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(inner_product(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn create_fallback_embedder_matches_configured_dim() {
        let config = EmbeddingConfig {
            backend: "fallback".to_string(),
            embed_dim: 64,
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&config).expect("embedder");
        assert_eq!(embedder.dim(), 64);
    }

    #[test]
    fn create_embedder_rejects_unknown_backend() {
        let config = EmbeddingConfig {
            backend: "made-up".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }
}
