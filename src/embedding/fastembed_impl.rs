//! `FastEmbed`-based semantic embedder.
//!
//! Real semantic embeddings via fastembed-rs. Only compiled when the
//! `fastembed-embeddings` feature is enabled.

use crate::config::EmbeddingConfig;
use crate::embedding::Embedder;
use crate::error::{RetrievalError, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::OnceLock;

/// Thread-safe singleton for the embedding model, lazily initialized on first use.
static EMBEDDING_MODEL: OnceLock<std::sync::Mutex<fastembed::TextEmbedding>> = OnceLock::new();

/// `FastEmbed` embedder using a configured sentence-transformers model.
///
/// # Examples
///
/// ```ignore
/// use psl_rs::config::EmbeddingConfig;
/// use psl_rs::embedding::FastEmbedEmbedder;
///
/// let embedder = FastEmbedEmbedder::new(&EmbeddingConfig::default())?;
/// let embedding = embedder.embed("Hello, world!")?;
/// assert_eq!(embedding.len(), 384);
/// ```
pub struct FastEmbedEmbedder {
    dim: usize,
}

impl FastEmbedEmbedder {
    /// Creates a new `FastEmbed` embedder. The model is loaded lazily on first
    /// `embed` call to preserve cold-start time.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.embed_dim` is zero.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        if config.embed_dim == 0 {
            return Err(RetrievalError::EmbeddingFailed(
                "embed_dim must be nonzero for the fastembed backend".to_string(),
            )
            .into());
        }
        Ok(Self {
            dim: config.embed_dim,
        })
    }

    fn get_model() -> Result<&'static std::sync::Mutex<fastembed::TextEmbedding>> {
        if let Some(model) = EMBEDDING_MODEL.get() {
            return Ok(model);
        }

        let options = fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false);

        let model = fastembed::TextEmbedding::try_new(options).map_err(|e| {
            RetrievalError::EmbeddingFailed(format!("failed to load embedding model: {e}"))
        })?;

        let _ = EMBEDDING_MODEL.set(std::sync::Mutex::new(model));

        EMBEDDING_MODEL.get().ok_or_else(|| {
            RetrievalError::EmbeddingFailed("model initialization race condition".to_string())
                .into()
        })
    }
}

impl Embedder for FastEmbedEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(RetrievalError::EmbeddingFailed("cannot embed empty text".to_string()).into());
        }

        let model = Self::get_model()?;
        let mut model = model
            .lock()
            .map_err(|e| RetrievalError::EmbeddingFailed(format!("failed to lock model: {e}")))?;

        let texts = [text];

        // ONNX runtime can panic on malformed inputs; isolate it so one bad
        // document cannot take down a whole ingest run.
        let result = catch_unwind(AssertUnwindSafe(|| model.embed(texts.to_vec(), None)));

        let embeddings = result
            .map_err(|panic_info| {
                let panic_msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                RetrievalError::EmbeddingFailed(format!("onnx runtime panic: {panic_msg}"))
            })?
            .map_err(|e| RetrievalError::EmbeddingFailed(format!("embedding failed: {e}")))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::EmbeddingFailed("no embedding returned".to_string()).into())
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.is_empty()) {
            return Err(RetrievalError::EmbeddingFailed("cannot embed empty text".to_string()).into());
        }

        let model = Self::get_model()?;
        let mut model = model
            .lock()
            .map_err(|e| RetrievalError::EmbeddingFailed(format!("failed to lock model: {e}")))?;

        let owned = texts.iter().map(|t| (*t).to_string()).collect::<Vec<_>>();
        let result = catch_unwind(AssertUnwindSafe(|| model.embed(owned, None)));

        result
            .map_err(|panic_info| {
                let panic_msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                RetrievalError::EmbeddingFailed(format!("onnx runtime panic: {panic_msg}")).into()
            })?
            .map_err(|e| RetrievalError::EmbeddingFailed(format!("batch embedding failed: {e}")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_dim_config() {
        let config = EmbeddingConfig {
            embed_dim: 0,
            ..EmbeddingConfig::default()
        };
        assert!(FastEmbedEmbedder::new(&config).is_err());
    }

    #[test]
    fn dim_reports_configured_value() {
        let config = EmbeddingConfig {
            embed_dim: 384,
            ..EmbeddingConfig::default()
        };
        let embedder = FastEmbedEmbedder::new(&config).expect("construct");
        assert_eq!(embedder.dim(), 384);
    }

    #[test]
    #[ignore = "requires fastembed model download"]
    fn embed_success() {
        let embedder = FastEmbedEmbedder::new(&EmbeddingConfig::default()).unwrap();
        let result = embedder.embed("Hello, world!");
        assert!(result.is_ok());
        assert_eq!(result.unwrap().len(), 384);
    }

    #[test]
    fn embed_empty_fails() {
        let embedder = FastEmbedEmbedder::new(&EmbeddingConfig::default()).unwrap();
        assert!(embedder.embed("").is_err());
    }

    #[test]
    fn embed_batch_empty_list_is_empty() {
        let embedder = FastEmbedEmbedder::new(&EmbeddingConfig::default()).unwrap();
        let result = embedder.embed_batch(&[]).unwrap();
        assert!(result.is_empty());
    }
}
