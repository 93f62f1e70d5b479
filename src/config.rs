//! Configuration for `psl`.
//!
//! A sealed, enumerated structure covering every recognized option. Layered:
//! built-in default → optional file → environment variable override. Unknown
//! keys in a config file are rejected rather than silently ignored.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Default data directory, relative to the current working directory.
pub const DEFAULT_DATA_DIR: &str = ".psl";

/// Top-level, sealed configuration for a `psl` run.
///
/// All fields are recognized options from the external interface surface;
/// there is no catch-all map, so an unknown key in a config file is a
/// deserialization error rather than silently ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Storage options.
    pub storage: StorageConfig,
    /// Ingestion advisory options.
    pub ingestion: IngestionConfig,
    /// Embedding backend options.
    pub embedding: EmbeddingConfig,
    /// Retrieval options.
    pub retrieval: RetrievalConfig,
    /// Extractive synthesis thresholds.
    pub answering: AnsweringConfig,
    /// Verifier gate thresholds.
    pub verifier: VerifierConfig,
    /// Router options.
    pub router: RouterConfig,
    /// Ambient structured logging options.
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            ingestion: IngestionConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            answering: AnsweringConfig::default(),
            verifier: VerifierConfig::default(),
            router: RouterConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Storage location options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StorageConfig {
    /// Root directory for all `psl` state.
    pub data_dir: PathBuf,
    /// Path to the `SQLite` database file.
    pub db_path: PathBuf,
    /// Directory holding the vector index file(s).
    pub index_dir: PathBuf,
    /// Path to the active vector index binary file.
    pub index_file_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from(DEFAULT_DATA_DIR);
        Self {
            db_path: data_dir.join("search.db"),
            index_dir: data_dir.join("indexes"),
            index_file_path: data_dir.join("indexes").join("chunks.idx"),
            data_dir,
        }
    }
}

/// Ingestion advisory options (the reference producer honors all of these).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct IngestionConfig {
    /// Chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between adjacent chunks, in characters.
    pub chunk_overlap: usize,
    /// Maximum document size in bytes before it is skipped.
    pub max_doc_bytes: u64,
    /// Maximum PDF page count before a PDF is skipped (reserved for a future loader).
    pub max_pdf_pages: u32,
    /// File suffixes the walker refuses to read (lowercase, leading dot).
    pub blocked_suffixes: BTreeSet<String>,
    /// Whether to casefold and collapse whitespace before chunking.
    pub normalize_text: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_500,
            chunk_overlap: 150,
            max_doc_bytes: 30_000_000,
            max_pdf_pages: 200,
            blocked_suffixes: [".json", ".csv", ".tsv", ".png", ".zip"]
                .into_iter()
                .map(String::from)
                .collect(),
            normalize_text: true,
        }
    }
}

/// Embedding backend options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EmbeddingConfig {
    /// Backend identifier (`"fastembed"` or `"fallback"`).
    pub backend: String,
    /// Model name (meaningful for the `fastembed` backend).
    pub model_name: String,
    /// Optional model revision/pin.
    pub model_revision: Option<String>,
    /// Embedding vector dimensionality.
    pub embed_dim: usize,
    /// Batch size used when embedding during ingestion/index-build.
    pub embed_batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "fallback".to_string(),
            model_name: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_revision: None,
            embed_dim: 384,
            embed_batch_size: 64,
        }
    }
}

/// Retrieval options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetrievalConfig {
    /// Default number of chunks to retrieve when the router does not override it.
    pub default_top_k: usize,
    /// Reciprocal rank fusion smoothing constant.
    pub rrf_k: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 8,
            rrf_k: 60,
        }
    }
}

/// Extractive synthesis thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AnsweringConfig {
    /// Minimum query-token overlap required to keep a candidate sentence.
    pub answer_min_topic_overlap: usize,
    /// Minimum supportability score required to keep a candidate sentence.
    pub answer_min_supportability: f64,
    /// Minimum citation span quality accepted for an emitted citation.
    pub answer_min_citation_span_quality: f64,
}

impl Default for AnsweringConfig {
    fn default() -> Self {
        Self {
            answer_min_topic_overlap: 1,
            answer_min_supportability: 0.35,
            answer_min_citation_span_quality: 0.40,
        }
    }
}

/// Verifier gate thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct VerifierConfig {
    /// Minimum fraction of claims with sufficient query alignment.
    pub query_alignment_min: f64,
    /// Minimum fraction of critical query tokens covered by the draft.
    pub critical_coverage_min: f64,
    /// Minimum fraction of claims with adequate support.
    pub claim_support_min: f64,
    /// Minimum citation span quality floor used by the citation-gap gate.
    pub citation_span_quality_min: f64,
    /// Minimum aggregate score required for the `supported` verdict.
    pub aggregate_min: f64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            query_alignment_min: 0.30,
            critical_coverage_min: 0.50,
            claim_support_min: 0.60,
            citation_span_quality_min: 0.45,
            aggregate_min: 0.55,
        }
    }
}

/// Router options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RouterConfig {
    /// Optional path to a JSON file overriding the built-in intent policy table.
    pub policy_path: Option<PathBuf>,
    /// Token-count cutoff below which a query is treated as a short lookup.
    pub short_lookup_token_cutoff: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            policy_path: None,
            short_lookup_token_cutoff: 4,
        }
    }
}

/// Ambient structured logging options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    pub log_level: String,
    /// Log line format.
    pub log_format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

/// Structured log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Line-delimited JSON (the default for non-interactive use).
    Json,
    /// Human-readable text (convenient for a terminal).
    Text,
}

impl Config {
    /// Loads configuration by layering built-in defaults, an optional file,
    /// then environment variable overrides, in that order.
    ///
    /// # Errors
    ///
    /// Returns an error if `file_path` is given but unreadable, or contains
    /// an unknown key / malformed value.
    pub fn load(file_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = file_path {
            let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
                message: format!("cannot read config file {}: {e}", path.display()),
            })?;
            config = if path.extension().is_some_and(|ext| ext == "json") {
                serde_json::from_str(&contents).map_err(|e| Error::Config {
                    message: format!("invalid config file {}: {e}", path.display()),
                })?
            } else {
                toml_like_json_fallback(&contents, path)?
            };
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies `PSL_*` environment variable overrides on top of the current values.
    fn apply_env_overrides(&mut self) {
        env_path("PSL_DATA_DIR", &mut self.storage.data_dir);
        env_path("PSL_DB_PATH", &mut self.storage.db_path);
        env_path("PSL_INDEX_DIR", &mut self.storage.index_dir);
        env_path("PSL_INDEX_FILE_PATH", &mut self.storage.index_file_path);

        env_usize("PSL_CHUNK_SIZE", &mut self.ingestion.chunk_size);
        env_usize("PSL_CHUNK_OVERLAP", &mut self.ingestion.chunk_overlap);
        env_u64("PSL_MAX_DOC_BYTES", &mut self.ingestion.max_doc_bytes);
        env_u32("PSL_MAX_PDF_PAGES", &mut self.ingestion.max_pdf_pages);
        env_bool("PSL_NORMALIZE_TEXT", &mut self.ingestion.normalize_text);
        env_suffix_set(
            "PSL_BLOCKED_SUFFIXES",
            &mut self.ingestion.blocked_suffixes,
        );

        env_string("PSL_EMBEDDING_BACKEND", &mut self.embedding.backend);
        env_string("PSL_MODEL_NAME", &mut self.embedding.model_name);
        if let Ok(rev) = std::env::var("PSL_MODEL_REVISION") {
            self.embedding.model_revision = (!rev.trim().is_empty()).then_some(rev);
        }
        env_usize("PSL_EMBED_DIM", &mut self.embedding.embed_dim);
        env_usize("PSL_EMBED_BATCH_SIZE", &mut self.embedding.embed_batch_size);

        env_usize("PSL_TOP_K", &mut self.retrieval.default_top_k);
        env_u32("PSL_RRF_K", &mut self.retrieval.rrf_k);

        env_usize(
            "PSL_ANSWER_MIN_TOPIC_OVERLAP",
            &mut self.answering.answer_min_topic_overlap,
        );
        env_percent(
            "PSL_ANSWER_MIN_SUPPORTABILITY",
            &mut self.answering.answer_min_supportability,
        );
        env_percent(
            "PSL_ANSWER_MIN_CITATION_SPAN_QUALITY",
            &mut self.answering.answer_min_citation_span_quality,
        );

        env_percent(
            "PSL_VERIFIER_QUERY_ALIGNMENT_MIN",
            &mut self.verifier.query_alignment_min,
        );
        env_percent(
            "PSL_VERIFIER_CRITICAL_COVERAGE_MIN",
            &mut self.verifier.critical_coverage_min,
        );
        env_percent(
            "PSL_VERIFIER_CLAIM_SUPPORT_MIN",
            &mut self.verifier.claim_support_min,
        );
        env_percent(
            "PSL_VERIFIER_CITATION_SPAN_QUALITY_MIN",
            &mut self.verifier.citation_span_quality_min,
        );
        env_percent(
            "PSL_VERIFIER_AGGREGATE_MIN",
            &mut self.verifier.aggregate_min,
        );

        if let Ok(path) = std::env::var("PSL_ROUTER_POLICY_PATH") {
            self.router.policy_path = Some(PathBuf::from(path));
        }

        env_string("PSL_LOG_LEVEL", &mut self.logging.log_level);
        if let Ok(raw) = std::env::var("PSL_LOG_FORMAT") {
            self.logging.log_format = match raw.trim().to_lowercase().as_str() {
                "text" => LogFormat::Text,
                _ => LogFormat::Json,
            };
        }
    }
}

/// A minimal JSON-only fallback for non-`.json` extensions; config files in
/// this crate are JSON, so any other extension is treated as JSON too and
/// its errors are reported with the caller's path for context.
fn toml_like_json_fallback(contents: &str, path: &Path) -> Result<Config> {
    serde_json::from_str(contents).map_err(|e| Error::Config {
        message: format!("invalid config file {}: {e}", path.display()),
    })
}

fn env_string(key: &str, slot: &mut String) {
    if let Ok(v) = std::env::var(key) {
        *slot = v;
    }
}

fn env_path(key: &str, slot: &mut PathBuf) {
    if let Ok(v) = std::env::var(key) {
        *slot = PathBuf::from(v);
    }
}

fn env_usize(key: &str, slot: &mut usize) {
    if let Ok(v) = std::env::var(key)
        && let Ok(parsed) = v.parse()
    {
        *slot = parsed;
    }
}

fn env_u32(key: &str, slot: &mut u32) {
    if let Ok(v) = std::env::var(key)
        && let Ok(parsed) = v.parse()
    {
        *slot = parsed;
    }
}

fn env_u64(key: &str, slot: &mut u64) {
    if let Ok(v) = std::env::var(key)
        && let Ok(parsed) = v.parse()
    {
        *slot = parsed;
    }
}

fn env_bool(key: &str, slot: &mut bool) {
    if let Ok(v) = std::env::var(key) {
        *slot = matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on");
    }
}

/// Reads a threshold expressed as a whole-number percentage (e.g. `35` for
/// 0.35), matching the convention the original config used for env overrides.
fn env_percent(key: &str, slot: &mut f64) {
    if let Ok(v) = std::env::var(key)
        && let Ok(parsed) = v.parse::<f64>()
    {
        *slot = parsed / 100.0;
    }
}

fn env_suffix_set(key: &str, slot: &mut BTreeSet<String>) {
    if let Ok(raw) = std::env::var(key) {
        let mut suffixes = BTreeSet::new();
        for part in raw.split(',') {
            let part = part.trim().to_lowercase();
            if part.is_empty() {
                continue;
            }
            suffixes.insert(if part.starts_with('.') {
                part
            } else {
                format!(".{part}")
            });
        }
        *slot = suffixes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = Config::default();
        assert_eq!(config.ingestion.chunk_size, 1_500);
        assert_eq!(config.ingestion.chunk_overlap, 150);
        assert_eq!(config.retrieval.rrf_k, 60);
        assert!((config.answering.answer_min_supportability - 0.35).abs() < f64::EPSILON);
        assert!((config.verifier.aggregate_min - 0.55).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_key_in_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"storage": {"bogus_field": 1}}"#).expect("write");
        let err = Config::load(Some(&path)).expect_err("unknown key should fail");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn file_overrides_default_then_env_overrides_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"retrieval": {"default_top_k": 20, "rrf_k": 60}}"#)
            .expect("write");

        // SAFETY: test runs single-threaded per-process for this assertion window.
        unsafe {
            std::env::set_var("PSL_TOP_K", "99");
        }
        let config = Config::load(Some(&path)).expect("load");
        unsafe {
            std::env::remove_var("PSL_TOP_K");
        }

        assert_eq!(config.retrieval.default_top_k, 99);
    }

    #[test]
    fn blocked_suffixes_default_set() {
        let config = Config::default();
        assert!(config.ingestion.blocked_suffixes.contains(".json"));
        assert!(config.ingestion.blocked_suffixes.contains(".zip"));
    }
}
