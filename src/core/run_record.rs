//! Run record and the ambient ingest/index summaries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Append-only log row capturing one query's trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique id for this run.
    pub run_id: String,
    /// The original query text.
    pub query: String,
    /// Classified intent name.
    pub intent: String,
    /// Structured `{router, retrieval, orchestration, verification}` trace.
    pub tool_trace: serde_json::Value,
    /// Wall-clock latency in milliseconds.
    pub latency_ms: u64,
    /// Unix timestamp of completion.
    pub created_at: i64,
}

/// Summary produced by one `ingest` invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Number of new documents inserted.
    pub documents_inserted: usize,
    /// Number of documents skipped (oversized, decode failure, already present).
    pub documents_skipped: usize,
    /// Number of chunks inserted across all inserted documents.
    pub chunks_inserted: usize,
    /// Counts of skip reasons, keyed by a short machine-readable label.
    pub skip_reasons: BTreeMap<String, usize>,
}

impl IngestSummary {
    /// Records one skip with the given reason label.
    pub fn record_skip(&mut self, reason: &str) {
        self.documents_skipped += 1;
        *self.skip_reasons.entry(reason.to_string()).or_insert(0) += 1;
    }
}

/// Summary produced by one `index` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSummary {
    /// Number of chunks covered by the new index.
    pub chunk_count: usize,
    /// Embedding dimensionality.
    pub dim: usize,
    /// Name of the model used to build the embeddings.
    pub model_name: String,
    /// Id of the newly activated manifest.
    pub manifest_id: i64,
    /// Wall-clock build time in milliseconds.
    pub build_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_skip_increments_total_and_reason() {
        let mut summary = IngestSummary::default();
        summary.record_skip("oversized");
        summary.record_skip("oversized");
        summary.record_skip("decode_failure");
        assert_eq!(summary.documents_skipped, 3);
        assert_eq!(summary.skip_reasons.get("oversized"), Some(&2));
        assert_eq!(summary.skip_reasons.get("decode_failure"), Some(&1));
    }
}
