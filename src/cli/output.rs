//! Output formatting for CLI commands.
//!
//! Supports text, JSON, and NDJSON output formats.

use crate::core::{IndexSummary, IngestSummary};
use crate::orchestrator::{OrchestrationResult, QueryMode};
use crate::storage::StoreStats;
use serde::Serialize;
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
    /// Newline-delimited JSON (NDJSON) for streaming.
    Ndjson,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" | "stream" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Returns true if this format is a streaming format.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Ndjson)
    }
}

/// Formats a status response.
#[must_use]
pub fn format_status(stats: &StoreStats, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_status_text(stats),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(stats),
    }
}

fn format_status_text(stats: &StoreStats) -> String {
    let mut output = String::new();
    output.push_str("psl status\n");
    output.push_str("==========\n\n");
    let _ = writeln!(output, "  Documents:      {}", stats.document_count);
    let _ = writeln!(output, "  Chunks:         {}", stats.chunk_count);
    let _ = writeln!(output, "  Embeddings:     {}", stats.embedding_count);
    let _ = writeln!(
        output,
        "  Active index:   {}",
        if stats.has_active_manifest { "yes" } else { "no" }
    );
    let _ = writeln!(output, "  Schema:         v{}", stats.schema_version);
    if let Some(size) = stats.db_size {
        let _ = writeln!(output, "  DB size:        {size} bytes");
    }
    output
}

/// Formats an ingest summary.
#[must_use]
pub fn format_ingest_summary(summary: &IngestSummary, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "Documents inserted: {}", summary.documents_inserted);
            let _ = writeln!(output, "Documents skipped:  {}", summary.documents_skipped);
            let _ = writeln!(output, "Chunks inserted:    {}", summary.chunks_inserted);
            if !summary.skip_reasons.is_empty() {
                output.push_str("Skip reasons:\n");
                for (reason, count) in &summary.skip_reasons {
                    let _ = writeln!(output, "  {reason}: {count}");
                }
            }
            output
        }
        OutputFormat::Json | OutputFormat::Ndjson => format_json(summary),
    }
}

/// Formats an index build summary.
#[must_use]
pub fn format_index_summary(summary: &IndexSummary, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "Indexed {} chunks", summary.chunk_count);
            let _ = writeln!(output, "Model:      {} (dim {})", summary.model_name, summary.dim);
            let _ = writeln!(output, "Manifest:   {}", summary.manifest_id);
            let _ = writeln!(output, "Build time: {}ms", summary.build_ms);
            output
        }
        OutputFormat::Json | OutputFormat::Ndjson => format_json(summary),
    }
}

/// Formats a query result.
#[must_use]
pub fn format_query_result(result: &OrchestrationResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_query_result_text(result),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(result),
    }
}

fn format_query_result_text(result: &OrchestrationResult) -> String {
    let mut output = String::new();

    let draft = match (result.mode, &result.draft_answer) {
        (QueryMode::Search, _) | (_, None) => {
            if result.chunks.is_empty() {
                output.push_str("No matching chunks found.\n");
                return output;
            }
            let _ = writeln!(output, "{} chunks:", result.chunks.len());
            for (rank, chunk) in result.chunks.iter().enumerate() {
                let _ = writeln!(output, "{:>2}. [{:.3}] {} ({})", rank + 1, chunk.score, chunk.source_path, chunk.chunk_id);
                let snippet: String = chunk.chunk_text.chars().take(160).collect();
                let _ = writeln!(output, "      {snippet}");
            }
            return output;
        }
        (_, Some(draft)) => draft,
    };
    if let Some(verification) = &result.verification
        && verification.abstain
    {
        let _ = writeln!(output, "Abstained ({})", verification.verdict_code.as_str());
        if let Some(reason) = &verification.abstain_reason {
            let _ = writeln!(output, "Reason: {reason}");
        }
        return output;
    }

    output.push_str(&draft.answer_text);
    output.push('\n');
    if !draft.claims.is_empty() {
        output.push_str("\nCitations:\n");
        for claim in &draft.claims {
            let sources: Vec<String> = claim.citations.iter().map(|c| c.source_path.clone()).collect();
            let _ = writeln!(output, "  {}: {}", claim.claim_id, sources.join(", "));
        }
    }
    output
}

/// Formats an eval report. Always rendered as pretty JSON regardless of
/// format, since the report is consumed by tooling far more often than read
/// by a human at a terminal.
#[must_use]
pub fn format_eval_report<T: Serialize>(report: &T) -> String {
    format_json(report)
}

/// Formats a value as JSON.
fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats an error for output.
///
/// When format is JSON, returns a structured error object.
/// When format is Text, returns the error message string.
#[must_use]
pub fn format_error(error: &crate::Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let (error_type, suggestion) = get_error_details(error);
            let json = serde_json::json!({
                "success": false,
                "error": {
                    "type": error_type,
                    "message": error.to_string(),
                    "suggestion": suggestion
                }
            });
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

/// Extracts error type and recovery suggestion from an error.
fn get_error_details(error: &crate::Error) -> (&'static str, Option<&'static str>) {
    use crate::error::{CommandError, IngestionError, RetrievalError, StorageError, SynthesisError, VerificationError};
    use crate::Error;

    match error {
        Error::Storage(e) => match e {
            StorageError::NotInitialized => ("NotInitialized", Some("Run 'psl ingest <path>' to initialize the store")),
            StorageError::SchemaMismatch { .. } => ("SchemaMismatch", Some("Re-ingest into a fresh database")),
            StorageError::DocumentNotFound { .. } => ("DocumentNotFound", None),
            StorageError::ChunkNotFound { .. } => ("ChunkNotFound", None),
            StorageError::NoActiveManifest => ("NoActiveManifest", Some("Run 'psl index' to build the vector index")),
            StorageError::Database(_) => ("DatabaseError", None),
            StorageError::Migration(_) => ("MigrationError", None),
            StorageError::Transaction(_) => ("TransactionError", None),
            StorageError::Busy { .. } => ("StoreBusy", Some("Retry the command; another process may hold the database")),
            StorageError::Serialization(_) => ("SerializationError", None),
        },
        Error::Retrieval(e) => match e {
            RetrievalError::EmbeddingFailed(_) => ("EmbeddingFailed", None),
            RetrievalError::DimensionMismatch { .. } => ("DimensionMismatch", Some("Rebuild the index with 'psl index'")),
            RetrievalError::QueryRewriteFailed(_) => ("QueryRewriteFailed", None),
        },
        Error::Synthesis(e) => match e {
            SynthesisError::InvariantViolated(_) => ("SynthesisInvariantViolated", None),
        },
        Error::Verification(e) => match e {
            VerificationError::UnknownMode(_) => ("UnknownVerifierMode", None),
            VerificationError::PatternError(_) => ("ConflictPatternError", None),
        },
        Error::Ingestion(e) => match e {
            IngestionError::InvalidRoot { .. } => ("InvalidIngestRoot", Some("Verify the path exists and is a directory")),
            IngestionError::NormalizationFailed { .. } => ("NormalizationFailed", None),
            IngestionError::InvalidChunkConfig { .. } => ("InvalidChunkConfig", Some("Ensure chunk_overlap is less than chunk_size")),
        },
        Error::Command(e) => match e {
            CommandError::UnknownCommand(_) => ("UnknownCommand", None),
            CommandError::InvalidArgument(_) => ("InvalidArgument", None),
            CommandError::MissingArgument(_) => ("MissingArgument", None),
            CommandError::ExecutionFailed(_) => ("ExecutionFailed", None),
            CommandError::OutputFormat(_) => ("OutputFormatError", None),
        },
        Error::Config { .. } => ("ConfigError", Some("Check the config file or environment overrides")),
        Error::InvalidState { .. } => ("InvalidState", None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreStats;

    #[test]
    fn status_text_includes_counts() {
        let stats = StoreStats {
            document_count: 3,
            chunk_count: 10,
            embedding_count: 10,
            has_active_manifest: true,
            schema_version: 1,
            db_size: Some(2048),
        };
        let text = format_status(&stats, OutputFormat::Text);
        assert!(text.contains("Documents:      3"));
        assert!(text.contains("Active index:   yes"));
    }

    #[test]
    fn status_json_round_trips_counts() {
        let stats = StoreStats {
            document_count: 1,
            chunk_count: 2,
            embedding_count: 0,
            has_active_manifest: false,
            schema_version: 1,
            db_size: None,
        };
        let json = format_status(&stats, OutputFormat::Json);
        assert!(json.contains("\"document_count\": 1"));
    }

    #[test]
    fn format_error_text_is_display_string() {
        let err = crate::Error::Config { message: "bad key".to_string() };
        let text = format_error(&err, OutputFormat::Text);
        assert_eq!(text, "configuration error: bad key");
    }

    #[test]
    fn format_error_json_includes_suggestion() {
        let err = crate::error::StorageError::NotInitialized.into();
        let json = format_error(&err, OutputFormat::Json);
        assert!(json.contains("NotInitialized"));
        assert!(json.contains("psl ingest"));
    }
}
