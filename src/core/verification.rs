//! Verification result types.
//!
//! Tagged-variant `Verdict`/`VerifierMode` instead of string-typed enums, per
//! the redesign direction away from stringly-typed classification codes.

use serde::{Deserialize, Serialize};

/// The verifier's terminal classification of a draft answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Every gate passed; the draft may be emitted.
    Supported,
    /// The query reads as adversarial/off-topic for this corpus.
    QueryMismatch,
    /// Two or more sources disagree on a factual value.
    ConflictDetected,
    /// A claim lacks an acceptable citation.
    CitationGap,
    /// A claim's support ratio fell below the threshold.
    UnsupportedClaim,
    /// Critical query tokens are not covered by the corpus.
    InsufficientEvidence,
}

impl Verdict {
    /// Returns the name used in `decision_path` and external reporting.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Supported => "supported",
            Self::QueryMismatch => "query_mismatch",
            Self::ConflictDetected => "conflict_detected",
            Self::CitationGap => "citation_gap",
            Self::UnsupportedClaim => "unsupported_claim",
            Self::InsufficientEvidence => "insufficient_evidence",
        }
    }

    /// `abstain == (verdict != Supported)`.
    #[must_use]
    pub const fn is_abstain(self) -> bool {
        !matches!(self, Self::Supported)
    }
}

/// Verifier strictness mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifierMode {
    /// Always returns `Supported`; used only for smoke/search-mode paths.
    Off,
    /// Runs all gates except conflict detection.
    Minimal,
    /// Runs all gates, no conflict detection bypass.
    Strict,
    /// Strict plus conflict detection.
    StrictConflict,
}

/// A single flagged issue surfaced during verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationIssue {
    /// Id of the claim this issue concerns, if claim-scoped.
    pub claim_id: Option<String>,
    /// Short machine-readable issue kind (e.g. `"citation_gap"`).
    pub kind: String,
    /// Human-readable detail.
    pub detail: String,
}

/// A detected cross-source conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Normalized subject the conflicting values are about.
    pub subject: String,
    /// Distinct `(value, sources)` pairs found for the subject.
    pub values: Vec<(String, Vec<String>)>,
}

impl Conflict {
    /// Formats this conflict the way the spec's example scenario expects,
    /// e.g. `Conflict for 'project alpha': 2024 (source_a) vs 2025 (source_b)`.
    #[must_use]
    pub fn describe(&self) -> String {
        let parts = self
            .values
            .iter()
            .map(|(value, sources)| format!("{value} ({})", sources.join(", ")))
            .collect::<Vec<_>>()
            .join(" vs ");
        format!("Conflict for '{}': {parts}", self.subject)
    }
}

/// The verifier's full output for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Terminal verdict.
    pub verdict_code: Verdict,
    /// Confidence in `[0, 1]`; the partial aggregate score at the failing gate for abstains.
    pub confidence: f64,
    /// `abstain == (verdict_code != Supported)`.
    pub abstain: bool,
    /// Human-readable reason, set whenever `abstain` is true.
    pub abstain_reason: Option<String>,
    /// Claim/citation-scoped issues collected along the gate chain.
    pub issues: Vec<VerificationIssue>,
    /// Cross-source conflicts detected, if any.
    pub conflicts: Vec<Conflict>,
    /// Ordered list of gate names traversed.
    pub decision_path: Vec<String>,
    /// Queries searched to produce the verified draft.
    pub searched_queries: Vec<String>,
}

impl VerificationResult {
    /// Builds an abstain result at a given gate, with a reason.
    #[must_use]
    pub fn abstain(
        verdict: Verdict,
        confidence: f64,
        reason: impl Into<String>,
        decision_path: Vec<String>,
        searched_queries: Vec<String>,
    ) -> Self {
        Self {
            verdict_code: verdict,
            confidence,
            abstain: true,
            abstain_reason: Some(reason.into()),
            issues: Vec::new(),
            conflicts: Vec::new(),
            decision_path,
            searched_queries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_abstain_matches_supported_exclusivity() {
        assert!(!Verdict::Supported.is_abstain());
        assert!(Verdict::QueryMismatch.is_abstain());
        assert!(Verdict::CitationGap.is_abstain());
    }

    #[test]
    fn conflict_describe_matches_spec_example_shape() {
        let conflict = Conflict {
            subject: "project alpha".to_string(),
            values: vec![
                ("2024".to_string(), vec!["source_a".to_string()]),
                ("2025".to_string(), vec!["source_b".to_string()]),
            ],
        };
        let rendered = conflict.describe();
        assert!(rendered.contains("Conflict for 'project alpha'"));
        assert!(rendered.contains("2024 (source_a)"));
        assert!(rendered.contains("2025 (source_b)"));
    }
}
