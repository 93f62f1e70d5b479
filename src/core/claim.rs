//! Claim and citation, the extractive synthesizer's output records.

use serde::{Deserialize, Serialize};

/// A pointer to `(chunk_id, source, span)` supporting a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Id of the claim this citation supports.
    pub claim_id: String,
    /// Id of the chunk the citation points into.
    pub chunk_id: i64,
    /// Source path of the cited document.
    pub source_path: String,
    /// Optional page number.
    pub page: Option<u32>,
    /// Start of the quoted span within the chunk text, inclusive.
    pub quote_span_start: usize,
    /// End of the quoted span within the chunk text, exclusive.
    pub quote_span_end: usize,
    /// Blended span-quality score in `[0, 1]`.
    pub span_quality: f64,
}

/// One assertion in the draft answer, tied to one or more citations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Dense, ordered id (`c1`, `c2`, ...).
    pub claim_id: String,
    /// Claim text, copied verbatim from the representative sentence.
    pub text: String,
    /// Citations supporting this claim; empty only when marked as a gap.
    pub citations: Vec<Citation>,
    /// Fraction of query tokens matched by the sentence.
    pub overlap_score: f64,
    /// Fraction of sentence tokens found in the originating chunk.
    pub supportability_score: f64,
    /// Mean span quality across this claim's citations.
    pub citation_span_quality: f64,
    /// Number of distinct sources among this claim's citations.
    pub source_count: usize,
}

impl Claim {
    /// Returns whether this claim has at least one citation.
    #[must_use]
    pub fn has_citations(&self) -> bool {
        !self.citations.is_empty()
    }
}
