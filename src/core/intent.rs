//! Query intent and pipeline policy types.

use super::verification::VerifierMode;
use serde::{Deserialize, Serialize};

/// The router's classification of a query's primary intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Explicit-lookup query (quoted phrase, "exact"/"verbatim"/"quote").
    Lookup,
    /// Single factual question.
    Fact,
    /// Cross-source synthesis request.
    Synthesis,
    /// Comparison between two or more things.
    Compare,
    /// Chronological/timeline request.
    Timeline,
    /// Procedural/checklist request.
    Task,
    /// None of the above matched.
    Other,
}

impl Intent {
    /// Whether this intent belongs to the "synthesis family" referenced by
    /// several verifier thresholds (synthesis, compare, timeline).
    #[must_use]
    pub const fn is_synthesis_family(self) -> bool {
        matches!(self, Self::Synthesis | Self::Compare | Self::Timeline)
    }
}

/// Independent, additive flags detected alongside the primary intent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteFlags {
    /// Query asks for a definition.
    pub wants_definition: bool,
    /// Query asks for ordered steps.
    pub wants_steps: bool,
    /// Query asks for a summary.
    pub wants_summary: bool,
}

/// Policy recommended for a given intent; overridable per-call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Number of chunks to retrieve.
    pub k: usize,
    /// Lexical weight used by the hybrid fuser, in `[0, 1]`.
    pub lexical_weight: f64,
    /// Whether a single bounded multi-hop follow-up is allowed.
    pub allow_multihop: bool,
    /// Whether the orchestrator reranks the fused chunk set.
    pub use_rerank: bool,
    /// Whether to run the synthesizer (false ⇒ search-only mode).
    pub generate_answer: bool,
    /// Verifier mode to run.
    pub verifier_mode: VerifierMode,
    /// Maximum number of repair passes (spec bounds this to ≤1).
    pub max_repair_passes: u8,
}

/// The router's decision for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    /// Classified primary intent.
    pub primary_intent: Intent,
    /// Additive flags detected alongside the intent.
    pub flags: RouteFlags,
    /// Settings recommended for this intent.
    pub settings: PipelineSettings,
    /// Named signals appended by each matched rule, in match order.
    pub signals: Vec<String>,
}
