//! Core domain models for `psl`.
//!
//! Pure data structures with no I/O dependencies, shared across the store,
//! retrieval, synthesis, verification, and orchestration subsystems.

pub mod chunk;
pub mod claim;
pub mod document;
pub mod draft_answer;
pub mod embedding;
pub mod intent;
pub mod manifest;
pub mod run_record;
pub mod scored_chunk;
pub mod verification;

pub use chunk::Chunk;
pub use claim::{Citation, Claim};
pub use document::Document;
pub use draft_answer::DraftAnswer;
pub use embedding::Embedding;
pub use intent::{Intent, PipelineSettings, RouteDecision, RouteFlags};
pub use manifest::{IndexManifest, chunk_snapshot_hash, sha256_hex};
pub use run_record::{IndexSummary, IngestSummary, RunRecord};
pub use scored_chunk::ScoredChunk;
pub use verification::{Conflict, Verdict, VerificationIssue, VerificationResult, VerifierMode};
