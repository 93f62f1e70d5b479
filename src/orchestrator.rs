//! Query orchestration: the state machine tying retrieval, synthesis, and
//! verification together for one query, plus bounded multi-hop and repair.
//!
//! `ROUTE → RETRIEVE → (RERANK?) → [search: return]` or, in answer mode,
//! `SYNTHESIZE → VERIFY → (FOLLOWUP → MERGE → re-SYNTHESIZE/VERIFY)? →
//! (REPAIR → VERIFY)? → return`. At most one hop and one repair per query.

use crate::config::Config;
use crate::core::{DraftAnswer, Intent, PipelineSettings, ScoredChunk, Verdict, VerificationResult};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::retrieval;
use crate::router::{self, RouterPolicy};
use crate::storage::Store;
use crate::synthesis::synthesize_extractive;
use crate::text::tokenize;
use crate::verification::{repair_answer, verify_answer};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const MAX_HOPS: u8 = 1;
const MAX_REPAIRS: u8 = 1;

/// Whether the orchestrator should synthesize and verify an answer, or stop
/// after returning ranked chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Returns ranked chunks only.
    Search,
    /// Synthesizes and verifies a draft answer.
    Answer,
}

/// Outcome of a repair attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairOutcome {
    /// No repair was attempted (the draft was supported, or answer mode was not used).
    None,
    /// The verdict was not eligible for repair.
    SkippedIneligible,
    /// Repair was eligible but not reached this call (reserved for future gating).
    Noop,
    /// Repair produced a supported draft.
    Successful,
    /// Repair produced a draft but it still failed verification.
    Harmful,
    /// Repair produced no usable draft at all.
    Unsuccessful,
}

/// Caller-supplied overrides for one query; `None` fields fall back to the
/// router's recommended settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOverrides {
    /// Overrides the router's recommended `k`.
    pub top_k: Option<usize>,
    /// Overrides the router's vector-retrieval skip decision.
    pub skip_vector: Option<bool>,
}

/// Full result of one `run_query` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    /// Mode this query ran in.
    pub mode: QueryMode,
    /// Classified primary intent.
    pub intent: Intent,
    /// Final ranked/merged chunk set.
    pub chunks: Vec<ScoredChunk>,
    /// Synthesized draft, present only in answer mode.
    pub draft_answer: Option<DraftAnswer>,
    /// Verification result, present only in answer mode.
    pub verification: Option<VerificationResult>,
    /// Structured `{router, retrieval, orchestration, verification}` trace.
    pub tool_trace: serde_json::Value,
    /// Wall-clock latency in milliseconds, as measured by the caller.
    pub latency_ms: u64,
}

fn enforce_pipeline_bounds(settings: PipelineSettings) -> PipelineSettings {
    let mut bounded = settings;
    if !bounded.allow_multihop {
        bounded.max_repair_passes = 0;
    }
    bounded.max_repair_passes = bounded.max_repair_passes.min(MAX_REPAIRS);
    bounded
}

fn merge_chunks(primary: Vec<ScoredChunk>, secondary: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    let mut by_id: HashMap<i64, ScoredChunk> = primary.into_iter().map(|c| (c.chunk_id, c)).collect();
    for chunk in secondary {
        match by_id.get(&chunk.chunk_id) {
            Some(existing) if existing.score >= chunk.score => {}
            _ => {
                by_id.insert(chunk.chunk_id, chunk);
            }
        }
    }
    let mut merged: Vec<ScoredChunk> = by_id.into_values().collect();
    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    merged
}

/// Reranks chunks by adding `0.2 × |query_tokens ∩ chunk_tokens|` to each
/// chunk's fused score and re-sorting.
#[must_use]
pub fn rerank_chunks(query: &str, chunks: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();
    let mut reranked: Vec<ScoredChunk> = chunks
        .into_iter()
        .map(|mut chunk| {
            let chunk_tokens: HashSet<String> = tokenize(&chunk.chunk_text).into_iter().collect();
            let overlap = query_tokens.intersection(&chunk_tokens).count();
            chunk.score += f64::from(u32::try_from(overlap).unwrap_or(u32::MAX)) * 0.2;
            chunk
        })
        .collect();
    reranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    reranked
}

fn rerank_eligible(intent: Intent) -> bool {
    matches!(intent, Intent::Synthesis | Intent::Task | Intent::Compare | Intent::Timeline)
}

/// Builds a single deterministic follow-up query from missing-evidence
/// signals: up to six 4+-char tokens drawn from unsupported claim texts,
/// excluding tokens already in the original query and duplicates.
fn propose_followup_query(query: &str, missing_claim_texts: &[String]) -> Option<String> {
    if missing_claim_texts.is_empty() {
        return None;
    }
    let seed_text = missing_claim_texts.join(" ");
    let original: HashSet<String> = tokenize(query).into_iter().collect();
    let mut seen = HashSet::new();
    let mut additions = Vec::new();
    for token in tokenize(&seed_text) {
        if token.len() < 4 || original.contains(&token) || !seen.insert(token.clone()) {
            continue;
        }
        additions.push(token);
        if additions.len() >= 6 {
            break;
        }
    }
    if additions.is_empty() {
        None
    } else {
        Some(format!("{query} {}", additions.join(" ")))
    }
}

fn missing_claim_texts(draft: &DraftAnswer, verification: &VerificationResult) -> Vec<String> {
    let bad_claim_ids: HashSet<&str> = verification
        .issues
        .iter()
        .filter(|issue| matches!(issue.kind.as_str(), "unsupported_claim" | "citation_gap"))
        .filter_map(|issue| issue.claim_id.as_deref())
        .collect();
    draft
        .claims
        .iter()
        .filter(|claim| bad_claim_ids.contains(claim.claim_id.as_str()))
        .map(|claim| claim.text.clone())
        .collect()
}

fn repair_eligible(verdict: Verdict) -> bool {
    !matches!(
        verdict,
        Verdict::QueryMismatch | Verdict::ConflictDetected | Verdict::InsufficientEvidence
    )
}

struct RetrievalStep {
    chunks: Vec<ScoredChunk>,
}

fn run_retrieval(
    store: &dyn Store,
    embedder: &dyn Embedder,
    query: &str,
    top_k: usize,
    skip_vector: bool,
    lexical_weight: f64,
    rrf_k: u32,
) -> Result<RetrievalStep> {
    let chunks = if skip_vector {
        retrieval::lexical::retrieve(store, query, top_k)?
    } else {
        retrieval::retrieve_and_fuse(store, embedder, query, top_k, lexical_weight, rrf_k)?
    };
    Ok(RetrievalStep { chunks })
}

/// Runs the full query pipeline: route, retrieve, optionally rerank, and
/// (in answer mode) synthesize, verify, multi-hop, and repair.
///
/// # Errors
///
/// Returns an error if retrieval against the store or embedder fails.
pub fn run_query(
    store: &dyn Store,
    embedder: &dyn Embedder,
    policy: &RouterPolicy,
    config: &Config,
    query: &str,
    mode: QueryMode,
    overrides: QueryOverrides,
    elapsed_ms: u64,
) -> Result<OrchestrationResult> {
    let decision = router::route(query, policy);
    let settings = enforce_pipeline_bounds(decision.settings);
    let intent = decision.primary_intent;

    let effective_top_k = overrides.top_k.unwrap_or(settings.k);
    let effective_skip_vector = overrides.skip_vector.unwrap_or(intent == Intent::Lookup);
    let use_rerank = settings.use_rerank && rerank_eligible(intent);

    let mut searched_queries = vec![query.to_string()];
    let mut hop_count: u8 = 0;
    let mut repair_count: u8 = 0;
    let mut repair_outcome = RepairOutcome::None;

    let initial = run_retrieval(
        store,
        embedder,
        query,
        effective_top_k,
        effective_skip_vector,
        settings.lexical_weight,
        config.retrieval.rrf_k,
    )?;
    let mut chunks = initial.chunks;
    if use_rerank {
        chunks = rerank_chunks(query, chunks);
    }

    let mut draft_answer: Option<DraftAnswer> = None;
    let mut verification: Option<VerificationResult> = None;

    if mode == QueryMode::Answer {
        let mut draft = synthesize_extractive(query, &chunks, intent, searched_queries.clone(), &config.answering);
        let mut verify_result = verify_answer(query, &draft, &chunks, intent, settings.verifier_mode, &config.verifier);

        if verify_result.abstain && settings.allow_multihop && hop_count < MAX_HOPS {
            let missing = missing_claim_texts(&draft, &verify_result);
            if let Some(followup) = propose_followup_query(query, &missing) {
                if !searched_queries.contains(&followup) {
                    searched_queries.push(followup.clone());
                    hop_count += 1;
                    let hop = run_retrieval(
                        store,
                        embedder,
                        &followup,
                        effective_top_k,
                        effective_skip_vector,
                        settings.lexical_weight,
                        config.retrieval.rrf_k,
                    )?;
                    chunks = merge_chunks(chunks, hop.chunks);
                    if use_rerank {
                        chunks = rerank_chunks(query, chunks);
                    }
                    draft = synthesize_extractive(query, &chunks, intent, searched_queries.clone(), &config.answering);
                    verify_result = verify_answer(query, &draft, &chunks, intent, settings.verifier_mode, &config.verifier);
                }
            }
        }

        if verify_result.abstain && settings.max_repair_passes > 0 && repair_count < MAX_REPAIRS {
            if repair_eligible(verify_result.verdict_code) {
                repair_count += 1;
                match repair_answer(query, &draft, &chunks, intent, settings.verifier_mode, &config.verifier, &config.answering) {
                    Some(mut repaired) => {
                        repaired.searched_queries = searched_queries.clone();
                        let repaired_verification =
                            verify_answer(query, &repaired, &chunks, intent, settings.verifier_mode, &config.verifier);
                        if repaired_verification.abstain {
                            // Repair did not produce a supported draft; keep the original.
                            repair_outcome = RepairOutcome::Harmful;
                        } else {
                            repair_outcome = RepairOutcome::Successful;
                            draft = repaired;
                            verify_result = repaired_verification;
                        }
                    }
                    None => repair_outcome = RepairOutcome::Unsuccessful,
                }
            } else {
                repair_outcome = RepairOutcome::SkippedIneligible;
            }
        }

        draft_answer = Some(draft);
        verification = Some(verify_result);
    }

    let tool_trace = build_tool_trace(
        &decision,
        &settings,
        effective_top_k,
        effective_skip_vector,
        mode,
        hop_count,
        repair_count,
        repair_outcome,
        &searched_queries,
        chunks.len(),
        verification.as_ref(),
    );

    Ok(OrchestrationResult {
        mode,
        intent,
        chunks,
        draft_answer,
        verification,
        tool_trace,
        latency_ms: elapsed_ms,
    })
}

#[allow(clippy::too_many_arguments)]
fn build_tool_trace(
    decision: &crate::core::RouteDecision,
    settings: &PipelineSettings,
    effective_top_k: usize,
    effective_skip_vector: bool,
    mode: QueryMode,
    hop_count: u8,
    repair_count: u8,
    repair_outcome: RepairOutcome,
    searched_queries: &[String],
    result_count: usize,
    verification: Option<&VerificationResult>,
) -> serde_json::Value {
    serde_json::json!({
        "router": {
            "primary_intent": decision.primary_intent,
            "signals": decision.signals,
            "settings": settings,
        },
        "retrieval": {
            "top_k": effective_top_k,
            "skip_vector": effective_skip_vector,
            "result_count": result_count,
        },
        "orchestration": {
            "mode": mode,
            "hop_count": hop_count,
            "repair_count": repair_count,
            "repair_outcome": repair_outcome,
            "searched_queries": searched_queries,
        },
        "verification": verification.map_or(serde_json::Value::Null, |v| serde_json::json!({
            "abstain": v.abstain,
            "verdict_code": v.verdict_code.as_str(),
            "confidence": v.confidence,
            "decision_path": v.decision_path,
            "issues": v.issues.iter().map(|i| i.kind.clone()).collect::<Vec<_>>(),
            "conflicts": v.conflicts,
        })),
    })
}
