//! Deterministic intent router.
//!
//! Applies a declarative policy of substring rules in a fixed priority
//! order, then looks up a per-intent pipeline policy. The policy itself is
//! a sealed, enumerated structure with a built-in default; an optional JSON
//! file (path from [`crate::config::RouterConfig::policy_path`]) may
//! override it wholesale, but the shape is validated the same way either way
//! — there is no free-form key injection.

use crate::config::RouterConfig;
use crate::core::{Intent, PipelineSettings, RouteDecision, RouteFlags, VerifierMode};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One intent's recommended pipeline settings, as found in the policy table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRow {
    /// Number of chunks to retrieve.
    pub k: usize,
    /// Lexical weight passed to the hybrid fuser.
    pub lexical_weight: f64,
    /// Whether a bounded multi-hop follow-up is allowed.
    pub allow_multihop: bool,
    /// Whether the orchestrator should rerank.
    pub use_rerank: bool,
    /// Whether to run the synthesizer.
    pub generate_answer: bool,
    /// Verifier mode.
    pub verifier_mode: VerifierMode,
    /// Maximum repair passes.
    pub max_repair_passes: u8,
}

/// Per-intent pipeline settings table; sealed, one field per [`Intent`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSettingsTable {
    /// Settings for [`Intent::Lookup`].
    pub lookup: PolicyRow,
    /// Settings for [`Intent::Fact`].
    pub fact: PolicyRow,
    /// Settings for [`Intent::Synthesis`].
    pub synthesis: PolicyRow,
    /// Settings for [`Intent::Compare`].
    pub compare: PolicyRow,
    /// Settings for [`Intent::Timeline`].
    pub timeline: PolicyRow,
    /// Settings for [`Intent::Task`].
    pub task: PolicyRow,
    /// Settings for [`Intent::Other`].
    pub other: PolicyRow,
}

impl PipelineSettingsTable {
    fn row_for(&self, intent: Intent) -> PolicyRow {
        match intent {
            Intent::Lookup => self.lookup,
            Intent::Fact => self.fact,
            Intent::Synthesis => self.synthesis,
            Intent::Compare => self.compare,
            Intent::Timeline => self.timeline,
            Intent::Task => self.task,
            Intent::Other => self.other,
        }
    }
}

impl Default for PipelineSettingsTable {
    fn default() -> Self {
        Self {
            lookup: PolicyRow {
                k: 8,
                lexical_weight: 0.8,
                allow_multihop: false,
                use_rerank: false,
                generate_answer: false,
                verifier_mode: VerifierMode::Minimal,
                max_repair_passes: 0,
            },
            fact: PolicyRow {
                k: 10,
                lexical_weight: 0.5,
                allow_multihop: false,
                use_rerank: false,
                generate_answer: true,
                verifier_mode: VerifierMode::Strict,
                max_repair_passes: 1,
            },
            synthesis: PolicyRow {
                k: 24,
                lexical_weight: 0.4,
                allow_multihop: true,
                use_rerank: true,
                generate_answer: true,
                verifier_mode: VerifierMode::StrictConflict,
                max_repair_passes: 1,
            },
            compare: PolicyRow {
                k: 20,
                lexical_weight: 0.5,
                allow_multihop: true,
                use_rerank: true,
                generate_answer: true,
                verifier_mode: VerifierMode::Strict,
                max_repair_passes: 1,
            },
            timeline: PolicyRow {
                k: 20,
                lexical_weight: 0.6,
                allow_multihop: true,
                use_rerank: true,
                generate_answer: true,
                verifier_mode: VerifierMode::StrictConflict,
                max_repair_passes: 1,
            },
            task: PolicyRow {
                k: 20,
                lexical_weight: 0.4,
                allow_multihop: true,
                use_rerank: true,
                generate_answer: true,
                verifier_mode: VerifierMode::Strict,
                max_repair_passes: 1,
            },
            other: PolicyRow {
                k: 12,
                lexical_weight: 0.5,
                allow_multihop: false,
                use_rerank: false,
                generate_answer: true,
                verifier_mode: VerifierMode::Strict,
                max_repair_passes: 1,
            },
        }
    }
}

/// Declarative classification phrase lists plus the pipeline settings table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RouterPolicy {
    /// Phrases that set `wants_definition`.
    pub definition_phrases: Vec<String>,
    /// Phrases that set `wants_steps`.
    pub steps_phrases: Vec<String>,
    /// Phrases that set `wants_summary`.
    pub summary_phrases: Vec<String>,
    /// Phrases that classify a query as explicit lookup.
    pub lookup_explicit_phrases: Vec<String>,
    /// Phrases that classify a query as a comparison.
    pub compare_phrases: Vec<String>,
    /// Phrases that classify a query as a timeline request.
    pub timeline_phrases: Vec<String>,
    /// Phrases that classify a query as a task/checklist request.
    pub task_phrases: Vec<String>,
    /// Phrases that classify a query as a synthesis request.
    pub synthesis_phrases: Vec<String>,
    /// WH-words that, outside quotes, bias toward `fact`.
    pub fact_wh_words: Vec<String>,
    /// Whether a trailing `?` alone is enough to classify as `fact`.
    pub question_mark_is_fact: bool,
    /// Token-count cutoff below which an unmatched query is `lookup`.
    pub short_lookup_token_cutoff: usize,
    /// Per-intent pipeline settings.
    pub pipeline_settings: PipelineSettingsTable,
}

impl Default for RouterPolicy {
    fn default() -> Self {
        Self {
            definition_phrases: vec!["define".into(), "definition of".into(), "meaning of".into(), "what is".into(), "what are".into()],
            steps_phrases: vec!["how do i".into(), "how to".into(), "step by step".into(), "steps to".into(), "checklist".into(), "plan for".into(), "todo".into()],
            summary_phrases: vec!["summarize".into(), "summary of".into(), "overall".into(), "in summary".into(), "give me an overview".into()],
            lookup_explicit_phrases: vec!["exact".into(), "verbatim".into(), "quote".into()],
            compare_phrases: vec!["compare".into(), "difference between".into(), "vs".into(), "versus".into()],
            timeline_phrases: vec!["timeline".into(), "chronology".into(), "milestones".into(), "dates".into()],
            task_phrases: vec!["checklist".into(), "plan".into(), "todo".into()],
            synthesis_phrases: vec!["combine".into(), "synthesize".into(), "across sources".into(), "overall".into(), "merge".into()],
            fact_wh_words: vec!["what".into(), "who".into(), "where".into(), "when".into(), "why".into(), "how".into(), "which".into()],
            question_mark_is_fact: true,
            short_lookup_token_cutoff: 4,
            pipeline_settings: PipelineSettingsTable::default(),
        }
    }
}

impl RouterPolicy {
    /// Loads the built-in default policy, optionally overridden wholesale by
    /// a JSON file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is given but unreadable or does not parse
    /// into the sealed [`RouterPolicy`] shape.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read router policy {}: {e}", path.display()),
        })?;
        serde_json::from_str(&contents).map_err(|e| Error::Config {
            message: format!("invalid router policy {}: {e}", path.display()),
        })
    }

    /// Loads the policy per [`RouterConfig`]: the built-in default or
    /// `policy_path`'s JSON override, with `short_lookup_token_cutoff`
    /// taken from `config` rather than the policy file, since it is an
    /// env-overridable runtime tunable rather than part of the sealed
    /// phrase-list table.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`Self::load`].
    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        let mut policy = Self::load(config.policy_path.as_deref())?;
        policy.short_lookup_token_cutoff = config.short_lookup_token_cutoff;
        Ok(policy)
    }
}

fn contains_any(text: &str, phrases: &[String]) -> bool {
    phrases.iter().any(|phrase| text.contains(phrase.as_str()))
}

fn detect_flags(normalized: &str, policy: &RouterPolicy, signals: &mut Vec<String>) -> RouteFlags {
    let wants_definition = contains_any(normalized, &policy.definition_phrases);
    let wants_steps = contains_any(normalized, &policy.steps_phrases);
    let wants_summary = contains_any(normalized, &policy.summary_phrases);

    if wants_definition {
        signals.push("definition_phrase".to_string());
    }
    if wants_steps {
        signals.push("steps_phrase".to_string());
    }
    if wants_summary {
        signals.push("summary_phrase".to_string());
    }

    RouteFlags {
        wants_definition,
        wants_steps,
        wants_summary,
    }
}

fn contains_wh_word(normalized: &str, wh_words: &[String]) -> bool {
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    wh_words
        .iter()
        .any(|wh| tokens.first().is_some_and(|first| first.trim_matches(|c: char| !c.is_alphanumeric()) == wh))
}

fn classify_primary_intent(
    normalized: &str,
    flags: RouteFlags,
    policy: &RouterPolicy,
    signals: &mut Vec<String>,
) -> Intent {
    if normalized.is_empty() {
        return Intent::Other;
    }

    if normalized.contains('"') || contains_any(normalized, &policy.lookup_explicit_phrases) {
        signals.push("explicit_lookup".to_string());
        return Intent::Lookup;
    }
    if contains_any(normalized, &policy.compare_phrases) {
        signals.push("compare_phrase".to_string());
        return Intent::Compare;
    }
    if contains_any(normalized, &policy.timeline_phrases) {
        signals.push("timeline_phrase".to_string());
        return Intent::Timeline;
    }
    if flags.wants_steps || contains_any(normalized, &policy.task_phrases) {
        signals.push("task_phrase".to_string());
        return Intent::Task;
    }
    if flags.wants_summary || contains_any(normalized, &policy.synthesis_phrases) {
        signals.push("synthesis_phrase".to_string());
        return Intent::Synthesis;
    }
    if flags.wants_definition
        || (policy.question_mark_is_fact && normalized.ends_with('?'))
        || contains_wh_word(normalized, &policy.fact_wh_words)
    {
        signals.push("fact_phrase".to_string());
        return Intent::Fact;
    }
    if normalized.split_whitespace().count() <= policy.short_lookup_token_cutoff {
        signals.push("short_query".to_string());
        return Intent::Lookup;
    }
    Intent::Other
}

fn to_pipeline_settings(row: PolicyRow) -> PipelineSettings {
    PipelineSettings {
        k: row.k,
        lexical_weight: row.lexical_weight,
        allow_multihop: row.allow_multihop,
        use_rerank: row.use_rerank,
        generate_answer: row.generate_answer,
        verifier_mode: row.verifier_mode,
        max_repair_passes: row.max_repair_passes,
    }
}

/// Classifies a query and returns the recommended pipeline policy.
#[must_use]
pub fn route(query: &str, policy: &RouterPolicy) -> RouteDecision {
    let normalized = query.trim().to_lowercase();
    let mut signals = Vec::new();
    let flags = detect_flags(&normalized, policy, &mut signals);
    let primary_intent = classify_primary_intent(&normalized, flags, policy, &mut signals);
    let settings = to_pipeline_settings(policy.pipeline_settings.row_for(primary_intent));

    RouteDecision {
        primary_intent,
        flags,
        settings,
        signals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_query_is_explicit_lookup() {
        let decision = route(r#"find "exact phrase" in my notes"#, &RouterPolicy::default());
        assert_eq!(decision.primary_intent, Intent::Lookup);
        assert!(decision.signals.contains(&"explicit_lookup".to_string()));
    }

    #[test]
    fn compare_phrase_wins_over_fact_question_mark() {
        let decision = route("compare rust vs go?", &RouterPolicy::default());
        assert_eq!(decision.primary_intent, Intent::Compare);
    }

    #[test]
    fn timeline_phrase_is_classified_as_timeline() {
        let decision = route("what is the timeline of the project", &RouterPolicy::default());
        assert_eq!(decision.primary_intent, Intent::Timeline);
    }

    #[test]
    fn steps_phrase_sets_flag_and_task_intent() {
        let decision = route("how to set up the database step by step", &RouterPolicy::default());
        assert!(decision.flags.wants_steps);
        assert_eq!(decision.primary_intent, Intent::Task);
    }

    #[test]
    fn summary_phrase_is_synthesis() {
        let decision = route("summarize the quarterly reports across sources", &RouterPolicy::default());
        assert_eq!(decision.primary_intent, Intent::Synthesis);
    }

    #[test]
    fn trailing_question_mark_is_fact() {
        let decision = route("does the backup job run nightly?", &RouterPolicy::default());
        assert_eq!(decision.primary_intent, Intent::Fact);
    }

    #[test]
    fn short_unmatched_query_is_lookup() {
        let decision = route("redis config", &RouterPolicy::default());
        assert_eq!(decision.primary_intent, Intent::Lookup);
        assert!(decision.signals.contains(&"short_query".to_string()));
    }

    #[test]
    fn long_unmatched_query_is_other() {
        let decision = route(
            "here is a long rambling sentence with nothing that matches any rule at all",
            &RouterPolicy::default(),
        );
        assert_eq!(decision.primary_intent, Intent::Other);
    }

    #[test]
    fn empty_query_is_other() {
        let decision = route("   ", &RouterPolicy::default());
        assert_eq!(decision.primary_intent, Intent::Other);
    }

    #[test]
    fn settings_match_spec_table_for_synthesis() {
        let decision = route("synthesize the findings across sources", &RouterPolicy::default());
        assert_eq!(decision.settings.k, 24);
        assert!((decision.settings.lexical_weight - 0.4).abs() < f64::EPSILON);
        assert!(decision.settings.allow_multihop);
        assert_eq!(decision.settings.verifier_mode, VerifierMode::StrictConflict);
    }

    #[test]
    fn policy_load_without_path_is_default() {
        let policy = RouterPolicy::load(None).expect("load");
        assert_eq!(policy, RouterPolicy::default());
    }
}
