//! Deterministic extractive answer synthesis with claim-level citations.
//!
//! Four stages over the fused, retrieved evidence: candidate generation
//! (one candidate per sentence per chunk), a topical-overlap filter, a
//! supportability filter, then grouping near-duplicate candidates and
//! picking one representative claim per group up to the intent's claim cap.

use crate::config::AnsweringConfig;
use crate::core::{Citation, Claim, DraftAnswer, Intent, ScoredChunk};
use crate::text::tokenize;
use std::collections::HashSet;

const MIN_SENTENCE_LEN: usize = 24;

struct Candidate {
    sentence: String,
    chunk: ScoredChunk,
    overlap_score: f64,
    supportability_score: f64,
    stage_score: f64,
    signature: String,
    sentence_tokens: HashSet<String>,
    semantic_tokens: HashSet<String>,
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        let boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|next| next.is_whitespace());
        if boundary || c == '\n' {
            let trimmed = current.trim().to_string();
            if !trimmed.is_empty() {
                sentences.push(trimmed);
            }
            current.clear();
        }
    }
    let trimmed = current.trim().to_string();
    if !trimmed.is_empty() {
        sentences.push(trimmed);
    }
    sentences.into_iter().filter(|s| s.len() >= MIN_SENTENCE_LEN).collect()
}

fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Snaps `idx` down to the nearest valid UTF-8 char boundary in `s`, clamped to `s.len()`.
fn char_boundary_floor(s: &str, idx: usize) -> usize {
    let mut idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn is_stopword(token: &str) -> bool {
    matches!(
        token,
        "a" | "an"
            | "and"
            | "are"
            | "as"
            | "at"
            | "be"
            | "by"
            | "for"
            | "from"
            | "how"
            | "in"
            | "is"
            | "it"
            | "of"
            | "on"
            | "or"
            | "that"
            | "the"
            | "to"
            | "was"
            | "what"
            | "when"
            | "where"
            | "which"
            | "with"
    )
}

fn normalize_token(token: &str) -> String {
    if token.len() <= 4 {
        return token.to_string();
    }
    if token.ends_with("ies") && token.len() > 5 {
        return format!("{}y", &token[..token.len() - 3]);
    }
    if token.ends_with("ing") && token.len() > 6 {
        return token[..token.len() - 3].to_string();
    }
    if token.ends_with("ed") && token.len() > 5 {
        return token[..token.len() - 2].to_string();
    }
    if token.ends_with('s') && token.len() > 4 {
        return token[..token.len() - 1].to_string();
    }
    if token.len() > 6 {
        token[..6].to_string()
    } else {
        token.to_string()
    }
}

fn semantic_tokens(sentence: &str) -> HashSet<String> {
    tokenize(sentence)
        .into_iter()
        .filter(|token| !is_stopword(token) && token.len() >= 3)
        .map(|token| normalize_token(&token))
        .collect()
}

fn claim_signature(sentence: &str) -> String {
    let tokens = semantic_tokens(sentence);
    if tokens.is_empty() {
        return String::new();
    }
    let mut shortened: Vec<String> = tokens
        .into_iter()
        .map(|t| if t.len() > 5 { t[..5].to_string() } else { t })
        .collect();
    shortened.sort();
    shortened.dedup();
    shortened.truncate(12);
    shortened.join(" ")
}

fn supportability(sentence_tokens: &HashSet<String>, chunk_tokens: &HashSet<String>) -> f64 {
    if sentence_tokens.is_empty() {
        return 0.0;
    }
    let hits = sentence_tokens.intersection(chunk_tokens).count();
    hits as f64 / sentence_tokens.len() as f64
}

/// Finds `needle` in `haystack` case-insensitively, matching char-by-char
/// against the original text so the returned byte offsets are always valid
/// in `haystack` itself — unlike matching against a separately-lowercased
/// copy, this can't drift when a character's lowercase form has a different
/// byte length (e.g. U+0130 İ lowercases to two code points).
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let needle_chars: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle_chars.is_empty() {
        return None;
    }
    let chars: Vec<(usize, char)> = haystack.char_indices().collect();
    'outer: for start_idx in 0..chars.len() {
        let mut needle_pos = 0;
        let mut char_idx = start_idx;
        while needle_pos < needle_chars.len() {
            let Some(&(_, c)) = chars.get(char_idx) else {
                continue 'outer;
            };
            for lowered in c.to_lowercase() {
                if needle_pos >= needle_chars.len() || lowered != needle_chars[needle_pos] {
                    continue 'outer;
                }
                needle_pos += 1;
            }
            char_idx += 1;
        }
        let start = chars[start_idx].0;
        let end = chars.get(char_idx).map_or(haystack.len(), |(offset, _)| *offset);
        return Some((start, end));
    }
    None
}

/// Locates the sentence (or a best-effort span) inside the chunk text and
/// scores how well it matches, returning a citation plus its span quality.
fn citation_for_sentence(claim_id: &str, sentence: &str, chunk: &ScoredChunk) -> (Citation, f64) {
    if let Some((start, end)) = find_case_insensitive(&chunk.chunk_text, sentence) {
        let span_len = (end - start).max(1);
        let span_text = &chunk.chunk_text[start..end];
        let sentence_tokens = token_set(sentence);
        let span_tokens = token_set(span_text);
        let overlap = sentence_tokens.intersection(&span_tokens).count() as f64
            / sentence_tokens.len().max(1) as f64;
        let quality = (span_len as f64 / sentence.len().max(1) as f64).min(1.0) * 0.7 + overlap * 0.3;

        return (
            Citation {
                claim_id: claim_id.to_string(),
                chunk_id: chunk.chunk_id,
                source_path: chunk.source_path.clone(),
                page: chunk.page,
                quote_span_start: start,
                quote_span_end: end,
                span_quality: quality,
            },
            quality,
        );
    }

    let raw_span = chunk.chunk_text.len().min(80.max(sentence.len()));
    let span = char_boundary_floor(&chunk.chunk_text, raw_span);
    let span_text = chunk.chunk_text[..span].to_lowercase();
    let sentence_tokens = token_set(sentence);
    let span_tokens = token_set(&span_text);
    let overlap = sentence_tokens.intersection(&span_tokens).count() as f64
        / sentence_tokens.len().max(1) as f64;
    let quality = (span as f64 / chunk.chunk_text.len().max(1) as f64).min(1.0) * 0.4 + overlap * 0.4;
    (
        Citation {
            claim_id: claim_id.to_string(),
            chunk_id: chunk.chunk_id,
            source_path: chunk.source_path.clone(),
            page: chunk.page,
            quote_span_start: 0,
            quote_span_end: span,
            span_quality: quality,
        },
        quality,
    )
}

fn candidate_stage(sentence: String, chunk: ScoredChunk, query_tokens: &HashSet<String>) -> Candidate {
    let sentence_tokens = token_set(&sentence);
    let chunk_tokens = token_set(&chunk.chunk_text);
    let overlap_count = sentence_tokens.intersection(query_tokens).count();
    let overlap_score = overlap_count as f64 / query_tokens.len().max(1) as f64;
    let supportability_score = supportability(&sentence_tokens, &chunk_tokens);
    let citation_span_quality = (sentence.len() as f64 / chunk.chunk_text.len().max(1) as f64).min(1.0);
    let stage_score = chunk.score
        + overlap_score * 1.2
        + supportability_score * 1.0
        + citation_span_quality * 0.6;
    let signature = claim_signature(&sentence);
    let semantic = semantic_tokens(&sentence);
    Candidate {
        sentence,
        chunk,
        overlap_score,
        supportability_score,
        stage_score,
        signature,
        sentence_tokens,
        semantic_tokens: semantic,
    }
}

fn group_candidates(candidates: Vec<Candidate>) -> Vec<Vec<Candidate>> {
    let mut groups: Vec<Vec<Candidate>> = Vec::new();
    for candidate in candidates {
        let mut attached_at = None;
        for (idx, group) in groups.iter().enumerate() {
            let rep = &group[0];
            if !candidate.signature.is_empty() && candidate.signature == rep.signature {
                attached_at = Some(idx);
                break;
            }
            let overlap = candidate.semantic_tokens.intersection(&rep.semantic_tokens).count();
            let union = candidate.semantic_tokens.union(&rep.semantic_tokens).count();
            if union == 0 {
                continue;
            }
            let jaccard = overlap as f64 / union as f64;
            let smaller = candidate.semantic_tokens.len().min(rep.semantic_tokens.len()).max(1);
            let containment = overlap as f64 / smaller as f64;
            if jaccard >= 0.6 || containment >= 0.7 {
                attached_at = Some(idx);
                break;
            }
        }
        match attached_at {
            Some(idx) => groups[idx].push(candidate),
            None => groups.push(vec![candidate]),
        }
    }
    groups
}

fn representative_candidate(group: &[Candidate], min_span_quality: f64) -> usize {
    if group.len() == 1 {
        return 0;
    }
    let mut best_idx = 0;
    let mut best_key = None;
    for (idx, candidate) in group.iter().enumerate() {
        let mut source_best: std::collections::HashMap<&str, f64> = std::collections::HashMap::new();
        for peer in group {
            let (_, quality) = citation_for_sentence("tmp", &candidate.sentence, &peer.chunk);
            let entry = source_best.entry(peer.chunk.source_path.as_str()).or_insert(0.0);
            if quality > *entry {
                *entry = quality;
            }
        }
        let supported_sources = source_best.values().filter(|q| **q >= min_span_quality).count();
        let avg_quality = source_best.values().sum::<f64>() / source_best.len().max(1) as f64;
        let key = (
            supported_sources,
            ordered_float(avg_quality),
            ordered_float(candidate.stage_score),
            std::cmp::Reverse(candidate.sentence.len()),
        );
        if best_key.as_ref().is_none_or(|current| &key > current) {
            best_key = Some(key);
            best_idx = idx;
        }
    }
    best_idx
}

fn ordered_float(value: f64) -> i64 {
    (value * 1_000_000.0).round() as i64
}

fn claim_limit(intent: Intent) -> usize {
    match intent {
        Intent::Synthesis | Intent::Compare | Intent::Timeline => 5,
        Intent::Task => 4,
        _ => 3,
    }
}

/// Builds a deterministic extractive draft answer from retrieved evidence.
///
/// Four stages: candidate generation per sentence, a topical-overlap
/// filter, a supportability filter, then grouping near-duplicate claims and
/// selecting one representative per group up to the intent's claim cap.
/// Falls back to a single low-confidence claim from the top chunk when no
/// candidate survives filtering, so a non-empty evidence set never yields
/// an empty draft.
#[must_use]
pub fn synthesize_extractive(
    query: &str,
    chunks: &[ScoredChunk],
    intent: Intent,
    searched_queries: Vec<String>,
    config: &AnsweringConfig,
) -> DraftAnswer {
    let query_tokens = token_set(query);
    let topical_floor = if matches!(intent, Intent::Fact | Intent::Other | Intent::Task) {
        config.answer_min_topic_overlap.max(2)
    } else {
        config.answer_min_topic_overlap
    };

    let mut candidates = Vec::new();
    for chunk in chunks {
        for sentence in split_sentences(&chunk.chunk_text) {
            candidates.push(candidate_stage(sentence, chunk.clone(), &query_tokens));
        }
    }

    let topical: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| c.sentence_tokens.intersection(&query_tokens).count() >= topical_floor)
        .collect();

    let supportable: Vec<Candidate> = topical
        .into_iter()
        .filter(|c| c.supportability_score >= config.answer_min_supportability)
        .collect();

    let mut grouped = group_candidates(supportable);
    grouped.sort_by(|a, b| {
        let sources_a = a.iter().map(|c| c.chunk.source_path.as_str()).collect::<HashSet<_>>().len();
        let sources_b = b.iter().map(|c| c.chunk.source_path.as_str()).collect::<HashSet<_>>().len();
        let max_a = a.iter().map(|c| c.stage_score).fold(f64::MIN, f64::max);
        let max_b = b.iter().map(|c| c.stage_score).fold(f64::MIN, f64::max);
        let avg_a = a.iter().map(|c| c.stage_score).sum::<f64>() / a.len().max(1) as f64;
        let avg_b = b.iter().map(|c| c.stage_score).sum::<f64>() / b.len().max(1) as f64;
        (sources_b, ordered_float(max_b), ordered_float(avg_b)).cmp(&(sources_a, ordered_float(max_a), ordered_float(avg_a)))
    });

    let claim_cap = claim_limit(intent);
    let prefer_multi_source = intent.is_synthesis_family();

    let ordered_groups: Vec<Vec<Candidate>> = if prefer_multi_source {
        let mut multi = Vec::new();
        let mut single = Vec::new();
        for group in grouped {
            let sources = group.iter().map(|c| c.chunk.source_path.as_str()).collect::<HashSet<_>>().len();
            if sources >= 2 {
                multi.push(group);
            } else {
                single.push(group);
            }
        }
        multi.into_iter().chain(single).collect()
    } else {
        grouped
    };

    let mut selected: Vec<Claim> = Vec::new();
    let mut seen_signatures: HashSet<String> = HashSet::new();

    for mut group in ordered_groups {
        let rep_idx = representative_candidate(&group, config.answer_min_citation_span_quality);
        let representative_sentence = group[rep_idx].sentence.clone();
        let representative_signature = group[rep_idx].signature.clone();
        if representative_signature.is_empty() || seen_signatures.contains(&representative_signature) {
            continue;
        }

        group.sort_by(|a, b| ordered_float(b.stage_score).cmp(&ordered_float(a.stage_score)));

        let claim_id = format!("c{}", selected.len() + 1);
        let mut unique_sources: HashSet<String> = HashSet::new();
        let mut citations = Vec::new();
        let mut citation_qualities = Vec::new();
        for candidate in &group {
            if unique_sources.contains(&candidate.chunk.source_path) {
                continue;
            }
            let (citation, span_quality) =
                citation_for_sentence(&claim_id, &representative_sentence, &candidate.chunk);
            if span_quality < config.answer_min_citation_span_quality {
                continue;
            }
            unique_sources.insert(candidate.chunk.source_path.clone());
            citations.push(citation);
            citation_qualities.push(span_quality);
            if citations.len() >= 2 {
                break;
            }
        }
        if citations.is_empty() {
            continue;
        }

        let overlap_score = group.iter().map(|c| c.overlap_score).fold(f64::MIN, f64::max);
        let supportability_score = group.iter().map(|c| c.supportability_score).fold(f64::MIN, f64::max);
        let mean_span_quality = citation_qualities.iter().sum::<f64>() / citation_qualities.len() as f64;

        selected.push(Claim {
            claim_id,
            text: representative_sentence,
            citations,
            overlap_score,
            supportability_score,
            citation_span_quality: mean_span_quality,
            source_count: unique_sources.len(),
        });
        seen_signatures.insert(representative_signature);
        if selected.len() >= claim_cap {
            break;
        }
    }

    if selected.is_empty() {
        if let Some(top) = chunks.first() {
            let fallback_text: String = top.chunk_text.trim().chars().take(200).collect();
            let claim_id = "c1".to_string();
            let (citation, span_quality) = citation_for_sentence(&claim_id, &fallback_text, top);
            selected.push(Claim {
                claim_id,
                text: fallback_text,
                citations: vec![citation],
                overlap_score: 0.0,
                supportability_score: 0.0,
                citation_span_quality: span_quality,
                source_count: 1,
            });
        }
    }

    DraftAnswer::new(selected, searched_queries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: i64, source: &str, text: &str, score: f64) -> ScoredChunk {
        ScoredChunk {
            chunk_id: id,
            doc_id: id,
            score,
            chunk_text: text.to_string(),
            source_path: source.to_string(),
            page: None,
        }
    }

    #[test]
    fn synthesizes_single_claim_from_one_chunk() {
        let chunks = vec![chunk(
            1,
            "notes.md",
            "The quarterly revenue grew by twelve percent across all regions this year.",
            0.9,
        )];
        let draft = synthesize_extractive(
            "quarterly revenue growth",
            &chunks,
            Intent::Fact,
            vec!["quarterly revenue growth".to_string()],
            &AnsweringConfig::default(),
        );
        assert_eq!(draft.claims.len(), 1);
        assert!(draft.claims[0].has_citations());
        assert!(draft.answer_text.contains("revenue"));
    }

    #[test]
    fn empty_evidence_yields_empty_draft() {
        let draft = synthesize_extractive(
            "anything",
            &[],
            Intent::Fact,
            vec!["anything".to_string()],
            &AnsweringConfig::default(),
        );
        assert!(draft.is_empty());
    }

    #[test]
    fn unrelated_chunk_is_filtered_by_topical_overlap() {
        let chunks = vec![chunk(
            1,
            "weather.md",
            "The weather today is sunny with a light breeze from the northwest.",
            0.5,
        )];
        let draft = synthesize_extractive(
            "database migration plan",
            &chunks,
            Intent::Fact,
            vec!["database migration plan".to_string()],
            &AnsweringConfig::default(),
        );
        assert!(draft.is_empty());
    }

    #[test]
    fn synthesis_intent_prefers_multi_source_claims() {
        let chunks = vec![
            chunk(1, "a.md", "The migration plan starts with a full backup of the production database.", 0.8),
            chunk(2, "b.md", "The migration plan starts with a full backup of the production database before any schema change.", 0.7),
        ];
        let draft = synthesize_extractive(
            "migration plan backup database",
            &chunks,
            Intent::Synthesis,
            vec!["migration plan backup database".to_string()],
            &AnsweringConfig::default(),
        );
        assert!(!draft.claims.is_empty());
        assert!(draft.claims[0].source_count >= 1);
    }

    #[test]
    fn handles_case_folding_that_expands_byte_length() {
        // U+0130 (Turkish dotted capital I) lowercases to two code points
        // ('i' + combining dot above), so matching case-insensitively must
        // not assume the lowered and original text have equal byte length.
        let text = "Istanbul\u{130} is a major city with a long history.";
        let chunks = vec![chunk(1, "notes.md", text, 0.6)];
        let draft = synthesize_extractive(
            "Istanbul major city history",
            &chunks,
            Intent::Fact,
            vec!["Istanbul major city history".to_string()],
            &AnsweringConfig::default(),
        );
        assert!(!draft.claims.is_empty());
        for claim in &draft.claims {
            for citation in &claim.citations {
                let quoted = &text[citation.quote_span_start..citation.quote_span_end];
                assert!(text.contains(quoted));
            }
        }
    }

    #[test]
    fn case_insensitive_match_offsets_land_in_original_text() {
        let haystack = "Istanbul\u{130} is a major city with a long history.";
        let (start, end) = find_case_insensitive(haystack, "is a major city").expect("match");
        assert_eq!(&haystack[start..end], "is a major city");
    }

    #[test]
    fn handles_multibyte_text_without_panicking() {
        let chunks = vec![chunk(
            1,
            "café.md",
            "Die Kundenübersicht zeigt die Softwarepläne für Ärzte und Ingenieure genau an.",
            0.8,
        )];
        let draft = synthesize_extractive(
            "Kundenübersicht Softwarepläne Ärzte Ingenieure",
            &chunks,
            Intent::Fact,
            vec!["Kundenübersicht Softwarepläne Ärzte Ingenieure".to_string()],
            &AnsweringConfig::default(),
        );
        assert!(!draft.claims.is_empty());
    }

    #[test]
    fn claim_cap_respects_intent_limit() {
        let text = "Alpha step finishes first. Beta step finishes second. Gamma step finishes third. \
                     Delta step finishes fourth. Epsilon step finishes fifth. Zeta step finishes sixth.";
        let chunks = vec![chunk(1, "steps.md", text, 0.6)];
        let draft = synthesize_extractive(
            "step finishes",
            &chunks,
            Intent::Other,
            vec!["step finishes".to_string()],
            &AnsweringConfig::default(),
        );
        assert!(draft.claims.len() <= claim_limit(Intent::Other));
    }
}
