//! Weighted Reciprocal Rank Fusion.
//!
//! Based on: Cormack, Clarke, Buettcher (2009) - "Reciprocal Rank Fusion
//! outperforms Condorcet and individual Rank Learning Methods".

use std::collections::HashMap;

/// Fuses a lexical and a vector ranking into one score per chunk id.
///
/// `score(c) = w_lex/(rrf_k + rank_lex(c)) + (1-w_lex)/(rrf_k + rank_vec(c))`,
/// where a missing rank in either list contributes zero. `w_lex` is clipped
/// to `[0, 1]`.
///
/// # Examples
///
/// ```
/// use psl_rs::retrieval::rrf::fuse;
///
/// let lexical = vec![1, 2, 3];
/// let vector = vec![3, 1, 2];
/// let fused = fuse(&lexical, &vector, 0.5, 60);
/// assert_eq!(fused.len(), 3);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn fuse(lexical: &[i64], vector: &[i64], lexical_weight: f64, rrf_k: u32) -> Vec<(i64, f64)> {
    let w_lex = lexical_weight.clamp(0.0, 1.0);
    let w_vec = 1.0 - w_lex;

    let mut scores: HashMap<i64, f64> = HashMap::new();

    for (rank, &chunk_id) in lexical.iter().enumerate() {
        let contribution = w_lex / f64::from(rrf_k + rank as u32 + 1);
        *scores.entry(chunk_id).or_insert(0.0) += contribution;
    }
    for (rank, &chunk_id) in vector.iter().enumerate() {
        let contribution = w_vec / f64::from(rrf_k + rank as u32 + 1);
        *scores.entry(chunk_id).or_insert(0.0) += contribution;
    }

    let mut results: Vec<(i64, f64)> = scores.into_iter().collect();
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_only_chunk_scores_from_lexical_term() {
        let lexical = vec![1];
        let vector: Vec<i64> = vec![];
        let fused = fuse(&lexical, &vector, 0.5, 60);
        assert_eq!(fused[0].0, 1);
        assert!((fused[0].1 - 0.5 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn chunk_in_both_lists_sums_both_contributions() {
        let lexical = vec![1];
        let vector = vec![1];
        let fused = fuse(&lexical, &vector, 0.5, 60);
        let expected = 0.5 / 61.0 + 0.5 / 61.0;
        assert!((fused[0].1 - expected).abs() < 1e-12);
    }

    #[test]
    fn weight_is_clamped_into_unit_interval() {
        let lexical = vec![1];
        let vector = vec![2];
        let fused = fuse(&lexical, &vector, 5.0, 60);
        let score1 = fused.iter().find(|(id, _)| *id == 1).unwrap().1;
        let score2 = fused.iter().find(|(id, _)| *id == 2).unwrap().1;
        assert!((score1 - 1.0 / 61.0).abs() < 1e-12);
        assert!(score2.abs() < 1e-12);
    }

    #[test]
    fn results_sorted_descending_by_score() {
        let lexical = vec![1, 2, 3];
        let vector: Vec<i64> = vec![];
        let fused = fuse(&lexical, &vector, 1.0, 60);
        assert_eq!(fused[0].0, 1);
        assert!(fused[0].1 > fused[1].1);
        assert!(fused[1].1 > fused[2].1);
    }

    #[test]
    fn empty_lists_produce_empty_fusion() {
        let fused = fuse(&[], &[], 0.5, 60);
        assert!(fused.is_empty());
    }
}
