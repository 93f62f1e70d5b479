//! Draft answer, the extractive synthesizer's transient output.

use super::claim::Claim;
use serde::{Deserialize, Serialize};

/// The synthesizer's output before verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftAnswer {
    /// Bullet list of claim texts, in claim order.
    pub answer_text: String,
    /// Ordered claims backing `answer_text`.
    pub claims: Vec<Claim>,
    /// Queries searched to produce this draft (original, plus any follow-up).
    pub searched_queries: Vec<String>,
}

impl DraftAnswer {
    /// Builds a draft answer from an ordered claim list and the queries searched so far.
    #[must_use]
    pub fn new(claims: Vec<Claim>, searched_queries: Vec<String>) -> Self {
        let answer_text = claims
            .iter()
            .map(|c| format!("- {}", c.text))
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            answer_text,
            claims,
            searched_queries,
        }
    }

    /// Returns whether the draft has no claims at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
