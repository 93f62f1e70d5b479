//! Shared query/sentence tokenization.
//!
//! A single tokenizer definition used by the lexical retriever, router,
//! synthesizer, and verifier so "what counts as a token" stays consistent
//! across the pipeline.

/// Splits text into lowercase word/digit tokens of at least 2 characters.
///
/// Punctuation and other separators are treated as boundaries; runs of
/// alphanumeric characters (including non-ASCII letters) form a token.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|tok| tok.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

/// Tokenizes, then deduplicates preserving first-seen order and caps length.
#[must_use]
pub fn tokenize_deduped_capped(text: &str, cap: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tok in tokenize(text) {
        if seen.insert(tok.clone()) {
            out.push(tok);
            if out.len() >= cap {
                break;
            }
        }
    }
    out
}

/// Returns whether a token is "critical": at least 6 characters, or entirely digits.
#[must_use]
pub fn is_critical_token(token: &str) -> bool {
    token.chars().count() >= 6 || token.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_drops_short_tokens_and_lowercases() {
        let tokens = tokenize("The Quick fox, a 42 test!");
        assert_eq!(tokens, vec!["the", "quick", "fox", "42", "test"]);
    }

    #[test]
    fn tokenize_deduped_capped_preserves_first_seen_order() {
        let tokens = tokenize_deduped_capped("apple banana apple cherry", 10);
        assert_eq!(tokens, vec!["apple", "banana", "cherry"]);
    }

    #[test]
    fn tokenize_deduped_capped_respects_cap() {
        let tokens = tokenize_deduped_capped("one two three four five six", 3);
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn is_critical_token_flags_long_words_and_numbers() {
        assert!(is_critical_token("encryption"));
        assert!(is_critical_token("123456"));
        assert!(!is_critical_token("short"));
    }
}
