//! Text normalization applied before chunking and indexing.

/// Casefolds and collapses whitespace for lexical-match consistency.
///
/// Not a true Unicode NFKC pass (no `unicode-normalization` dependency is
/// carried for it); lowercasing plus whitespace collapse covers the cases
/// this corpus actually hits (markdown, plain text, HTML-stripped text).
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_lowercases() {
        assert_eq!(normalize_text("  Hello   World\n\tFoo  "), "hello world foo");
    }

    #[test]
    fn empty_input_yields_empty_string() {
        assert_eq!(normalize_text("   \n\t  "), "");
    }
}
