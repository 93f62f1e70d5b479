//! Sliding-window chunking for ingestion.

use crate::error::{IngestionError, Result};

/// One contiguous span of a document's normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Chunk text, a substring of the normalized document text.
    pub text: String,
    /// Byte offset of the span's start within the normalized text.
    pub start_offset: usize,
    /// Byte offset of the span's end within the normalized text.
    pub end_offset: usize,
}

/// Splits `text` into overlapping spans of at most `chunk_size` bytes, each
/// one advancing by `chunk_size - overlap` bytes, snapped to UTF-8 character
/// boundaries so no span splits a multi-byte character.
///
/// # Errors
///
/// Returns an error if `chunk_size` is zero, `overlap` is negative relative
/// to `chunk_size`, or `overlap >= chunk_size`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<ChunkSpan>> {
    if chunk_size == 0 {
        return Err(IngestionError::InvalidChunkConfig {
            reason: "chunk_size must be positive".to_string(),
        }
        .into());
    }
    if overlap >= chunk_size {
        return Err(IngestionError::InvalidChunkConfig {
            reason: "overlap must be smaller than chunk_size".to_string(),
        }
        .into());
    }

    let len = text.len();
    if len == 0 {
        return Ok(Vec::new());
    }

    let stride = chunk_size - overlap;
    let mut spans = Vec::new();
    let mut cursor = 0;
    loop {
        let end = char_boundary_at_or_before(text, (cursor + chunk_size).min(len));
        if end <= cursor {
            break;
        }
        spans.push(ChunkSpan {
            text: text[cursor..end].to_string(),
            start_offset: cursor,
            end_offset: end,
        });
        if end == len {
            break;
        }
        let next_cursor = char_boundary_at_or_before(text, cursor + stride);
        cursor = if next_cursor > cursor {
            next_cursor
        } else {
            // Stride landed back on `cursor` (smaller than the next character's
            // byte width); force forward progress to the next char boundary.
            char_boundary_at_or_after(text, cursor + 1)
        };
    }
    Ok(spans)
}

fn char_boundary_at_or_before(text: &str, pos: usize) -> usize {
    let mut pos = pos.min(text.len());
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

fn char_boundary_at_or_after(text: &str, pos: usize) -> usize {
    let mut pos = pos.min(text.len());
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_short_block_yields_one_span() {
        let spans = chunk_text("hello world", 1_000, 100).expect("chunk");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "hello world");
    }

    #[test]
    fn long_text_is_split_with_overlap() {
        let text = "a".repeat(250);
        let spans = chunk_text(&text, 100, 20).expect("chunk");
        assert!(spans.len() >= 3);
        assert_eq!(spans[0].end_offset - spans[0].start_offset, 100);
        assert_eq!(spans[1].start_offset, 80);
    }

    #[test]
    fn never_splits_multibyte_characters() {
        let text = "é".repeat(60);
        let spans = chunk_text(&text, 10, 2).expect("chunk");
        for span in &spans {
            assert!(text.is_char_boundary(span.start_offset));
            assert!(text.is_char_boundary(span.end_offset));
        }
    }

    #[test]
    fn stride_smaller_than_char_width_still_terminates() {
        let text = "\u{1D11E}".repeat(10);
        let spans = chunk_text(&text, 5, 4).expect("chunk");
        assert!(!spans.is_empty());
        for span in &spans {
            assert!(text.is_char_boundary(span.start_offset));
            assert!(text.is_char_boundary(span.end_offset));
        }
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(chunk_text("text", 0, 0).is_err());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        assert!(chunk_text("text", 10, 10).is_err());
    }

    #[test]
    fn empty_text_yields_no_spans() {
        let spans = chunk_text("", 100, 10).expect("chunk");
        assert!(spans.is_empty());
    }
}
