//! Fixed-size text chunking.
//!
//! Text is cut into contiguous, non-overlapping windows of `size` characters
//! (Unicode scalar values). The last window holds the remainder. Ingestion and
//! any later re-chunking must agree on boundaries, so the split is purely positional.

use crate::types::{AppError, AppResult};

/// Split `text` into ordered windows of exactly `size` characters, the last one possibly shorter.
pub fn chunk_text(text: &str, size: usize) -> AppResult<Vec<&str>> {
    if size == 0 {
        return Err(AppError::InputValidation(
            "chunk size must be greater than zero".to_string(),
        ));
    }

    let mut chunks = Vec::with_capacity(text.len() / size + 1);
    let mut start = 0;
    let mut count = 0;

    for (byte_idx, _) in text.char_indices() {
        if count == size {
            chunks.push(&text[start..byte_idx]);
            start = byte_idx;
            count = 0;
        }
        count += 1;
    }

    if start < text.len() {
        chunks.push(&text[start..]);
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_len(s: &str) -> usize {
        s.chars().count()
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", 10).unwrap().is_empty());
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let err = chunk_text("abc", 0).unwrap_err();
        assert_eq!(err.kind(), "input_validation");
    }

    #[test]
    fn test_remainder_chunk() {
        let text = "a".repeat(2500);
        let chunks = chunk_text(&text, 1000).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(char_len(chunks[0]), 1000);
        assert_eq!(char_len(chunks[1]), 1000);
        assert_eq!(char_len(chunks[2]), 500);
    }

    #[test]
    fn test_exactly_divisible_length() {
        let text = "abcdef";
        let chunks = chunk_text(text, 2).unwrap();
        assert_eq!(chunks, vec!["ab", "cd", "ef"]);
    }

    #[test]
    fn test_text_shorter_than_size() {
        assert_eq!(chunk_text("hello", 1000).unwrap(), vec!["hello"]);
    }

    #[test]
    fn test_concatenation_reproduces_text() {
        let samples = [
            String::new(),
            "x".to_string(),
            "0123456789".to_string(),
            "The quick brown fox jumps over the lazy dog.\n".repeat(37),
            "héllo wörld ✓ 日本語テキスト 🚀".repeat(11),
        ];

        for text in &samples {
            for size in [1, 3, 7, 10, 64, 1000] {
                let chunks = chunk_text(text, size).unwrap();
                assert_eq!(chunks.concat(), *text, "size {}", size);
                for (i, chunk) in chunks.iter().enumerate() {
                    if i + 1 < chunks.len() {
                        assert_eq!(char_len(chunk), size);
                    } else {
                        assert!(char_len(chunk) <= size && !chunk.is_empty());
                    }
                }
            }
        }
    }

    #[test]
    fn test_multibyte_boundaries() {
        let chunks = chunk_text("日本語テキ", 2).unwrap();
        assert_eq!(chunks, vec!["日本", "語テ", "キ"]);
    }

    #[test]
    fn test_deterministic() {
        let text = "Deterministic chunking is required for reproducible boundaries.".repeat(20);
        assert_eq!(chunk_text(&text, 33).unwrap(), chunk_text(&text, 33).unwrap());
    }
}
