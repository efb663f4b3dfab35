//! Text preparation for embedding input.
//!
//! Documents are trimmed and truncated to a character limit before they
//! reach the embedding backend. The same prepared text is hashed to key the
//! on-disk embedding cache.

use sha2::{Digest, Sha256};

/// Ellipsis suffix when content is truncated
const TRUNCATION_SUFFIX: &str = "...";

/// Prepare a document for embedding: trim, then truncate to `max_chars`.
///
/// Whitespace-only documents become the empty string; they still get an
/// embedding so that document ids stay aligned with the input order.
pub fn preprocess_text(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    // Count characters, not bytes, so UTF-8 sequences are never split
    if max_chars <= TRUNCATION_SUFFIX.len() {
        return text.chars().take(max_chars).collect();
    }
    let keep = max_chars - TRUNCATION_SUFFIX.len();
    let truncated: String = text.chars().take(keep).collect();

    format!("{}{}", truncated, TRUNCATION_SUFFIX)
}

/// Stable hash of prepared text, used as the embedding cache key.
///
/// First 8 bytes of SHA-256 so the key survives process and toolchain changes.
pub fn content_hash(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(preprocess_text("  hello world \n", 100), "hello world");
    }

    #[test]
    fn test_empty_stays_empty() {
        assert_eq!(preprocess_text("   \t", 100), "");
    }

    #[test]
    fn test_truncation() {
        let long = "x".repeat(600);
        let result = preprocess_text(&long, 512);

        assert_eq!(result.chars().count(), 512);
        assert!(result.ends_with(TRUNCATION_SUFFIX));
    }

    #[test]
    fn test_truncation_respects_utf8() {
        let long = "é".repeat(50);
        let result = preprocess_text(&long, 10);
        assert_eq!(result.chars().count(), 10);
        assert!(result.starts_with("ééééééé"));
    }

    #[test]
    fn test_tiny_limit_never_exceeds_max_chars() {
        for max_chars in 0..=4 {
            let result = preprocess_text("abcdefgh", max_chars);
            assert!(result.chars().count() <= max_chars, "limit {max_chars}: {result:?}");
        }
        assert_eq!(preprocess_text("abcdefgh", 2), "ab");
        assert_eq!(preprocess_text("abcdefgh", 4), "a...");
    }

    #[test]
    fn test_no_truncation_for_short_content() {
        assert_eq!(preprocess_text("Short title", 512), "Short title");
    }

    #[test]
    fn test_content_hash_consistency() {
        assert_eq!(content_hash("same text"), content_hash("same text"));
    }

    #[test]
    fn test_content_hash_differs() {
        assert_ne!(content_hash("text a"), content_hash("text b"));
    }
}
