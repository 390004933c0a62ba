//! Content hashing and the token-count estimator shared by every chunker.

use sha2::{Digest, Sha256};

/// Cheap stand-in for a tokenizer: ~4 characters per token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Hex-encoded, lower-case SHA-256 of raw bytes. Used as the reindex
/// invalidation key.
pub fn content_hash(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  hex::encode(hasher.finalize())
}

/// Estimate the token count of a string using [`CHARS_PER_TOKEN`].
pub fn estimate_tokens(text: &str) -> usize {
  text.chars().count().div_ceil(CHARS_PER_TOKEN).max(if text.is_empty() { 0 } else { 1 })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn content_hash_is_stable() {
    let a = content_hash(b"hello world");
    let b = content_hash(b"hello world");
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
  }

  #[test]
  fn content_hash_differs_on_change() {
    assert_ne!(content_hash(b"hello"), content_hash(b"hellp"));
  }

  #[test]
  fn estimate_tokens_empty_is_zero() {
    assert_eq!(estimate_tokens(""), 0);
  }

  #[test]
  fn estimate_tokens_rounds_up() {
    assert_eq!(estimate_tokens("abcde"), 2); // 5 chars / 4 -> 2
    assert_eq!(estimate_tokens("abcd"), 1);
  }
}
