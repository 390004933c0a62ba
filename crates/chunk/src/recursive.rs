//! Recursively splits on a separator list (paragraph, line, sentence,
//! word, by default), coalescing splits up to `maxChunkSize` before
//! falling back to the next, finer separator for whatever doesn't fit.

use std::collections::HashMap;

use async_trait::async_trait;
use contextd_core::{estimate_tokens, Chunk, ChunkingConfig, CHARS_PER_TOKEN};
use uuid::Uuid;

use crate::{stamp_chunks, ChunkError, Chunker, Span};

pub struct RecursiveChunker {
  pub max_chunk_size: usize,
  pub overlap: usize,
  pub min_chunk_size: usize,
  pub separators: Vec<String>,
}

impl RecursiveChunker {
  pub fn from_config(config: &ChunkingConfig) -> Self {
    Self {
      max_chunk_size: config.max_chunk_size,
      overlap: config.overlap,
      min_chunk_size: config.min_chunk_size,
      separators: config.recursive_separators.clone(),
    }
  }

  fn split_spans(&self, content: &str) -> Vec<Span> {
    let target_chars = (self.max_chunk_size * CHARS_PER_TOKEN).max(1);
    let overlap_tokens = if self.overlap >= self.max_chunk_size { self.max_chunk_size / 4 } else { self.overlap };
    let overlap_chars = overlap_tokens * CHARS_PER_TOKEN;

    let pieces = split_recursive(content, &self.separators, target_chars);
    coalesce(content, pieces, target_chars, overlap_chars, self.min_chunk_size)
  }
}

#[async_trait]
impl Chunker for RecursiveChunker {
  async fn chunk(&self, document_id: Uuid, container_id: Uuid, content: &str, base_metadata: &HashMap<String, String>) -> Result<Vec<Chunk>, ChunkError> {
    let spans = self.split_spans(content);
    Ok(stamp_chunks(spans, document_id, container_id, "Recursive", base_metadata))
  }
}

/// A single piece of text with its byte offsets relative to the original
/// content, produced by the recursive separator search.
struct Piece {
  start: usize,
  end: usize,
}

/// Splits `content` on the first separator in `separators` that actually
/// divides it; pieces that still exceed `target_chars` are recursively
/// split on the remaining, finer separators. Falls back to a raw
/// character split once separators are exhausted.
fn split_recursive(content: &str, separators: &[String], target_chars: usize) -> Vec<Piece> {
  if content.chars().count() <= target_chars || separators.is_empty() {
    return char_split(content, target_chars);
  }

  let separator = &separators[0];
  let rest = &separators[1..];

  if separator.is_empty() || !content.contains(separator.as_str()) {
    return split_recursive(content, rest, target_chars);
  }

  let mut pieces = Vec::new();
  let mut cursor = 0usize;
  for part in content.split(separator.as_str()) {
    let start = cursor;
    let end = start + part.len();
    if !part.trim().is_empty() {
      if part.chars().count() > target_chars {
        pieces.extend(offset(split_recursive(part, rest, target_chars), start));
      } else {
        pieces.push(Piece { start, end });
      }
    }
    cursor = end + separator.len();
  }
  pieces
}

fn offset(pieces: Vec<Piece>, by: usize) -> Vec<Piece> {
  pieces.into_iter().map(|p| Piece { start: p.start + by, end: p.end + by }).collect()
}

fn char_split(content: &str, target_chars: usize) -> Vec<Piece> {
  let chars: Vec<(usize, char)> = content.char_indices().collect();
  if chars.is_empty() {
    return Vec::new();
  }
  let mut pieces = Vec::new();
  let mut i = 0usize;
  while i < chars.len() {
    let end_idx = (i + target_chars).min(chars.len());
    let start_byte = chars[i].0;
    let end_byte = if end_idx < chars.len() { chars[end_idx].0 } else { content.len() };
    pieces.push(Piece { start: start_byte, end: end_byte });
    i = end_idx;
  }
  pieces
}

/// Greedily coalesces adjacent pieces until the next one would exceed
/// `target_chars`, then emits a chunk and restarts the accumulator seeded
/// with the overlap tail of the previous chunk.
fn coalesce(content: &str, pieces: Vec<Piece>, target_chars: usize, overlap_chars: usize, min_chunk_size: usize) -> Vec<Span> {
  let mut spans = Vec::new();
  let mut acc_start: Option<usize> = None;
  let mut acc_end = 0usize;

  let emit = |spans: &mut Vec<Span>, start: usize, end: usize| {
    let raw = &content[start..end];
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      return;
    }
    let token_count = estimate_tokens(trimmed);
    if token_count < min_chunk_size && !spans.is_empty() {
      return;
    }
    spans.push(Span {
      content: trimmed.to_string(),
      start_offset: content[..start].chars().count(),
      end_offset: content[..end].chars().count(),
    });
  };

  for piece in pieces {
    match acc_start {
      None => {
        acc_start = Some(piece.start);
        acc_end = piece.end;
      }
      Some(start) => {
        let candidate_len = content[start..piece.end].chars().count();
        if candidate_len > target_chars {
          emit(&mut spans, start, acc_end);
          let overlap_start = acc_end.saturating_sub(overlap_chars).max(start);
          acc_start = Some(overlap_start.min(piece.start));
          acc_end = piece.end;
        } else {
          acc_end = piece.end;
        }
      }
    }
  }

  if let Some(start) = acc_start {
    emit(&mut spans, start, acc_end);
  }

  spans
}

#[cfg(test)]
mod tests {
  use super::*;

  fn chunker() -> RecursiveChunker {
    RecursiveChunker {
      max_chunk_size: 10,
      overlap: 2,
      min_chunk_size: 1,
      separators: vec!["\n\n".to_string(), "\n".to_string(), ". ".to_string(), " ".to_string()],
    }
  }

  #[tokio::test]
  async fn splits_on_paragraph_breaks() {
    let content = "first paragraph here.\n\nsecond paragraph here.\n\nthird paragraph here.";
    let chunks = chunker().chunk(Uuid::new_v4(), Uuid::new_v4(), content, &HashMap::new()).await.unwrap();
    assert!(chunks.len() > 1);
    for window in chunks.windows(2) {
      assert!(window[0].start_offset <= window[1].start_offset);
    }
  }

  #[tokio::test]
  async fn falls_back_to_char_split_when_no_separator_applies() {
    let content = "x".repeat(500);
    let chunker = RecursiveChunker {
      max_chunk_size: 10,
      overlap: 2,
      min_chunk_size: 1,
      separators: vec![],
    };
    let chunks = chunker.chunk(Uuid::new_v4(), Uuid::new_v4(), &content, &HashMap::new()).await.unwrap();
    assert!(!chunks.is_empty());
  }

  #[tokio::test]
  async fn empty_content_yields_no_chunks() {
    let chunks = chunker().chunk(Uuid::new_v4(), Uuid::new_v4(), "", &HashMap::new()).await.unwrap();
    assert!(chunks.is_empty());
  }
}
