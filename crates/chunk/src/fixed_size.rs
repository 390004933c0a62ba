//! Scans left to right, targeting `maxChunkSize` tokens per chunk and
//! snapping each boundary to the nearest natural break.

use std::collections::HashMap;

use async_trait::async_trait;
use contextd_core::{estimate_tokens, Chunk, ChunkingConfig, CHARS_PER_TOKEN};
use uuid::Uuid;

use crate::boundary::{boundary_window, snap_to_boundary};
use crate::{stamp_chunks, ChunkError, Chunker, Span};

pub struct FixedSizeChunker {
  pub max_chunk_size: usize,
  pub overlap: usize,
  pub min_chunk_size: usize,
}

impl FixedSizeChunker {
  pub fn from_config(config: &ChunkingConfig) -> Self {
    Self {
      max_chunk_size: config.max_chunk_size,
      overlap: config.overlap,
      min_chunk_size: config.min_chunk_size,
    }
  }

  /// Splits `content` into character spans. Shared with the semantic
  /// chunker's character-count fallback for oversized chunks.
  pub(crate) fn split_spans(&self, content: &str) -> Vec<Span> {
    let chars: Vec<char> = content.chars().collect();
    let len = chars.len();
    if len == 0 {
      return Vec::new();
    }

    let target_chars = (self.max_chunk_size * CHARS_PER_TOKEN).max(1);
    let overlap_tokens = if self.overlap >= self.max_chunk_size { self.max_chunk_size / 4 } else { self.overlap };
    let overlap_chars = overlap_tokens * CHARS_PER_TOKEN;

    let mut spans = Vec::new();
    let mut cursor = 0usize;

    while cursor < len {
      let tentative_end = (cursor + target_chars).min(len);
      let actual_end = if tentative_end < len {
        let window = boundary_window(tentative_end - cursor);
        let floor = cursor.max(tentative_end.saturating_sub(window));
        let snapped = snap_to_boundary(&chars, tentative_end, tentative_end - floor);
        if snapped > cursor { snapped } else { tentative_end }
      } else {
        tentative_end
      };

      let raw: String = chars[cursor..actual_end].iter().collect();
      let trimmed = raw.trim();
      let token_count = estimate_tokens(trimmed);
      let is_final = actual_end >= len;

      if !trimmed.is_empty() && (token_count >= self.min_chunk_size || is_final) {
        spans.push(Span {
          content: trimmed.to_string(),
          start_offset: cursor,
          end_offset: actual_end,
        });
      }

      let next_cursor = if actual_end > overlap_chars && actual_end - overlap_chars > cursor {
        actual_end - overlap_chars
      } else {
        actual_end
      };
      cursor = next_cursor;
    }

    spans
  }
}

#[async_trait]
impl Chunker for FixedSizeChunker {
  async fn chunk(&self, document_id: Uuid, container_id: Uuid, content: &str, base_metadata: &HashMap<String, String>) -> Result<Vec<Chunk>, ChunkError> {
    let spans = self.split_spans(content);
    Ok(stamp_chunks(spans, document_id, container_id, "FixedSize", base_metadata))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn produces_multiple_overlapping_chunks() {
    let paragraph = "x".repeat(200);
    let content = [paragraph.as_str(); 3].join("\n\n");
    let chunker = FixedSizeChunker {
      max_chunk_size: 50,
      overlap: 10,
      min_chunk_size: 5,
    };

    let chunks = chunker.chunk(Uuid::new_v4(), Uuid::new_v4(), &content, &HashMap::new()).await.unwrap();
    assert!(chunks.len() > 1);
    for chunk in &chunks {
      assert!(chunk.token_count <= 50);
    }
    for window in chunks.windows(2) {
      assert!(window[1].start_offset < window[0].end_offset);
      assert_ne!(window[0].content, window[1].content);
    }
  }

  #[tokio::test]
  async fn chunk_indices_are_dense_and_ordered() {
    let content = "one two three four five six seven eight nine ten".repeat(20);
    let chunker = FixedSizeChunker {
      max_chunk_size: 20,
      overlap: 2,
      min_chunk_size: 1,
    };
    let chunks = chunker.chunk(Uuid::new_v4(), Uuid::new_v4(), &content, &HashMap::new()).await.unwrap();
    for (i, chunk) in chunks.iter().enumerate() {
      assert_eq!(chunk.chunk_index, i as u32);
    }
    for window in chunks.windows(2) {
      assert!(window[0].start_offset <= window[1].start_offset);
    }
  }

  #[tokio::test]
  async fn empty_content_yields_no_chunks() {
    let chunker = FixedSizeChunker {
      max_chunk_size: 50,
      overlap: 10,
      min_chunk_size: 5,
    };
    let chunks = chunker.chunk(Uuid::new_v4(), Uuid::new_v4(), "", &HashMap::new()).await.unwrap();
    assert!(chunks.is_empty());
  }
}
