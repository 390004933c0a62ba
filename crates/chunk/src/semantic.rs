//! Splits text into sentences, embeds each one, and cuts a chunk boundary
//! wherever cosine similarity between adjacent sentences drops below
//! `semanticThreshold`. Any resulting chunk that still exceeds
//! `maxChunkSize` is split further by the fixed-size character fallback.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use contextd_core::{cosine_similarity, estimate_tokens, Chunk, ChunkingConfig};
use contextd_embedding::{Embedder, EmbeddingMode};
use uuid::Uuid;

use crate::fixed_size::FixedSizeChunker;
use crate::{stamp_chunks, ChunkError, Chunker, Span};

pub struct SemanticChunker {
  pub max_chunk_size: usize,
  pub min_chunk_size: usize,
  pub semantic_threshold: f32,
  embedder: Arc<dyn Embedder>,
  overflow_splitter: FixedSizeChunker,
}

impl SemanticChunker {
  pub fn from_config(config: &ChunkingConfig, embedder: Arc<dyn Embedder>) -> Self {
    Self {
      max_chunk_size: config.max_chunk_size,
      min_chunk_size: config.min_chunk_size,
      semantic_threshold: config.semantic_threshold,
      embedder,
      overflow_splitter: FixedSizeChunker {
        max_chunk_size: config.max_chunk_size,
        overlap: 0,
        min_chunk_size: config.min_chunk_size,
      },
    }
  }

  async fn split_spans(&self, content: &str) -> Result<Vec<Span>, ChunkError> {
    let sentences = split_sentences(content);
    if sentences.is_empty() {
      return Ok(Vec::new());
    }
    if sentences.len() == 1 {
      return Ok(self.finalize_groups(vec![sentences]));
    }

    let texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
    let embeddings = self.embedder.embed_batch(&texts, EmbeddingMode::Document).await?;

    let mut groups: Vec<Vec<Sentence>> = Vec::new();
    let mut current = vec![sentences[0].clone()];

    for i in 1..sentences.len() {
      let similarity = cosine_similarity(&embeddings[i - 1], &embeddings[i]);
      if similarity < self.semantic_threshold {
        groups.push(std::mem::take(&mut current));
      }
      current.push(sentences[i].clone());
    }
    groups.push(current);

    Ok(self.finalize_groups(groups))
  }

  /// Joins each sentence group into a chunk, splitting further with the
  /// character-count fallback when a group alone exceeds `maxChunkSize`.
  fn finalize_groups(&self, groups: Vec<Vec<Sentence>>) -> Vec<Span> {
    let mut spans = Vec::new();
    for group in groups {
      let Some(first) = group.first() else { continue };
      let Some(last) = group.last() else { continue };
      let start = first.start;
      let end = last.end;
      let text: String = group.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ");
      let token_count = estimate_tokens(&text);

      if token_count <= self.max_chunk_size {
        if token_count >= self.min_chunk_size {
          spans.push(Span { content: text, start_offset: start, end_offset: end });
        }
        continue;
      }

      for overflow in self.overflow_splitter.split_spans(&text) {
        spans.push(Span {
          content: overflow.content,
          start_offset: start + overflow.start_offset,
          end_offset: start + overflow.end_offset,
        });
      }
    }
    spans
  }
}

#[derive(Debug, Clone)]
struct Sentence {
  text: String,
  start: usize,
  end: usize,
}

/// Splits on `.`, `!` or `?` followed by whitespace or end of input.
fn split_sentences(content: &str) -> Vec<Sentence> {
  let chars: Vec<char> = content.chars().collect();
  let mut sentences = Vec::new();
  let mut start = 0usize;

  let mut i = 0usize;
  while i < chars.len() {
    let c = chars[i];
    if (c == '.' || c == '!' || c == '?') && (i + 1 == chars.len() || chars[i + 1].is_whitespace()) {
      let end = i + 1;
      let raw: String = chars[start..end].iter().collect();
      let trimmed = raw.trim();
      if !trimmed.is_empty() {
        sentences.push(Sentence { text: trimmed.to_string(), start, end });
      }
      start = end;
    }
    i += 1;
  }

  if start < chars.len() {
    let raw: String = chars[start..].iter().collect();
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      sentences.push(Sentence { text: trimmed.to_string(), start, end: chars.len() });
    }
  }

  sentences
}

#[async_trait]
impl Chunker for SemanticChunker {
  async fn chunk(&self, document_id: Uuid, container_id: Uuid, content: &str, base_metadata: &HashMap<String, String>) -> Result<Vec<Chunk>, ChunkError> {
    let spans = self.split_spans(content).await?;
    Ok(stamp_chunks(spans, document_id, container_id, "Semantic", base_metadata))
  }
}
