//! Text chunking strategies: FixedSize, Recursive and Semantic, all
//! producing the same ordered [`Chunk`] sequence the ingestion pipeline
//! hands to the embedder and store.

mod boundary;
mod fixed_size;
mod recursive;
mod semantic;

pub use fixed_size::FixedSizeChunker;
pub use recursive::RecursiveChunker;
pub use semantic::SemanticChunker;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use contextd_core::{Chunk, ChunkingConfig, ChunkingStrategy};
use contextd_embedding::Embedder;
use uuid::Uuid;

/// A contiguous span produced by a chunking strategy before it is stamped
/// into a full [`Chunk`] with identity and metadata.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Span {
  pub content: String,
  pub start_offset: usize,
  pub end_offset: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
  #[error("chunker made no forward progress")]
  NoProgress,
  #[error("embedding failed during semantic chunking: {0}")]
  Embedding(#[from] contextd_embedding::EmbeddingError),
  #[error("semantic chunking strategy requires an embedder")]
  MissingEmbedder,
}

#[async_trait]
pub trait Chunker: Send + Sync {
  async fn chunk(&self, document_id: Uuid, container_id: Uuid, content: &str, base_metadata: &HashMap<String, String>) -> Result<Vec<Chunk>, ChunkError>;
}

/// Stamps a raw [`Span`] sequence into identity-bearing, metadata-bearing
/// [`Chunk`] rows. Shared by every strategy so `chunkIndex`/metadata
/// conventions stay identical across them.
pub(crate) fn stamp_chunks(spans: Vec<Span>, document_id: Uuid, container_id: Uuid, strategy_name: &str, base_metadata: &HashMap<String, String>) -> Vec<Chunk> {
  spans
    .into_iter()
    .enumerate()
    .map(|(index, span)| {
      let mut metadata = base_metadata.clone();
      metadata.insert("ChunkingStrategy".to_string(), strategy_name.to_string());
      metadata.insert("ChunkIndex".to_string(), index.to_string());

      Chunk {
        id: Uuid::new_v4(),
        document_id,
        container_id,
        token_count: contextd_core::estimate_tokens(&span.content) as u32,
        content: span.content,
        chunk_index: index as u32,
        start_offset: span.start_offset as u32,
        end_offset: span.end_offset as u32,
        metadata,
      }
    })
    .collect()
}

/// Builds the chunker named by `config.strategy`. `DocumentAware` is an
/// alias for `Recursive`; `Semantic` requires an embedder.
pub fn build_chunker(config: &ChunkingConfig, embedder: Option<Arc<dyn Embedder>>) -> Result<Box<dyn Chunker>, ChunkError> {
  match config.strategy {
    ChunkingStrategy::FixedSize => Ok(Box::new(FixedSizeChunker::from_config(config))),
    ChunkingStrategy::Recursive | ChunkingStrategy::DocumentAware => Ok(Box::new(RecursiveChunker::from_config(config))),
    ChunkingStrategy::Semantic => {
      let embedder = embedder.ok_or(ChunkError::MissingEmbedder)?;
      Ok(Box::new(SemanticChunker::from_config(config, embedder)))
    }
  }
}
