//! Parse → chunk → embed → persist, for one document. Honors cooperative
//! cancellation at every step boundary and never holds one connection
//! open for the whole run.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use contextd_chunk::build_chunker;
use contextd_core::{
  content_hash, fingerprint_keys, ChunkVector, ChunkingConfig, Document, DocumentStatus, EmbeddingConfig, IngestionOptions, SettingsHandle,
};
use contextd_embedding::{Embedder, EmbeddingMode};
use contextd_parser::ParserRegistry;
use contextd_store::Store;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
  #[error("store error: {0}")]
  Store(#[from] contextd_store::StoreError),
  #[error("chunking error: {0}")]
  Chunk(#[from] contextd_chunk::ChunkError),
  #[error("embedding error: {0}")]
  Embedding(#[from] contextd_embedding::EmbeddingError),
  #[error("ingestion was cancelled")]
  Cancelled,
}

pub struct IngestionPipeline {
  store: Arc<dyn Store>,
  embedder: Arc<dyn Embedder>,
  parsers: Arc<ParserRegistry>,
  chunking: Arc<SettingsHandle<ChunkingConfig>>,
  embedding: Arc<SettingsHandle<EmbeddingConfig>>,
}

impl IngestionPipeline {
  pub fn new(
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    parsers: Arc<ParserRegistry>,
    chunking: Arc<SettingsHandle<ChunkingConfig>>,
    embedding: Arc<SettingsHandle<EmbeddingConfig>>,
  ) -> Self {
    Self { store, embedder, parsers, chunking, embedding }
  }

  /// Snapshots chunking and embedding settings once, up front, so a config
  /// change that lands mid-run can't tear this ingestion across two
  /// configurations.
  pub async fn ingest(&self, bytes: &[u8], options: IngestionOptions, cancel: &CancellationToken) -> Result<(), PipelineError> {
    let chunking = self.chunking.snapshot();
    let embedding = self.embedding.snapshot();
    let content_hash = content_hash(bytes);
    let document_id = options.document_id.unwrap_or_else(Uuid::new_v4);
    let file_name = options.file_name.clone().unwrap_or_else(|| document_id.to_string());
    let content_type = options.content_type.clone().unwrap_or_else(|| "application/octet-stream".to_string());
    let path = options.path.clone().unwrap_or_else(|| "/".to_string());

    let metadata = self.build_fingerprint_metadata(&chunking, &embedding, options.metadata.clone().unwrap_or_default());

    let mut document = Document {
      id: document_id,
      container_id: options.container_id,
      file_name: file_name.clone(),
      content_type,
      path,
      content_hash,
      size_bytes: bytes.len() as u64,
      chunk_count: 0,
      status: DocumentStatus::Processing,
      error_message: None,
      created_at: Utc::now(),
      last_indexed_at: None,
      metadata,
    };
    self.store.upsert_document(&document).await?;

    if cancel.is_cancelled() {
      return Err(PipelineError::Cancelled);
    }

    let parsed = self.parsers.parse(bytes, &file_name);
    if !parsed.warnings.is_empty() {
      tracing::warn!(document_id = %document_id, warnings = ?parsed.warnings, "parser reported warnings");
    }

    if cancel.is_cancelled() {
      return Err(PipelineError::Cancelled);
    }

    let strategy_config = if let Some(strategy) = options.strategy {
      ChunkingConfig { strategy, ..(*chunking).clone() }
    } else {
      (*chunking).clone()
    };
    let needs_embedder = matches!(strategy_config.strategy, contextd_core::ChunkingStrategy::Semantic);
    let chunker = match build_chunker(&strategy_config, needs_embedder.then(|| self.embedder.clone())) {
      Ok(chunker) => chunker,
      Err(error) => return Err(self.fail(&mut document, error.into()).await),
    };
    let chunks = match chunker.chunk(document_id, options.container_id, &parsed.content, &document.metadata).await {
      Ok(chunks) => chunks,
      Err(error) => return Err(self.fail(&mut document, error.into()).await),
    };

    if chunks.is_empty() {
      document.status = DocumentStatus::Failed;
      document.error_message = Some("No extractable content".to_string());
      self.store.upsert_document(&document).await?;
      return Ok(());
    }

    if cancel.is_cancelled() {
      return Err(PipelineError::Cancelled);
    }

    let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    let embeddings = match self.embedder.embed_batch(&contents, EmbeddingMode::Document).await {
      Ok(embeddings) => embeddings,
      Err(error) => return Err(self.fail(&mut document, error.into()).await),
    };

    if cancel.is_cancelled() {
      return Err(PipelineError::Cancelled);
    }

    let vectors: Vec<ChunkVector> = chunks
      .iter()
      .zip(embeddings)
      .map(|(chunk, vector)| ChunkVector {
        chunk_id: chunk.id,
        document_id,
        container_id: options.container_id,
        embedding: vector,
        model_id: self.embedder.model_id().to_string(),
      })
      .collect();

    if let Err(error) = self.store.replace_chunks(document_id, &chunks, &vectors).await {
      return Err(self.fail(&mut document, error.into()).await);
    }

    document.chunk_count = chunks.len() as u32;
    document.status = DocumentStatus::Ready;
    document.last_indexed_at = Some(Utc::now());
    self.store.upsert_document(&document).await?;

    Ok(())
  }

  /// Marks `document` Failed with `error`'s message and persists it, so a
  /// downstream failure never leaves the row stuck in `Processing`. Returns
  /// `error` unchanged for the caller to propagate.
  async fn fail(&self, document: &mut Document, error: PipelineError) -> PipelineError {
    document.status = DocumentStatus::Failed;
    document.error_message = Some(error.to_string());
    if let Err(store_error) = self.store.upsert_document(document).await {
      tracing::warn!(document_id = %document.id, %store_error, "failed to persist Failed status after pipeline error");
    }
    error
  }

  fn build_fingerprint_metadata(&self, chunking: &ChunkingConfig, embedding: &EmbeddingConfig, mut metadata: HashMap<String, String>) -> HashMap<String, String> {
    metadata.insert(fingerprint_keys::CHUNKING_STRATEGY.to_string(), format!("{:?}", chunking.strategy));
    metadata.insert(fingerprint_keys::CHUNKING_MAX_SIZE.to_string(), chunking.max_chunk_size.to_string());
    metadata.insert(fingerprint_keys::CHUNKING_OVERLAP.to_string(), chunking.overlap.to_string());
    metadata.insert(fingerprint_keys::EMBEDDING_PROVIDER.to_string(), format!("{:?}", embedding.provider));
    metadata.insert(fingerprint_keys::EMBEDDING_MODEL.to_string(), embedding.model.clone());
    metadata.insert(fingerprint_keys::EMBEDDING_DIMENSIONS.to_string(), embedding.dimensions.to_string());
    metadata
  }
}
