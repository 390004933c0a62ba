//! Decides, per document, whether stale indexing artifacts warrant a new
//! ingestion job, via content-hash and indexing-parameter fingerprints.

use std::collections::HashMap;
use std::sync::Arc;

use contextd_core::{content_hash, fingerprint_keys, ChunkingConfig, Document, DocumentStatus, EmbeddingConfig, IngestionJob, IngestionOptions, SettingsHandle};
use contextd_store::Store;
use uuid::Uuid;

use crate::content_store::ContentStore;
use crate::queue::JobQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReindexReason {
  Forced,
  FileNotFound,
  Error,
  ContentChanged,
  ChunkingSettingsChanged,
  EmbeddingSettingsChanged,
  NeverIndexed,
  Unchanged,
}

impl ReindexReason {
  /// The name surfaced in `ReindexSummary::reason_counts`, matching the
  /// spec's own reason vocabulary (`Unchanged`, `ContentChanged`, ...).
  pub fn as_str(&self) -> &'static str {
    match self {
      ReindexReason::Forced => "Forced",
      ReindexReason::FileNotFound => "FileNotFound",
      ReindexReason::Error => "Error",
      ReindexReason::ContentChanged => "ContentChanged",
      ReindexReason::ChunkingSettingsChanged => "ChunkingSettingsChanged",
      ReindexReason::EmbeddingSettingsChanged => "EmbeddingSettingsChanged",
      ReindexReason::NeverIndexed => "NeverIndexed",
      ReindexReason::Unchanged => "Unchanged",
    }
  }
}

#[derive(Debug, Clone)]
pub struct ReindexDecision {
  pub document_id: Uuid,
  pub reason: ReindexReason,
  pub enqueued: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReindexPolicy {
  pub force: bool,
  pub detect_settings_changes: bool,
  pub strategy_override: Option<contextd_core::ChunkingStrategy>,
}

#[derive(Debug, Clone)]
pub struct ReindexSummary {
  pub batch_id: Uuid,
  pub total_documents: usize,
  pub enqueued_count: usize,
  pub skipped_count: usize,
  pub failed_count: usize,
  pub reason_counts: HashMap<&'static str, usize>,
  pub documents: Vec<ReindexDecision>,
}

/// The Content Store path a document's bytes live at: its folder `path`
/// (normalized to end with `/`) joined with its `file_name`.
fn document_storage_path(document: &Document) -> String {
  format!("{}{}", document.path, document.file_name)
}

pub struct ReindexController {
  store: Arc<dyn Store>,
  content_store: Arc<dyn ContentStore>,
  queue: Arc<JobQueue>,
  chunking: Arc<SettingsHandle<ChunkingConfig>>,
  embedding: Arc<SettingsHandle<EmbeddingConfig>>,
}

impl ReindexController {
  pub fn new(
    store: Arc<dyn Store>,
    content_store: Arc<dyn ContentStore>,
    queue: Arc<JobQueue>,
    chunking: Arc<SettingsHandle<ChunkingConfig>>,
    embedding: Arc<SettingsHandle<EmbeddingConfig>>,
  ) -> Self {
    Self { store, content_store, queue, chunking, embedding }
  }

  pub async fn reindex_container(&self, container_id: Uuid, policy: &ReindexPolicy) -> Result<ReindexSummary, contextd_store::StoreError> {
    let documents = self.store.list_documents(container_id).await?;
    self.reindex_documents(documents, policy).await
  }

  /// One snapshot of chunking/embedding settings covers the whole batch: a
  /// settings change mid-batch can't cause half the documents to be judged
  /// against one fingerprint and the rest against another.
  async fn reindex_documents(&self, documents: Vec<Document>, policy: &ReindexPolicy) -> Result<ReindexSummary, contextd_store::StoreError> {
    let chunking = self.chunking.snapshot();
    let embedding = self.embedding.snapshot();
    let batch_id = Uuid::new_v4();
    let mut decisions = Vec::with_capacity(documents.len());
    let mut enqueued_count = 0;
    let mut skipped_count = 0;
    let mut failed_count = 0;
    let mut reason_counts: HashMap<&'static str, usize> = HashMap::new();

    for document in documents {
      let decision = self.decide(&document, policy, &chunking, &embedding).await;
      match decision.reason {
        ReindexReason::Error => failed_count += 1,
        _ if decision.enqueued => enqueued_count += 1,
        _ => skipped_count += 1,
      }
      *reason_counts.entry(decision.reason.as_str()).or_insert(0) += 1;

      if decision.enqueued {
        self.enqueue(&document, policy, batch_id).await?;
      }
      decisions.push(decision);
    }

    Ok(ReindexSummary {
      batch_id,
      total_documents: decisions.len(),
      enqueued_count,
      skipped_count,
      failed_count,
      reason_counts,
      documents: decisions,
    })
  }

  async fn decide(&self, document: &Document, policy: &ReindexPolicy, chunking: &ChunkingConfig, embedding: &EmbeddingConfig) -> ReindexDecision {
    let reason = self.decide_reason(document, policy, chunking, embedding).await;
    let enqueued = matches!(
      reason,
      ReindexReason::Forced | ReindexReason::ContentChanged | ReindexReason::ChunkingSettingsChanged | ReindexReason::EmbeddingSettingsChanged | ReindexReason::NeverIndexed
    );
    ReindexDecision { document_id: document.id, reason, enqueued }
  }

  async fn decide_reason(&self, document: &Document, policy: &ReindexPolicy, chunking: &ChunkingConfig, embedding: &EmbeddingConfig) -> ReindexReason {
    if policy.force {
      return ReindexReason::Forced;
    }

    let storage_path = document_storage_path(document);
    match self.content_store.exists(&storage_path).await {
      Ok(false) => return ReindexReason::FileNotFound,
      Err(_) => return ReindexReason::FileNotFound,
      Ok(true) => {}
    }

    let bytes = match self.content_store.open(&storage_path).await {
      Ok(bytes) => bytes,
      Err(_) => return ReindexReason::Error,
    };
    let current_hash = content_hash(&bytes);

    if current_hash != document.content_hash {
      return ReindexReason::ContentChanged;
    }

    if policy.detect_settings_changes {
      if Self::chunking_fingerprint_changed(chunking, document) {
        return ReindexReason::ChunkingSettingsChanged;
      }
      if Self::embedding_fingerprint_changed(embedding, document) {
        return ReindexReason::EmbeddingSettingsChanged;
      }
    }

    if document.last_indexed_at.is_none() || document.status != DocumentStatus::Ready {
      return ReindexReason::NeverIndexed;
    }

    ReindexReason::Unchanged
  }

  fn chunking_fingerprint_changed(chunking: &ChunkingConfig, document: &Document) -> bool {
    let strategy = format!("{:?}", chunking.strategy);
    document.metadata.get(fingerprint_keys::CHUNKING_STRATEGY) != Some(&strategy)
      || document.metadata.get(fingerprint_keys::CHUNKING_MAX_SIZE) != Some(&chunking.max_chunk_size.to_string())
      || document.metadata.get(fingerprint_keys::CHUNKING_OVERLAP) != Some(&chunking.overlap.to_string())
  }

  fn embedding_fingerprint_changed(embedding: &EmbeddingConfig, document: &Document) -> bool {
    let provider = format!("{:?}", embedding.provider);
    document.metadata.get(fingerprint_keys::EMBEDDING_PROVIDER) != Some(&provider)
      || document.metadata.get(fingerprint_keys::EMBEDDING_MODEL) != Some(&embedding.model)
      || document.metadata.get(fingerprint_keys::EMBEDDING_DIMENSIONS) != Some(&embedding.dimensions.to_string())
  }

  /// Clears existing chunks (cascading their vectors), resets the document
  /// to Pending, then places a job back onto the queue.
  async fn enqueue(&self, document: &Document, policy: &ReindexPolicy, batch_id: Uuid) -> Result<(), contextd_store::StoreError> {
    self.store.replace_chunks(document.id, &[], &[]).await?;

    let mut reset = document.clone();
    reset.status = DocumentStatus::Pending;
    reset.chunk_count = 0;
    self.store.upsert_document(&reset).await?;

    let job = IngestionJob {
      job_id: Uuid::new_v4(),
      document_id: document.id,
      storage_path: document_storage_path(document),
      options: IngestionOptions {
        document_id: Some(document.id),
        file_name: Some(document.file_name.clone()),
        content_type: Some(document.content_type.clone()),
        container_id: document.container_id,
        path: Some(document.path.clone()),
        strategy: policy.strategy_override,
        metadata: Some(document.metadata.clone()),
      },
      batch_id: Some(batch_id),
    };

    if self.queue.enqueue(job).await.is_err() {
      tracing::warn!(document_id = %document.id, "failed to enqueue reindex job: queue closed");
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use chrono::Utc;
  use contextd_store::SqliteStore;
  use sqlx::SqlitePool;

  use super::*;
  use crate::content_store::LocalFsContentStore;

  async fn memory_store() -> Arc<dyn Store> {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let store = SqliteStore::new(pool);
    store.migrate().await.unwrap();
    Arc::new(store)
  }

  /// `storage_path` is the full Content Store path (e.g. `/doc.txt`); the
  /// resulting document's folder `path` is always root, with `file_name`
  /// carrying the rest, so `document_storage_path` reconstructs it exactly.
  fn sample_document(container_id: Uuid, storage_path: &str, hash: String) -> Document {
    Document {
      id: Uuid::new_v4(),
      container_id,
      file_name: storage_path.trim_start_matches('/').to_string(),
      content_type: "text/plain".to_string(),
      path: "/".to_string(),
      content_hash: hash,
      size_bytes: 5,
      chunk_count: 1,
      status: DocumentStatus::Ready,
      error_message: None,
      created_at: Utc::now(),
      last_indexed_at: Some(Utc::now()),
      metadata: HashMap::new(),
    }
  }

  #[tokio::test]
  async fn missing_file_is_skipped_with_file_not_found() {
    let store = memory_store().await;
    let dir = tempfile::tempdir().unwrap();
    let content_store: Arc<dyn ContentStore> = Arc::new(LocalFsContentStore::new(dir.path()));
    let queue = Arc::new(JobQueue::new());
    let controller = ReindexController::new(store.clone(), content_store, queue, Arc::new(SettingsHandle::new(ChunkingConfig::default())), Arc::new(SettingsHandle::new(EmbeddingConfig::default())));

    let container_id = Uuid::new_v4();
    let document = sample_document(container_id, "/missing.txt", content_hash(b"x"));
    store.upsert_document(&document).await.unwrap();

    let summary = controller.reindex_container(container_id, &ReindexPolicy::default()).await.unwrap();
    assert_eq!(summary.documents[0].reason, ReindexReason::FileNotFound);
    assert!(!summary.documents[0].enqueued);
  }

  #[tokio::test]
  async fn changed_content_triggers_enqueue() {
    let store = memory_store().await;
    let dir = tempfile::tempdir().unwrap();
    let content_store: Arc<dyn ContentStore> = Arc::new(LocalFsContentStore::new(dir.path()));
    content_store.save("/doc.txt", b"new bytes").await.unwrap();
    let queue = Arc::new(JobQueue::new());
    let controller = ReindexController::new(store.clone(), content_store, queue.clone(), Arc::new(SettingsHandle::new(ChunkingConfig::default())), Arc::new(SettingsHandle::new(EmbeddingConfig::default())));

    let container_id = Uuid::new_v4();
    let document = sample_document(container_id, "/doc.txt", content_hash(b"old bytes"));
    store.upsert_document(&document).await.unwrap();

    let summary = controller.reindex_container(container_id, &ReindexPolicy::default()).await.unwrap();
    assert_eq!(summary.documents[0].reason, ReindexReason::ContentChanged);
    assert!(summary.documents[0].enqueued);
    assert_eq!(summary.enqueued_count, 1);

    let refreshed = store.get_document(document.id).await.unwrap().unwrap();
    assert_eq!(refreshed.status, DocumentStatus::Pending);
  }

  #[tokio::test]
  async fn forced_reindex_enqueues_regardless_of_hash() {
    let store = memory_store().await;
    let dir = tempfile::tempdir().unwrap();
    let content_store: Arc<dyn ContentStore> = Arc::new(LocalFsContentStore::new(dir.path()));
    content_store.save("/doc.txt", b"same bytes").await.unwrap();
    let queue = Arc::new(JobQueue::new());
    let controller = ReindexController::new(store.clone(), content_store, queue, Arc::new(SettingsHandle::new(ChunkingConfig::default())), Arc::new(SettingsHandle::new(EmbeddingConfig::default())));

    let container_id = Uuid::new_v4();
    let document = sample_document(container_id, "/doc.txt", content_hash(b"same bytes"));
    store.upsert_document(&document).await.unwrap();

    let policy = ReindexPolicy { force: true, ..Default::default() };
    let summary = controller.reindex_container(container_id, &policy).await.unwrap();
    assert_eq!(summary.documents[0].reason, ReindexReason::Forced);
    assert!(summary.documents[0].enqueued);
  }

  #[tokio::test]
  async fn unchanged_document_is_skipped() {
    let store = memory_store().await;
    let dir = tempfile::tempdir().unwrap();
    let content_store: Arc<dyn ContentStore> = Arc::new(LocalFsContentStore::new(dir.path()));
    content_store.save("/doc.txt", b"same bytes").await.unwrap();
    let queue = Arc::new(JobQueue::new());
    let controller = ReindexController::new(store.clone(), content_store, queue, Arc::new(SettingsHandle::new(ChunkingConfig::default())), Arc::new(SettingsHandle::new(EmbeddingConfig::default())));

    let container_id = Uuid::new_v4();
    let document = sample_document(container_id, "/doc.txt", content_hash(b"same bytes"));
    store.upsert_document(&document).await.unwrap();

    let summary = controller.reindex_container(container_id, &ReindexPolicy::default()).await.unwrap();
    assert_eq!(summary.documents[0].reason, ReindexReason::Unchanged);
    assert!(!summary.documents[0].enqueued);
    assert_eq!(summary.enqueued_count, 0);
    assert_eq!(summary.skipped_count, 1);
    assert_eq!(summary.reason_counts.get("Unchanged"), Some(&1));
  }
}
