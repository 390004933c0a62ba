//! Spawns N worker tasks that drain the job queue and run the ingestion
//! pipeline on each job, translating pipeline outcomes into job status
//! transitions.

use std::sync::Arc;

use contextd_core::JobState;
use contextd_store::Store;
use tokio_util::sync::CancellationToken;

use crate::content_store::ContentStore;
use crate::pipeline::IngestionPipeline;
use crate::queue::JobQueue;

pub struct WorkerPool {
  handles: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
  /// Spawns `worker_count` workers, each looping on `queue.dequeue()` until
  /// the queue closes or `shutdown` fires.
  pub fn spawn(worker_count: usize, queue: Arc<JobQueue>, store: Arc<dyn Store>, content_store: Arc<dyn ContentStore>, pipeline: Arc<IngestionPipeline>, shutdown: CancellationToken) -> Self {
    let handles = (0..worker_count)
      .map(|index| {
        let queue = queue.clone();
        let store = store.clone();
        let content_store = content_store.clone();
        let pipeline = pipeline.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { run_worker(index, queue, store, content_store, pipeline, shutdown).await })
      })
      .collect();

    Self { handles }
  }

  pub async fn join(self) {
    for handle in self.handles {
      let _ = handle.await;
    }
  }
}

async fn run_worker(index: usize, queue: Arc<JobQueue>, store: Arc<dyn Store>, content_store: Arc<dyn ContentStore>, pipeline: Arc<IngestionPipeline>, shutdown: CancellationToken) {
  loop {
    let dequeued = tokio::select! {
      biased;
      _ = shutdown.cancelled() => break,
      dequeued = queue.dequeue() => dequeued,
    };
    let Some((job, duplicate_in_flight)) = dequeued else { break };

    if duplicate_in_flight {
      tracing::warn!(worker = index, job_id = %job.job_id, document_id = %job.document_id, "skipping job: document already has another job in flight");
      queue.update(job.job_id, JobState::Failed, None, 0, Some("another job for this document is already in flight".to_string()));
      continue;
    }

    tracing::debug!(worker = index, job_id = %job.job_id, "picked up job");

    let job_token = shutdown.child_token();
    queue.register_cancel(job.job_id, job_token.clone());

    // A document deleted between enqueue and dequeue is skipped, not
    // treated as an error; the Content Store is left untouched.
    match store.get_document(job.document_id).await {
      Ok(None) => {
        queue.update(job.job_id, JobState::Failed, None, 0, Some("document not found".to_string()));
        queue.unregister_cancel(job.job_id);
        continue;
      }
      Err(error) => {
        queue.update(job.job_id, JobState::Failed, None, 0, Some(error.to_string()));
        queue.unregister_cancel(job.job_id);
        continue;
      }
      Ok(Some(_)) => {}
    }

    let bytes = match content_store.open(&job.storage_path).await {
      Ok(bytes) => bytes,
      Err(error) => {
        queue.update(job.job_id, JobState::Failed, None, 0, Some(error.to_string()));
        queue.unregister_cancel(job.job_id);
        continue;
      }
    };

    let result = pipeline.ingest(&bytes, job.options.clone(), &job_token).await;
    queue.unregister_cancel(job.job_id);

    match result {
      Ok(()) => {
        queue.update(job.job_id, JobState::Completed, Some(contextd_core::JobPhase::Complete), 100, None);
      }
      Err(error) => {
        let message = if job_token.is_cancelled() { "cancelled".to_string() } else { error.to_string() };
        queue.update(job.job_id, JobState::Failed, None, 0, Some(message));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use chrono::Utc;
  use contextd_core::{ChunkingConfig, Document, DocumentStatus, EmbeddingConfig, IngestionJob, IngestionOptions, SettingsHandle};
  use contextd_embedding::{Embedder, EmbeddingError, EmbeddingMode};
  use contextd_parser::ParserRegistry;
  use contextd_store::{SqliteStore, Store};
  use sqlx::SqlitePool;
  use uuid::Uuid;

  use super::*;
  use crate::content_store::LocalFsContentStore;

  struct StubEmbedder;

  #[async_trait::async_trait]
  impl Embedder for StubEmbedder {
    fn model_id(&self) -> &str {
      "stub"
    }

    fn dimensions(&self) -> usize {
      2
    }

    async fn embed(&self, _text: &str, _mode: EmbeddingMode) -> Result<Vec<f32>, EmbeddingError> {
      Ok(vec![0.1, 0.2])
    }

    async fn embed_batch(&self, texts: &[&str], mode: EmbeddingMode) -> Result<Vec<Vec<f32>>, EmbeddingError> {
      let mut out = Vec::new();
      for t in texts {
        out.push(self.embed(t, mode).await?);
      }
      Ok(out)
    }
  }

  #[tokio::test]
  async fn worker_completes_a_job_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let content_store: Arc<dyn ContentStore> = Arc::new(LocalFsContentStore::new(dir.path()));
    content_store.save("/doc.txt", b"hello from the worker pool test").await.unwrap();

    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let store = SqliteStore::new(pool);
    store.migrate().await.unwrap();
    let store: Arc<dyn Store> = Arc::new(store);

    let pipeline = Arc::new(IngestionPipeline::new(
      store.clone(),
      Arc::new(StubEmbedder),
      Arc::new(ParserRegistry::new()),
      Arc::new(SettingsHandle::new(ChunkingConfig::default())),
      Arc::new(SettingsHandle::new(EmbeddingConfig::default())),
    ));
    let queue = Arc::new(JobQueue::new());
    let shutdown = CancellationToken::new();

    let container_id = Uuid::new_v4();
    let document_id = Uuid::new_v4();

    // The asynchronous path pre-creates the Document row before enqueueing,
    // the way an (out-of-scope) HTTP handler would; the worker expects to
    // find it still there when the job is dequeued.
    store
      .upsert_document(&Document {
        id: document_id,
        container_id,
        file_name: "doc.txt".to_string(),
        content_type: "text/plain".to_string(),
        path: "/".to_string(),
        content_hash: String::new(),
        size_bytes: 0,
        chunk_count: 0,
        status: DocumentStatus::Pending,
        error_message: None,
        created_at: Utc::now(),
        last_indexed_at: None,
        metadata: HashMap::new(),
      })
      .await
      .unwrap();

    let job = IngestionJob {
      job_id: Uuid::new_v4(),
      document_id,
      storage_path: "/doc.txt".to_string(),
      options: IngestionOptions {
        document_id: Some(document_id),
        file_name: Some("doc.txt".to_string()),
        content_type: Some("text/plain".to_string()),
        container_id,
        path: Some("/".to_string()),
        strategy: None,
        metadata: Some(HashMap::new()),
      },
      batch_id: None,
    };
    let job_id = job.job_id;
    queue.enqueue(job).await.unwrap();

    let pool = WorkerPool::spawn(1, queue.clone(), store.clone(), content_store, pipeline, shutdown.clone());

    for _ in 0..50 {
      if matches!(queue.get_status(job_id).map(|s| s.state), Some(JobState::Completed) | Some(JobState::Failed)) {
        break;
      }
      tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    let status = queue.get_status(job_id).unwrap();
    assert_eq!(status.state, JobState::Completed);

    shutdown.cancel();
    pool.join().await;
  }

  #[tokio::test]
  async fn a_job_whose_document_was_deleted_before_dequeue_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let content_store: Arc<dyn ContentStore> = Arc::new(LocalFsContentStore::new(dir.path()));

    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let store = SqliteStore::new(pool);
    store.migrate().await.unwrap();
    let store: Arc<dyn Store> = Arc::new(store);

    let pipeline = Arc::new(IngestionPipeline::new(
      store.clone(),
      Arc::new(StubEmbedder),
      Arc::new(ParserRegistry::new()),
      Arc::new(SettingsHandle::new(ChunkingConfig::default())),
      Arc::new(SettingsHandle::new(EmbeddingConfig::default())),
    ));
    let queue = Arc::new(JobQueue::new());
    let shutdown = CancellationToken::new();

    // No Document row is ever created: this simulates a delete that raced
    // the enqueue, or simply a job referencing a document the caller never
    // registered.
    let document_id = Uuid::new_v4();
    let job = IngestionJob {
      job_id: Uuid::new_v4(),
      document_id,
      storage_path: "/doc.txt".to_string(),
      options: IngestionOptions {
        document_id: Some(document_id),
        file_name: Some("doc.txt".to_string()),
        content_type: Some("text/plain".to_string()),
        container_id: Uuid::new_v4(),
        path: Some("/".to_string()),
        strategy: None,
        metadata: Some(HashMap::new()),
      },
      batch_id: None,
    };
    let job_id = job.job_id;
    queue.enqueue(job).await.unwrap();

    let pool = WorkerPool::spawn(1, queue.clone(), store, content_store, pipeline, shutdown.clone());

    for _ in 0..50 {
      if matches!(queue.get_status(job_id).map(|s| s.state), Some(JobState::Completed) | Some(JobState::Failed)) {
        break;
      }
      tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    let status = queue.get_status(job_id).unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.error_message.as_deref(), Some("document not found"));

    shutdown.cancel();
    pool.join().await;
  }
}
