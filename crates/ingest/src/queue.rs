//! A bounded FIFO of [`IngestionJob`] plus the status and cancellation
//! registries a worker pool and progress broadcaster read from.

use std::time::Duration;

use chrono::Utc;
use contextd_core::{IngestionJob, IngestionJobStatus, JobPhase, JobState};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
  #[error("job queue is closed")]
  Closed,
}

/// Bounded job queue backed by an mpsc channel, with Wait backpressure:
/// `enqueue` blocks on a full queue rather than dropping or failing.
pub struct JobQueue {
  sender: mpsc::Sender<IngestionJob>,
  receiver: Mutex<mpsc::Receiver<IngestionJob>>,
  statuses: DashMap<Uuid, IngestionJobStatus>,
  cancels: DashMap<Uuid, CancellationToken>,
  /// Tracks jobs still sitting in the channel (not yet dequeued), so
  /// `cancel_by_document_id` can skip them before a worker ever sees them.
  pending_by_document: DashMap<Uuid, Uuid>,
  /// Tracks the in-flight job (if any) per document, so cancellation can
  /// be routed to the right `cancels` entry.
  processing_by_document: DashMap<Uuid, Uuid>,
}

impl JobQueue {
  pub fn new() -> Self {
    Self::with_capacity(DEFAULT_CAPACITY)
  }

  pub fn with_capacity(capacity: usize) -> Self {
    let (sender, receiver) = mpsc::channel(capacity);
    Self {
      sender,
      receiver: Mutex::new(receiver),
      statuses: DashMap::new(),
      cancels: DashMap::new(),
      pending_by_document: DashMap::new(),
      processing_by_document: DashMap::new(),
    }
  }

  pub async fn enqueue(&self, job: IngestionJob) -> Result<(), QueueError> {
    self.statuses.insert(job.job_id, IngestionJobStatus::queued(job.job_id));
    self.pending_by_document.insert(job.document_id, job.job_id);
    self.sender.send(job).await.map_err(|_| QueueError::Closed)
  }

  /// Blocks until a job is available, transitioning it to Processing.
  ///
  /// The second element is `true` when another job for the same
  /// `document_id` is already Processing — the caller MUST skip running the
  /// pipeline for such a job rather than let two workers touch one
  /// document's chunks concurrently; the prior in-flight job keeps owning
  /// `processing_by_document` until it unregisters.
  pub async fn dequeue(&self) -> Option<(IngestionJob, bool)> {
    let job = self.receiver.lock().await.recv().await?;
    self.pending_by_document.remove(&job.document_id);
    let already_processing = self.processing_by_document.contains_key(&job.document_id);
    if !already_processing {
      self.processing_by_document.insert(job.document_id, job.job_id);
    }
    self.update(job.job_id, JobState::Processing, Some(JobPhase::Parsing), 0, None);
    Some((job, already_processing))
  }

  pub fn get_status(&self, job_id: Uuid) -> Option<IngestionJobStatus> {
    self.statuses.get(&job_id).map(|entry| entry.clone())
  }

  /// Snapshot of every tracked job id, for the progress broadcaster's poll.
  pub fn job_ids(&self) -> Vec<Uuid> {
    self.statuses.iter().map(|entry| *entry.key()).collect()
  }

  pub fn update(&self, job_id: Uuid, state: JobState, phase: Option<JobPhase>, percent_complete: u8, error_message: Option<String>) {
    self.statuses.entry(job_id).and_modify(|status| {
      status.state = state;
      status.current_phase = phase;
      status.percent_complete = percent_complete;
      status.error_message = error_message.clone();
      if status.started_at.is_none() && state == JobState::Processing {
        status.started_at = Some(Utc::now());
      }
      if matches!(state, JobState::Completed | JobState::Failed) {
        status.completed_at = Some(Utc::now());
      }
    });
  }

  pub fn register_cancel(&self, job_id: Uuid, token: CancellationToken) {
    self.cancels.insert(job_id, token);
  }

  pub fn unregister_cancel(&self, job_id: Uuid) {
    self.cancels.remove(&job_id);
    self.processing_by_document.retain(|_, v| *v != job_id);
  }

  /// Cancels an in-flight job for `document_id`, and removes any
  /// not-yet-dequeued job for the same document from consideration.
  pub fn cancel_by_document_id(&self, document_id: Uuid) {
    if let Some((_, job_id)) = self.pending_by_document.remove(&document_id) {
      self.update(job_id, JobState::Failed, None, 0, Some("cancelled".to_string()));
    }
    if let Some(job_id) = self.processing_by_document.get(&document_id).map(|entry| *entry) {
      if let Some(token) = self.cancels.get(&job_id) {
        token.cancel();
      }
    }
  }

  /// Removes status entries whose `completed_at` is older than `max_age`.
  pub fn cleanup(&self, max_age: Duration) {
    let cutoff = Utc::now() - chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::zero());
    self.statuses.retain(|_, status| status.completed_at.map(|at| at >= cutoff).unwrap_or(true));
  }
}

impl Default for JobQueue {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use contextd_core::IngestionOptions;

  fn sample_job(document_id: Uuid) -> IngestionJob {
    IngestionJob {
      job_id: Uuid::new_v4(),
      document_id,
      storage_path: "/doc.txt".to_string(),
      options: IngestionOptions {
        document_id: Some(document_id),
        file_name: Some("doc.txt".to_string()),
        content_type: Some("text/plain".to_string()),
        container_id: Uuid::new_v4(),
        path: None,
        strategy: None,
        metadata: None,
      },
      batch_id: None,
    }
  }

  #[tokio::test]
  async fn enqueue_then_dequeue_transitions_to_processing() {
    let queue = JobQueue::new();
    let job = sample_job(Uuid::new_v4());
    let job_id = job.job_id;
    queue.enqueue(job).await.unwrap();

    assert_eq!(queue.get_status(job_id).unwrap().state, JobState::Queued);
    let (dequeued, duplicate) = queue.dequeue().await.unwrap();
    assert_eq!(dequeued.job_id, job_id);
    assert!(!duplicate);
    assert_eq!(queue.get_status(job_id).unwrap().state, JobState::Processing);
  }

  #[tokio::test]
  async fn a_second_job_for_the_same_document_dequeues_as_a_duplicate() {
    let queue = JobQueue::new();
    let document_id = Uuid::new_v4();
    let first = sample_job(document_id);
    let second = sample_job(document_id);
    let second_id = second.job_id;
    queue.enqueue(first).await.unwrap();
    queue.enqueue(second).await.unwrap();

    let (_, first_duplicate) = queue.dequeue().await.unwrap();
    assert!(!first_duplicate);
    let (dequeued, second_duplicate) = queue.dequeue().await.unwrap();
    assert_eq!(dequeued.job_id, second_id);
    assert!(second_duplicate);
  }

  #[tokio::test]
  async fn update_sets_completed_at_on_terminal_state() {
    let queue = JobQueue::new();
    let job = sample_job(Uuid::new_v4());
    let job_id = job.job_id;
    queue.enqueue(job).await.unwrap();
    queue.dequeue().await.unwrap();

    queue.update(job_id, JobState::Completed, Some(JobPhase::Complete), 100, None);
    let status = queue.get_status(job_id).unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert!(status.completed_at.is_some());
  }

  #[tokio::test]
  async fn cancel_by_document_id_fails_a_not_yet_dequeued_job() {
    let queue = JobQueue::new();
    let document_id = Uuid::new_v4();
    let job = sample_job(document_id);
    let job_id = job.job_id;
    queue.enqueue(job).await.unwrap();

    queue.cancel_by_document_id(document_id);
    assert_eq!(queue.get_status(job_id).unwrap().state, JobState::Failed);
  }

  #[tokio::test]
  async fn cleanup_evicts_old_terminal_statuses() {
    let queue = JobQueue::new();
    let job = sample_job(Uuid::new_v4());
    let job_id = job.job_id;
    queue.enqueue(job).await.unwrap();
    queue.dequeue().await.unwrap();
    queue.update(job_id, JobState::Completed, Some(JobPhase::Complete), 100, None);

    queue.cleanup(Duration::from_secs(0));
    assert!(queue.get_status(job_id).is_none());
  }
}
