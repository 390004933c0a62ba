//! Polls the job queue's status registry and publishes deltas to any
//! subscriber bound to a job id, throttling active-state emissions and
//! evicting statuses the broadcaster hasn't seen in a while.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use contextd_core::{IngestionJobStatus, JobState};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const EVICTION_AGE: Duration = Duration::from_secs(5 * 60);

use crate::queue::JobQueue;

pub struct ProgressBroadcaster {
  sender: broadcast::Sender<IngestionJobStatus>,
}

impl ProgressBroadcaster {
  pub fn new() -> Self {
    let (sender, _) = broadcast::channel(256);
    Self { sender }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<IngestionJobStatus> {
    self.sender.subscribe()
  }

  /// Runs the polling loop until `shutdown` fires. On a send failure
  /// (no subscribers, or a transport error were this backed by a real
  /// transport) it sleeps and retries rather than propagating the error.
  pub async fn run(&self, queue: Arc<JobQueue>, shutdown: CancellationToken) {
    let last_emit: DashMap<Uuid, Instant> = DashMap::new();
    let last_seen: DashMap<Uuid, Instant> = DashMap::new();
    let mut emitted_terminal: DashMap<Uuid, DateTime<Utc>> = DashMap::new();

    let mut interval = tokio::time::interval(POLL_INTERVAL);
    loop {
      tokio::select! {
        biased;
        _ = shutdown.cancelled() => break,
        _ = interval.tick() => {
          self.poll_once(&queue, &last_emit, &last_seen, &mut emitted_terminal).await;
        }
      }
    }
  }

  async fn poll_once(&self, queue: &JobQueue, last_emit: &DashMap<Uuid, Instant>, last_seen: &DashMap<Uuid, Instant>, emitted_terminal: &mut DashMap<Uuid, DateTime<Utc>>) {
    let now = Instant::now();

    for job_id in queue.job_ids() {
      let Some(status) = queue.get_status(job_id) else { continue };
      last_seen.insert(job_id, now);

      let should_emit = if !last_emit.contains_key(&job_id) {
        true
      } else if matches!(status.state, JobState::Completed | JobState::Failed) {
        status.completed_at.map(|completed_at| emitted_terminal.get(&job_id).map(|last| completed_at > *last).unwrap_or(true)).unwrap_or(false)
      } else {
        last_emit.get(&job_id).map(|at| now.duration_since(*at) >= POLL_INTERVAL).unwrap_or(true)
      };

      if should_emit {
        if self.sender.send(status.clone()).is_err() {
          tokio::time::sleep(Duration::from_secs(1)).await;
        }
        last_emit.insert(job_id, now);
        if let Some(completed_at) = status.completed_at {
          emitted_terminal.insert(job_id, completed_at);
        }
      }
    }

    last_seen.retain(|_, seen_at| now.duration_since(*seen_at) < EVICTION_AGE);
    let live: std::collections::HashSet<Uuid> = last_seen.iter().map(|entry| *entry.key()).collect();
    last_emit.retain(|job_id, _| live.contains(job_id));
    emitted_terminal.retain(|job_id, _| live.contains(job_id));
  }
}

impl Default for ProgressBroadcaster {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use contextd_core::{IngestionJob, IngestionOptions, JobPhase};

  fn sample_job() -> IngestionJob {
    IngestionJob {
      job_id: Uuid::new_v4(),
      document_id: Uuid::new_v4(),
      storage_path: "/doc.txt".to_string(),
      options: IngestionOptions {
        document_id: None,
        file_name: None,
        content_type: None,
        container_id: Uuid::new_v4(),
        path: None,
        strategy: None,
        metadata: None,
      },
      batch_id: None,
    }
  }

  #[tokio::test]
  async fn emits_once_on_first_observation() {
    let queue = Arc::new(JobQueue::new());
    let job = sample_job();
    let job_id = job.job_id;
    queue.enqueue(job).await.unwrap();

    let broadcaster = ProgressBroadcaster::new();
    let mut receiver = broadcaster.subscribe();

    let last_emit = DashMap::new();
    let last_seen = DashMap::new();
    let mut emitted_terminal = DashMap::new();
    broadcaster.poll_once(&queue, &last_emit, &last_seen, &mut emitted_terminal).await;

    let status = receiver.try_recv().unwrap();
    assert_eq!(status.job_id, job_id);
  }

  #[tokio::test]
  async fn stale_jobs_are_evicted_from_every_tracking_map_not_just_last_seen() {
    let queue = Arc::new(JobQueue::new());
    let broadcaster = ProgressBroadcaster::new();

    let stale_job_id = Uuid::new_v4();
    let stale_at = Instant::now() - EVICTION_AGE - Duration::from_secs(1);
    let last_emit = DashMap::new();
    let last_seen = DashMap::new();
    let mut emitted_terminal = DashMap::new();
    last_emit.insert(stale_job_id, stale_at);
    last_seen.insert(stale_job_id, stale_at);
    emitted_terminal.insert(stale_job_id, Utc::now());

    broadcaster.poll_once(&queue, &last_emit, &last_seen, &mut emitted_terminal).await;

    assert!(!last_seen.contains_key(&stale_job_id));
    assert!(!last_emit.contains_key(&stale_job_id));
    assert!(!emitted_terminal.contains_key(&stale_job_id));
  }

  #[tokio::test]
  async fn terminal_state_emits_exactly_once() {
    let queue = Arc::new(JobQueue::new());
    let job = sample_job();
    let job_id = job.job_id;
    queue.enqueue(job).await.unwrap();
    queue.dequeue().await.unwrap();
    queue.update(job_id, JobState::Completed, Some(JobPhase::Complete), 100, None);

    let broadcaster = ProgressBroadcaster::new();
    let mut receiver = broadcaster.subscribe();

    let last_emit = DashMap::new();
    let last_seen = DashMap::new();
    let mut emitted_terminal = DashMap::new();
    broadcaster.poll_once(&queue, &last_emit, &last_seen, &mut emitted_terminal).await;
    broadcaster.poll_once(&queue, &last_emit, &last_seen, &mut emitted_terminal).await;

    assert!(receiver.try_recv().is_ok());
    assert!(receiver.try_recv().is_err());
  }
}
