//! Domain entities shared by the store, ingestion, and search layers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata fingerprint keys recorded on a [`Document`] when it is indexed.
///
/// The reindex controller compares these against the live settings snapshot
/// to decide whether a document's chunks were produced with stale parameters.
pub mod fingerprint_keys {
  pub const CHUNKING_STRATEGY: &str = "IndexedWith:ChunkingStrategy";
  pub const CHUNKING_MAX_SIZE: &str = "IndexedWith:ChunkingMaxSize";
  pub const CHUNKING_OVERLAP: &str = "IndexedWith:ChunkingOverlap";
  pub const EMBEDDING_PROVIDER: &str = "IndexedWith:EmbeddingProvider";
  pub const EMBEDDING_MODEL: &str = "IndexedWith:EmbeddingModel";
  pub const EMBEDDING_DIMENSIONS: &str = "IndexedWith:EmbeddingDimensions";
}

/// A named isolation boundary documents and folders live under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
  pub id: Uuid,
  pub name: String,
  pub description: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContainerNameError {
  #[error("container name must be 2-64 characters")]
  BadLength,
  #[error("container name must match ^[a-z0-9][a-z0-9-]*[a-z0-9]$")]
  BadFormat,
}

/// Validate a container name against `^[a-z0-9][a-z0-9-]*[a-z0-9]$`, length 2..64.
///
/// Names are compared case-insensitively by callers; this only checks shape.
pub fn validate_container_name(name: &str) -> Result<(), ContainerNameError> {
  let lower = name.to_ascii_lowercase();
  if lower.len() < 2 || lower.len() > 64 {
    return Err(ContainerNameError::BadLength);
  }
  let bytes = lower.as_bytes();
  let is_alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
  if !is_alnum(bytes[0]) || !is_alnum(bytes[bytes.len() - 1]) {
    return Err(ContainerNameError::BadFormat);
  }
  if !bytes.iter().all(|&b| is_alnum(b) || b == b'-') {
    return Err(ContainerNameError::BadFormat);
  }
  Ok(())
}

/// A hierarchical path inside a container, e.g. `/reports/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
  pub container_id: Uuid,
  pub path: String,
}

/// Normalize a folder path to begin and end with `/`.
pub fn normalize_folder_path(path: &str) -> String {
  let mut normalized = path.trim().to_string();
  if !normalized.starts_with('/') {
    normalized.insert(0, '/');
  }
  if !normalized.ends_with('/') {
    normalized.push('/');
  }
  normalized
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
  Pending,
  Processing,
  Ready,
  Failed,
}

/// A file registered for indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
  pub id: Uuid,
  pub container_id: Uuid,
  pub file_name: String,
  pub content_type: String,
  pub path: String,
  pub content_hash: String,
  pub size_bytes: u64,
  pub chunk_count: u32,
  pub status: DocumentStatus,
  pub error_message: Option<String>,
  pub created_at: DateTime<Utc>,
  pub last_indexed_at: Option<DateTime<Utc>>,
  pub metadata: HashMap<String, String>,
}

/// A bounded text span belonging to exactly one [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
  pub id: Uuid,
  pub document_id: Uuid,
  pub container_id: Uuid,
  pub content: String,
  pub chunk_index: u32,
  pub token_count: u32,
  pub start_offset: u32,
  pub end_offset: u32,
  pub metadata: HashMap<String, String>,
}

/// Dense embedding for exactly one [`Chunk`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkVector {
  pub chunk_id: Uuid,
  pub document_id: Uuid,
  pub container_id: Uuid,
  pub embedding: Vec<f32>,
  pub model_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
  Queued,
  Processing,
  Completed,
  Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
  Parsing,
  Chunking,
  Embedding,
  Storing,
  Complete,
}

/// A unit of ingestion work queued for a worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionJob {
  pub job_id: Uuid,
  pub document_id: Uuid,
  pub storage_path: String,
  pub options: IngestionOptions,
  pub batch_id: Option<Uuid>,
}

/// Observable lifecycle of an [`IngestionJob`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionJobStatus {
  pub job_id: Uuid,
  pub state: JobState,
  pub current_phase: Option<JobPhase>,
  pub percent_complete: u8,
  pub error_message: Option<String>,
  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
}

impl IngestionJobStatus {
  pub fn queued(job_id: Uuid) -> Self {
    Self {
      job_id,
      state: JobState::Queued,
      current_phase: None,
      percent_complete: 0,
      error_message: None,
      started_at: None,
      completed_at: None,
    }
  }
}

/// Per-document chunking/embedding strategy override for one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionOptions {
  pub document_id: Option<Uuid>,
  pub file_name: Option<String>,
  pub content_type: Option<String>,
  pub container_id: Uuid,
  pub path: Option<String>,
  pub strategy: Option<crate::config::ChunkingStrategy>,
  pub metadata: Option<HashMap<String, String>>,
}

/// Narrows a search to a subset of a container's documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
  pub document_id: Option<Uuid>,
  pub path_prefix: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn container_name_accepts_valid_shapes() {
    assert!(validate_container_name("ab").is_ok());
    assert!(validate_container_name("my-container-1").is_ok());
  }

  #[test]
  fn container_name_rejects_bad_length() {
    assert_eq!(validate_container_name("a").unwrap_err(), ContainerNameError::BadLength);
    let too_long = "a".repeat(65);
    assert_eq!(validate_container_name(&too_long).unwrap_err(), ContainerNameError::BadLength);
  }

  #[test]
  fn container_name_rejects_bad_edges() {
    assert_eq!(validate_container_name("-ab").unwrap_err(), ContainerNameError::BadFormat);
    assert_eq!(validate_container_name("ab-").unwrap_err(), ContainerNameError::BadFormat);
  }

  #[test]
  fn container_name_rejects_invalid_chars() {
    assert_eq!(validate_container_name("ab_cd").unwrap_err(), ContainerNameError::BadFormat);
    assert_eq!(validate_container_name("Ab Cd").unwrap_err(), ContainerNameError::BadFormat);
  }

  #[test]
  fn folder_path_is_normalized() {
    assert_eq!(normalize_folder_path("reports"), "/reports/");
    assert_eq!(normalize_folder_path("/reports"), "/reports/");
    assert_eq!(normalize_folder_path("reports/"), "/reports/");
    assert_eq!(normalize_folder_path("/reports/"), "/reports/");
  }
}
