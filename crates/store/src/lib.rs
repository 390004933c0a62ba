//! The [`Store`] trait: the container/folder/document/chunk persistence
//! contract shared by every backend, plus [`PostgresStore`] (the contract's
//! reference implementation, via `pgvector`) and [`SqliteStore`] (a
//! fast in-process backend for tests and small local setups, trading
//! `pgvector`'s indexed ANN search for a brute-force cosine scan).

mod postgres;
mod sqlite;

pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use contextd_core::{Chunk, ChunkVector, Container, Document, Folder, SearchFilters};
use uuid::Uuid;

/// A scored chunk returned from a keyword or vector search.
#[derive(Debug, Clone)]
pub struct ChunkCandidate {
  pub chunk_id: Uuid,
  pub document_id: Uuid,
  pub file_name: String,
  pub content_type: String,
  pub content: String,
  pub chunk_index: u32,
  /// Raw backend-specific score: FTS rank (negated, higher is better) for
  /// keyword search, cosine similarity for vector search. Callers normalize
  /// before comparing scores across the two search modes.
  pub raw_score: f64,
}

#[async_trait]
pub trait Store: Send + Sync {
  async fn upsert_container(&self, container: &Container) -> Result<(), StoreError>;
  async fn get_container(&self, id: Uuid) -> Result<Option<Container>, StoreError>;
  async fn get_container_by_name(&self, name: &str) -> Result<Option<Container>, StoreError>;
  async fn list_containers(&self) -> Result<Vec<Container>, StoreError>;
  /// True if the container holds any Document or non-root Folder. Callers
  /// must check this before `delete_container`: deletion of a non-empty
  /// container is refused.
  async fn container_has_contents(&self, id: Uuid) -> Result<bool, StoreError>;
  /// Removes an empty container. Does not itself enforce emptiness; callers
  /// check `container_has_contents` first.
  async fn delete_container(&self, id: Uuid) -> Result<(), StoreError>;

  async fn upsert_folder(&self, folder: &Folder) -> Result<(), StoreError>;
  async fn list_folders(&self, container_id: Uuid) -> Result<Vec<Folder>, StoreError>;
  /// Removes every folder and document whose path falls under `path_prefix`
  /// (inclusive), cascading to their chunks and chunk vectors.
  async fn delete_folder(&self, container_id: Uuid, path_prefix: &str) -> Result<(), StoreError>;

  async fn upsert_document(&self, document: &Document) -> Result<(), StoreError>;
  async fn get_document(&self, id: Uuid) -> Result<Option<Document>, StoreError>;
  async fn get_document_by_path(&self, container_id: Uuid, path: &str, file_name: &str) -> Result<Option<Document>, StoreError>;
  async fn list_documents(&self, container_id: Uuid) -> Result<Vec<Document>, StoreError>;
  /// Removes the document and cascades to its chunks and chunk vectors.
  async fn delete_document(&self, id: Uuid) -> Result<(), StoreError>;

  /// Atomically replaces every chunk (and its vector, if present) belonging
  /// to `document_id`. `vectors` need not cover every chunk: a chunk with
  /// no corresponding vector is persisted without one and is invisible to
  /// vector search until a later embedding pass fills it in.
  async fn replace_chunks(&self, document_id: Uuid, chunks: &[Chunk], vectors: &[ChunkVector]) -> Result<(), StoreError>;

  async fn keyword_search(&self, container_id: Uuid, query: &str, limit: usize, filters: &SearchFilters) -> Result<Vec<ChunkCandidate>, StoreError>;
  async fn vector_search(&self, container_id: Uuid, query_vector: &[f32], limit: usize, filters: &SearchFilters) -> Result<Vec<ChunkCandidate>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
  #[error("migration failed: {0}")]
  Migration(String),
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}
