//! PostgreSQL-backed [`Store`] implementation.
//!
//! This is the contract's reference backend (§6): `pgvector` supplies the
//! `vector(D)` column and its cosine-distance operator (`<=>`, distance in
//! `[0,2]`, similarity = `1 - distance`) backed by an IVFFlat ANN index;
//! Postgres's own generated `tsvector` column and GIN index cover lexical
//! search. Everything here maps onto the same five tables as the SQLite
//! backend, just with native `uuid`, `timestamptz`, and `jsonb` columns in
//! place of SQLite's text/integer encodings.
//!
//! Embedding dimension is fixed per deployment: `migrate` takes it as a
//! parameter so the `vector(D)` column and its IVFFlat index can be
//! declared at creation time, matching §9's requirement that vectors of
//! different dimensions never share a query.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contextd_core::{Chunk, ChunkVector, Container, Document, DocumentStatus, Folder, SearchFilters};
use pgvector::Vector;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{ChunkCandidate, Store, StoreError};

pub struct PostgresStore {
  pool: PgPool,
}

impl PostgresStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  /// Creates every table, index, and extension this store needs, idempotently.
  /// `embedding_dimensions` fixes the width of the `chunk_vectors.embedding`
  /// column; changing it later requires a fresh column (see §9 on dimension
  /// changes invalidating existing vectors).
  pub async fn migrate(&self, embedding_dimensions: u32) -> Result<(), StoreError> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector").execute(&self.pool).await.map_err(|e| StoreError::Migration(e.to_string()))?;

    sqlx::query(
      r#"
      CREATE TABLE IF NOT EXISTS containers (
          id UUID PRIMARY KEY,
          name TEXT NOT NULL UNIQUE,
          description TEXT,
          created_at TIMESTAMPTZ NOT NULL,
          updated_at TIMESTAMPTZ NOT NULL
      )
      "#,
    )
    .execute(&self.pool)
    .await?;
    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_containers_name_ci ON containers (LOWER(name))").execute(&self.pool).await?;

    sqlx::query(
      r#"
      CREATE TABLE IF NOT EXISTS folders (
          container_id UUID NOT NULL REFERENCES containers(id),
          path TEXT NOT NULL,
          PRIMARY KEY (container_id, path)
      )
      "#,
    )
    .execute(&self.pool)
    .await?;

    sqlx::query(
      r#"
      CREATE TABLE IF NOT EXISTS documents (
          id UUID PRIMARY KEY,
          container_id UUID NOT NULL REFERENCES containers(id),
          file_name TEXT NOT NULL,
          content_type TEXT NOT NULL,
          path TEXT NOT NULL,
          content_hash TEXT NOT NULL,
          size_bytes BIGINT NOT NULL,
          chunk_count INTEGER NOT NULL DEFAULT 0,
          status TEXT NOT NULL,
          error_message TEXT,
          created_at TIMESTAMPTZ NOT NULL,
          last_indexed_at TIMESTAMPTZ,
          metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
          UNIQUE(container_id, path, file_name)
      )
      "#,
    )
    .execute(&self.pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_container_id ON documents(container_id)").execute(&self.pool).await?;

    sqlx::query(
      r#"
      CREATE TABLE IF NOT EXISTS chunks (
          id UUID PRIMARY KEY,
          document_id UUID NOT NULL REFERENCES documents(id),
          container_id UUID NOT NULL,
          content TEXT NOT NULL,
          chunk_index INTEGER NOT NULL,
          token_count INTEGER NOT NULL,
          start_offset INTEGER NOT NULL,
          end_offset INTEGER NOT NULL,
          metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
          search_vector tsvector GENERATED ALWAYS AS (to_tsvector('english', content)) STORED,
          UNIQUE(document_id, chunk_index)
      )
      "#,
    )
    .execute(&self.pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)").execute(&self.pool).await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_search_vector ON chunks USING GIN(search_vector)").execute(&self.pool).await?;

    sqlx::query(&format!(
      r#"
      CREATE TABLE IF NOT EXISTS chunk_vectors (
          chunk_id UUID PRIMARY KEY REFERENCES chunks(id),
          document_id UUID NOT NULL,
          container_id UUID NOT NULL,
          embedding vector({embedding_dimensions}) NOT NULL,
          model_id TEXT NOT NULL
      )
      "#
    ))
    .execute(&self.pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunk_vectors_container_id ON chunk_vectors(container_id)").execute(&self.pool).await?;
    // lists=100 per §6; ANN recall at small row counts is better served by the
    // planner falling back to a seq scan, which Postgres does automatically
    // below the index's effective selectivity threshold.
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunk_vectors_ann ON chunk_vectors USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100)")
      .execute(&self.pool)
      .await?;

    Ok(())
  }
}

fn status_to_str(status: DocumentStatus) -> &'static str {
  match status {
    DocumentStatus::Pending => "pending",
    DocumentStatus::Processing => "processing",
    DocumentStatus::Ready => "ready",
    DocumentStatus::Failed => "failed",
  }
}

fn status_from_str(status: &str) -> DocumentStatus {
  match status {
    "processing" => DocumentStatus::Processing,
    "ready" => DocumentStatus::Ready,
    "failed" => DocumentStatus::Failed,
    _ => DocumentStatus::Pending,
  }
}

fn row_to_document(row: &sqlx::postgres::PgRow) -> Result<Document, StoreError> {
  let metadata: serde_json::Value = row.get("metadata");
  let metadata: HashMap<String, String> = serde_json::from_value(metadata)?;

  Ok(Document {
    id: row.get("id"),
    container_id: row.get("container_id"),
    file_name: row.get("file_name"),
    content_type: row.get("content_type"),
    path: row.get("path"),
    content_hash: row.get("content_hash"),
    size_bytes: row.get::<i64, _>("size_bytes") as u64,
    chunk_count: row.get::<i32, _>("chunk_count") as u32,
    status: status_from_str(row.get("status")),
    error_message: row.get("error_message"),
    created_at: row.get("created_at"),
    last_indexed_at: row.get::<Option<DateTime<Utc>>, _>("last_indexed_at"),
    metadata,
  })
}

#[async_trait]
impl Store for PostgresStore {
  async fn upsert_container(&self, container: &Container) -> Result<(), StoreError> {
    sqlx::query(
      r#"
      INSERT INTO containers (id, name, description, created_at, updated_at)
      VALUES ($1, $2, $3, $4, $5)
      ON CONFLICT(id) DO UPDATE SET
          name = excluded.name,
          description = excluded.description,
          updated_at = excluded.updated_at
      "#,
    )
    .bind(container.id)
    .bind(&container.name)
    .bind(&container.description)
    .bind(container.created_at)
    .bind(container.updated_at)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn get_container(&self, id: Uuid) -> Result<Option<Container>, StoreError> {
    let row = sqlx::query("SELECT id, name, description, created_at, updated_at FROM containers WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;

    Ok(row.map(|r| Container {
      id,
      name: r.get("name"),
      description: r.get("description"),
      created_at: r.get("created_at"),
      updated_at: r.get("updated_at"),
    }))
  }

  async fn get_container_by_name(&self, name: &str) -> Result<Option<Container>, StoreError> {
    let row = sqlx::query("SELECT id, name, description, created_at, updated_at FROM containers WHERE LOWER(name) = LOWER($1)")
      .bind(name)
      .fetch_optional(&self.pool)
      .await?;

    Ok(row.map(|r| Container {
      id: r.get("id"),
      name: r.get("name"),
      description: r.get("description"),
      created_at: r.get("created_at"),
      updated_at: r.get("updated_at"),
    }))
  }

  async fn list_containers(&self) -> Result<Vec<Container>, StoreError> {
    let rows = sqlx::query("SELECT id, name, description, created_at, updated_at FROM containers ORDER BY name ASC").fetch_all(&self.pool).await?;

    Ok(
      rows
        .iter()
        .map(|r| Container {
          id: r.get("id"),
          name: r.get("name"),
          description: r.get("description"),
          created_at: r.get("created_at"),
          updated_at: r.get("updated_at"),
        })
        .collect(),
    )
  }

  async fn container_has_contents(&self, id: Uuid) -> Result<bool, StoreError> {
    let has_documents: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM documents WHERE container_id = $1)").bind(id).fetch_one(&self.pool).await?;
    if has_documents {
      return Ok(true);
    }
    let has_non_root_folders: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM folders WHERE container_id = $1 AND path != '/')")
      .bind(id)
      .fetch_one(&self.pool)
      .await?;
    Ok(has_non_root_folders)
  }

  async fn delete_container(&self, id: Uuid) -> Result<(), StoreError> {
    let mut tx = self.pool.begin().await?;

    sqlx::query("DELETE FROM chunk_vectors WHERE container_id = $1").bind(id).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM chunks WHERE container_id = $1").bind(id).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM documents WHERE container_id = $1").bind(id).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM folders WHERE container_id = $1").bind(id).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM containers WHERE id = $1").bind(id).execute(&mut *tx).await?;

    tx.commit().await?;
    Ok(())
  }

  async fn upsert_folder(&self, folder: &Folder) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO folders (container_id, path) VALUES ($1, $2) ON CONFLICT(container_id, path) DO NOTHING")
      .bind(folder.container_id)
      .bind(&folder.path)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn list_folders(&self, container_id: Uuid) -> Result<Vec<Folder>, StoreError> {
    let rows = sqlx::query("SELECT container_id, path FROM folders WHERE container_id = $1 ORDER BY path ASC")
      .bind(container_id)
      .fetch_all(&self.pool)
      .await?;

    Ok(
      rows
        .iter()
        .map(|r| Folder {
          container_id,
          path: r.get("path"),
        })
        .collect(),
    )
  }

  async fn delete_folder(&self, container_id: Uuid, path_prefix: &str) -> Result<(), StoreError> {
    let like_pattern = format!("{path_prefix}%");
    let mut tx = self.pool.begin().await?;

    let document_ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM documents WHERE container_id = $1 AND path LIKE $2")
      .bind(container_id)
      .bind(&like_pattern)
      .fetch_all(&mut *tx)
      .await?;

    for document_id in &document_ids {
      sqlx::query("DELETE FROM chunk_vectors WHERE document_id = $1").bind(document_id).execute(&mut *tx).await?;
      sqlx::query("DELETE FROM chunks WHERE document_id = $1").bind(document_id).execute(&mut *tx).await?;
      sqlx::query("DELETE FROM documents WHERE id = $1").bind(document_id).execute(&mut *tx).await?;
    }

    sqlx::query("DELETE FROM folders WHERE container_id = $1 AND path LIKE $2")
      .bind(container_id)
      .bind(&like_pattern)
      .execute(&mut *tx)
      .await?;

    tx.commit().await?;
    Ok(())
  }

  async fn upsert_document(&self, document: &Document) -> Result<(), StoreError> {
    let metadata = serde_json::to_value(&document.metadata)?;

    sqlx::query(
      r#"
      INSERT INTO documents (id, container_id, file_name, content_type, path, content_hash,
                              size_bytes, chunk_count, status, error_message, created_at,
                              last_indexed_at, metadata)
      VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
      ON CONFLICT(id) DO UPDATE SET
          file_name = excluded.file_name,
          content_type = excluded.content_type,
          path = excluded.path,
          content_hash = excluded.content_hash,
          size_bytes = excluded.size_bytes,
          chunk_count = excluded.chunk_count,
          status = excluded.status,
          error_message = excluded.error_message,
          last_indexed_at = excluded.last_indexed_at,
          metadata = excluded.metadata
      "#,
    )
    .bind(document.id)
    .bind(document.container_id)
    .bind(&document.file_name)
    .bind(&document.content_type)
    .bind(&document.path)
    .bind(&document.content_hash)
    .bind(document.size_bytes as i64)
    .bind(document.chunk_count as i32)
    .bind(status_to_str(document.status))
    .bind(&document.error_message)
    .bind(document.created_at)
    .bind(document.last_indexed_at)
    .bind(metadata)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn get_document(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
    let row = sqlx::query(
      r#"SELECT id, container_id, file_name, content_type, path, content_hash, size_bytes,
                chunk_count, status, error_message, created_at, last_indexed_at, metadata
         FROM documents WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await?;

    row.as_ref().map(row_to_document).transpose()
  }

  async fn get_document_by_path(&self, container_id: Uuid, path: &str, file_name: &str) -> Result<Option<Document>, StoreError> {
    let row = sqlx::query(
      r#"SELECT id, container_id, file_name, content_type, path, content_hash, size_bytes,
                chunk_count, status, error_message, created_at, last_indexed_at, metadata
         FROM documents WHERE container_id = $1 AND path = $2 AND file_name = $3"#,
    )
    .bind(container_id)
    .bind(path)
    .bind(file_name)
    .fetch_optional(&self.pool)
    .await?;

    row.as_ref().map(row_to_document).transpose()
  }

  async fn list_documents(&self, container_id: Uuid) -> Result<Vec<Document>, StoreError> {
    let rows = sqlx::query(
      r#"SELECT id, container_id, file_name, content_type, path, content_hash, size_bytes,
                chunk_count, status, error_message, created_at, last_indexed_at, metadata
         FROM documents WHERE container_id = $1 ORDER BY path ASC, file_name ASC"#,
    )
    .bind(container_id)
    .fetch_all(&self.pool)
    .await?;

    rows.iter().map(row_to_document).collect()
  }

  async fn delete_document(&self, id: Uuid) -> Result<(), StoreError> {
    let mut tx = self.pool.begin().await?;

    sqlx::query("DELETE FROM chunk_vectors WHERE document_id = $1").bind(id).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM chunks WHERE document_id = $1").bind(id).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM documents WHERE id = $1").bind(id).execute(&mut *tx).await?;

    tx.commit().await?;
    Ok(())
  }

  async fn replace_chunks(&self, document_id: Uuid, chunks: &[Chunk], vectors: &[ChunkVector]) -> Result<(), StoreError> {
    let mut tx = self.pool.begin().await?;

    sqlx::query("DELETE FROM chunk_vectors WHERE document_id = $1").bind(document_id).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM chunks WHERE document_id = $1").bind(document_id).execute(&mut *tx).await?;

    for chunk in chunks {
      let metadata = serde_json::to_value(&chunk.metadata)?;
      sqlx::query(
        r#"
        INSERT INTO chunks (id, document_id, container_id, content, chunk_index, token_count,
                             start_offset, end_offset, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
      )
      .bind(chunk.id)
      .bind(chunk.document_id)
      .bind(chunk.container_id)
      .bind(&chunk.content)
      .bind(chunk.chunk_index as i32)
      .bind(chunk.token_count as i32)
      .bind(chunk.start_offset as i32)
      .bind(chunk.end_offset as i32)
      .bind(metadata)
      .execute(&mut *tx)
      .await?;
    }

    for vector in vectors {
      sqlx::query(
        r#"
        INSERT INTO chunk_vectors (chunk_id, document_id, container_id, embedding, model_id)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT(chunk_id) DO UPDATE SET
            embedding = excluded.embedding,
            model_id = excluded.model_id
        "#,
      )
      .bind(vector.chunk_id)
      .bind(vector.document_id)
      .bind(vector.container_id)
      .bind(Vector::from(vector.embedding.clone()))
      .bind(&vector.model_id)
      .execute(&mut *tx)
      .await?;
    }

    tx.commit().await?;
    Ok(())
  }

  async fn keyword_search(&self, container_id: Uuid, query: &str, limit: usize, filters: &SearchFilters) -> Result<Vec<ChunkCandidate>, StoreError> {
    let rows = sqlx::query(
      r#"
      SELECT c.id, c.document_id, c.content, c.chunk_index, d.file_name, d.content_type,
             ts_rank(c.search_vector, plainto_tsquery('english', $2)) AS rank
      FROM chunks c
      JOIN documents d ON d.id = c.document_id
      WHERE c.container_id = $1 AND c.search_vector @@ plainto_tsquery('english', $2)
          AND ($3::uuid IS NULL OR c.document_id = $3)
          AND ($4::text IS NULL OR d.path LIKE $4)
      ORDER BY rank DESC
      LIMIT $5
      "#,
    )
    .bind(container_id)
    .bind(query)
    .bind(filters.document_id)
    .bind(filters.path_prefix.as_ref().map(|p| format!("{p}%")))
    .bind(limit as i64)
    .fetch_all(&self.pool)
    .await?;

    Ok(
      rows
        .iter()
        .map(|row| ChunkCandidate {
          chunk_id: row.get("id"),
          document_id: row.get("document_id"),
          file_name: row.get("file_name"),
          content_type: row.get("content_type"),
          content: row.get("content"),
          chunk_index: row.get::<i32, _>("chunk_index") as u32,
          raw_score: row.get::<f32, _>("rank") as f64,
        })
        .collect(),
    )
  }

  async fn vector_search(&self, container_id: Uuid, query_vector: &[f32], limit: usize, filters: &SearchFilters) -> Result<Vec<ChunkCandidate>, StoreError> {
    let query_vec = Vector::from(query_vector.to_vec());

    let rows = sqlx::query(
      r#"
      SELECT cv.chunk_id, cv.document_id, c.content, c.chunk_index, d.file_name, d.content_type,
             1 - (cv.embedding <=> $2) AS similarity
      FROM chunk_vectors cv
      JOIN chunks c ON c.id = cv.chunk_id
      JOIN documents d ON d.id = cv.document_id
      WHERE cv.container_id = $1
          AND ($3::uuid IS NULL OR cv.document_id = $3)
          AND ($4::text IS NULL OR d.path LIKE $4)
      ORDER BY cv.embedding <=> $2
      LIMIT $5
      "#,
    )
    .bind(container_id)
    .bind(query_vec)
    .bind(filters.document_id)
    .bind(filters.path_prefix.as_ref().map(|p| format!("{p}%")))
    .bind(limit as i64)
    .fetch_all(&self.pool)
    .await?;

    Ok(
      rows
        .iter()
        .map(|row| ChunkCandidate {
          chunk_id: row.get("chunk_id"),
          document_id: row.get("document_id"),
          file_name: row.get("file_name"),
          content_type: row.get("content_type"),
          content: row.get("content"),
          chunk_index: row.get::<i32, _>("chunk_index") as u32,
          raw_score: row.get::<f64, _>("similarity"),
        })
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use contextd_core::content_hash;

  use super::*;

  /// Exercises the real backend against a live Postgres+pgvector instance.
  /// Skipped unless `DATABASE_URL` is set, since no such instance is
  /// available in this workspace's default test environment; the SQLite
  /// backend's test module covers the same behavior in-process.
  #[tokio::test]
  #[ignore = "requires a live Postgres instance with the pgvector extension; set DATABASE_URL to run"]
  async fn container_and_vector_search_round_trip() {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
      return;
    };
    let pool = PgPool::connect(&database_url).await.expect("connect");
    let store = PostgresStore::new(pool);
    store.migrate(3).await.expect("migrate");

    let now = Utc::now();
    let container = Container {
      id: Uuid::new_v4(),
      name: "pg-smoke-test".to_string(),
      description: None,
      created_at: now,
      updated_at: now,
    };
    store.upsert_container(&container).await.unwrap();

    let document = Document {
      id: Uuid::new_v4(),
      container_id: container.id,
      file_name: "report.txt".to_string(),
      content_type: "text/plain".to_string(),
      path: "/".to_string(),
      content_hash: content_hash(b"hello world"),
      size_bytes: 11,
      chunk_count: 1,
      status: DocumentStatus::Ready,
      error_message: None,
      created_at: now,
      last_indexed_at: Some(now),
      metadata: HashMap::new(),
    };
    store.upsert_document(&document).await.unwrap();

    let chunk = Chunk {
      id: Uuid::new_v4(),
      document_id: document.id,
      container_id: container.id,
      content: "hello world".to_string(),
      chunk_index: 0,
      token_count: 2,
      start_offset: 0,
      end_offset: 11,
      metadata: HashMap::new(),
    };
    let vector = ChunkVector {
      chunk_id: chunk.id,
      document_id: document.id,
      container_id: container.id,
      embedding: vec![0.1, 0.2, 0.3],
      model_id: "test-model".to_string(),
    };
    store.replace_chunks(document.id, &[chunk], &[vector]).await.unwrap();

    let results = store.vector_search(container.id, &[0.1, 0.2, 0.3], 5, &SearchFilters::default()).await.unwrap();
    assert_eq!(results.len(), 1);

    store.delete_document(document.id).await.unwrap();
    let results_after = store.vector_search(container.id, &[0.1, 0.2, 0.3], 5, &SearchFilters::default()).await.unwrap();
    assert!(results_after.is_empty());

    store.delete_container(container.id).await.unwrap();
  }
}
