//! SQLite-backed [`Store`] implementation.
//!
//! Maps every [`Store`] operation onto a schema of five tables: containers,
//! folders, documents, chunks (mirrored into an FTS5 virtual table for
//! keyword search) and chunk_vectors (embedding blobs, scanned brute-force
//! for vector search).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contextd_core::{blob_to_vec, cosine_similarity, vec_to_blob, Chunk, ChunkVector, Container, Document, DocumentStatus, Folder, SearchFilters};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::{ChunkCandidate, Store, StoreError};

pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }

  /// Creates every table this store needs, idempotently. Safe to call on
  /// every startup.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::query(
      r#"
      CREATE TABLE IF NOT EXISTS containers (
          id TEXT PRIMARY KEY,
          name TEXT NOT NULL UNIQUE,
          description TEXT,
          created_at INTEGER NOT NULL,
          updated_at INTEGER NOT NULL
      )
      "#,
    )
    .execute(&self.pool)
    .await?;

    sqlx::query(
      r#"
      CREATE TABLE IF NOT EXISTS folders (
          container_id TEXT NOT NULL,
          path TEXT NOT NULL,
          PRIMARY KEY (container_id, path),
          FOREIGN KEY (container_id) REFERENCES containers(id)
      )
      "#,
    )
    .execute(&self.pool)
    .await?;

    sqlx::query(
      r#"
      CREATE TABLE IF NOT EXISTS documents (
          id TEXT PRIMARY KEY,
          container_id TEXT NOT NULL,
          file_name TEXT NOT NULL,
          content_type TEXT NOT NULL,
          path TEXT NOT NULL,
          content_hash TEXT NOT NULL,
          size_bytes INTEGER NOT NULL,
          chunk_count INTEGER NOT NULL DEFAULT 0,
          status TEXT NOT NULL,
          error_message TEXT,
          created_at INTEGER NOT NULL,
          last_indexed_at INTEGER,
          metadata_json TEXT NOT NULL DEFAULT '{}',
          UNIQUE(container_id, path, file_name),
          FOREIGN KEY (container_id) REFERENCES containers(id)
      )
      "#,
    )
    .execute(&self.pool)
    .await?;

    sqlx::query(
      r#"
      CREATE TABLE IF NOT EXISTS chunks (
          id TEXT PRIMARY KEY,
          document_id TEXT NOT NULL,
          container_id TEXT NOT NULL,
          content TEXT NOT NULL,
          chunk_index INTEGER NOT NULL,
          token_count INTEGER NOT NULL,
          start_offset INTEGER NOT NULL,
          end_offset INTEGER NOT NULL,
          metadata_json TEXT NOT NULL DEFAULT '{}',
          UNIQUE(document_id, chunk_index),
          FOREIGN KEY (document_id) REFERENCES documents(id)
      )
      "#,
    )
    .execute(&self.pool)
    .await?;

    let fts_exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='chunks_fts'")
      .fetch_one(&self.pool)
      .await?;
    if !fts_exists {
      sqlx::query(
        r#"
        CREATE VIRTUAL TABLE chunks_fts USING fts5(
            chunk_id UNINDEXED,
            document_id UNINDEXED,
            container_id UNINDEXED,
            content
        )
        "#,
      )
      .execute(&self.pool)
      .await?;
    }

    sqlx::query(
      r#"
      CREATE TABLE IF NOT EXISTS chunk_vectors (
          chunk_id TEXT PRIMARY KEY,
          document_id TEXT NOT NULL,
          container_id TEXT NOT NULL,
          embedding BLOB NOT NULL,
          model_id TEXT NOT NULL,
          FOREIGN KEY (chunk_id) REFERENCES chunks(id)
      )
      "#,
    )
    .execute(&self.pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_container_id ON documents(container_id)")
      .execute(&self.pool)
      .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)")
      .execute(&self.pool)
      .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunk_vectors_container_id ON chunk_vectors(container_id)")
      .execute(&self.pool)
      .await?;

    Ok(())
  }
}

fn to_ts(dt: DateTime<Utc>) -> i64 {
  dt.timestamp()
}

fn from_ts(ts: i64) -> DateTime<Utc> {
  DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
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

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document, StoreError> {
  let metadata_json: String = row.get("metadata_json");
  let metadata: HashMap<String, String> = serde_json::from_str(&metadata_json)?;
  let last_indexed_at: Option<i64> = row.get("last_indexed_at");

  Ok(Document {
    id: row.get::<String, _>("id").parse().unwrap_or_default(),
    container_id: row.get::<String, _>("container_id").parse().unwrap_or_default(),
    file_name: row.get("file_name"),
    content_type: row.get("content_type"),
    path: row.get("path"),
    content_hash: row.get("content_hash"),
    size_bytes: row.get::<i64, _>("size_bytes") as u64,
    chunk_count: row.get::<i64, _>("chunk_count") as u32,
    status: status_from_str(&row.get::<String, _>("status")),
    error_message: row.get("error_message"),
    created_at: from_ts(row.get("created_at")),
    last_indexed_at: last_indexed_at.map(from_ts),
    metadata,
  })
}

#[async_trait]
impl Store for SqliteStore {
  async fn upsert_container(&self, container: &Container) -> Result<(), StoreError> {
    sqlx::query(
      r#"
      INSERT INTO containers (id, name, description, created_at, updated_at)
      VALUES (?, ?, ?, ?, ?)
      ON CONFLICT(id) DO UPDATE SET
          name = excluded.name,
          description = excluded.description,
          updated_at = excluded.updated_at
      "#,
    )
    .bind(container.id.to_string())
    .bind(&container.name)
    .bind(&container.description)
    .bind(to_ts(container.created_at))
    .bind(to_ts(container.updated_at))
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn get_container(&self, id: Uuid) -> Result<Option<Container>, StoreError> {
    let row = sqlx::query("SELECT id, name, description, created_at, updated_at FROM containers WHERE id = ?")
      .bind(id.to_string())
      .fetch_optional(&self.pool)
      .await?;

    Ok(row.map(|r| Container {
      id,
      name: r.get("name"),
      description: r.get("description"),
      created_at: from_ts(r.get("created_at")),
      updated_at: from_ts(r.get("updated_at")),
    }))
  }

  async fn get_container_by_name(&self, name: &str) -> Result<Option<Container>, StoreError> {
    let row = sqlx::query("SELECT id, name, description, created_at, updated_at FROM containers WHERE name = ? COLLATE NOCASE")
      .bind(name)
      .fetch_optional(&self.pool)
      .await?;

    Ok(match row {
      Some(r) => Some(Container {
        id: r.get::<String, _>("id").parse().unwrap_or_default(),
        name: r.get("name"),
        description: r.get("description"),
        created_at: from_ts(r.get("created_at")),
        updated_at: from_ts(r.get("updated_at")),
      }),
      None => None,
    })
  }

  async fn list_containers(&self) -> Result<Vec<Container>, StoreError> {
    let rows = sqlx::query("SELECT id, name, description, created_at, updated_at FROM containers ORDER BY name ASC")
      .fetch_all(&self.pool)
      .await?;

    Ok(
      rows
        .iter()
        .map(|r| Container {
          id: r.get::<String, _>("id").parse().unwrap_or_default(),
          name: r.get("name"),
          description: r.get("description"),
          created_at: from_ts(r.get("created_at")),
          updated_at: from_ts(r.get("updated_at")),
        })
        .collect(),
    )
  }

  async fn container_has_contents(&self, id: Uuid) -> Result<bool, StoreError> {
    let id_str = id.to_string();
    let has_documents: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM documents WHERE container_id = ?")
      .bind(&id_str)
      .fetch_one(&self.pool)
      .await?;
    if has_documents {
      return Ok(true);
    }
    let has_non_root_folders: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM folders WHERE container_id = ? AND path != '/'")
      .bind(&id_str)
      .fetch_one(&self.pool)
      .await?;
    Ok(has_non_root_folders)
  }

  async fn delete_container(&self, id: Uuid) -> Result<(), StoreError> {
    let id_str = id.to_string();
    let mut tx = self.pool.begin().await?;

    sqlx::query("DELETE FROM chunk_vectors WHERE container_id = ?").bind(&id_str).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM chunks_fts WHERE container_id = ?").bind(&id_str).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM chunks WHERE container_id = ?").bind(&id_str).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM documents WHERE container_id = ?").bind(&id_str).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM folders WHERE container_id = ?").bind(&id_str).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM containers WHERE id = ?").bind(&id_str).execute(&mut *tx).await?;

    tx.commit().await?;
    Ok(())
  }

  async fn upsert_folder(&self, folder: &Folder) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO folders (container_id, path) VALUES (?, ?) ON CONFLICT(container_id, path) DO NOTHING")
      .bind(folder.container_id.to_string())
      .bind(&folder.path)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn list_folders(&self, container_id: Uuid) -> Result<Vec<Folder>, StoreError> {
    let rows = sqlx::query("SELECT container_id, path FROM folders WHERE container_id = ? ORDER BY path ASC")
      .bind(container_id.to_string())
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
    let container_id_str = container_id.to_string();
    let like_pattern = format!("{path_prefix}%");
    let mut tx = self.pool.begin().await?;

    let document_ids: Vec<String> = sqlx::query_scalar("SELECT id FROM documents WHERE container_id = ? AND path LIKE ?")
      .bind(&container_id_str)
      .bind(&like_pattern)
      .fetch_all(&mut *tx)
      .await?;

    for document_id in &document_ids {
      sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?").bind(document_id).execute(&mut *tx).await?;
      sqlx::query("DELETE FROM chunks_fts WHERE document_id = ?").bind(document_id).execute(&mut *tx).await?;
      sqlx::query("DELETE FROM chunks WHERE document_id = ?").bind(document_id).execute(&mut *tx).await?;
      sqlx::query("DELETE FROM documents WHERE id = ?").bind(document_id).execute(&mut *tx).await?;
    }

    sqlx::query("DELETE FROM folders WHERE container_id = ? AND path LIKE ?")
      .bind(&container_id_str)
      .bind(&like_pattern)
      .execute(&mut *tx)
      .await?;

    tx.commit().await?;
    Ok(())
  }

  async fn upsert_document(&self, document: &Document) -> Result<(), StoreError> {
    let metadata_json = serde_json::to_string(&document.metadata)?;

    sqlx::query(
      r#"
      INSERT INTO documents (id, container_id, file_name, content_type, path, content_hash,
                              size_bytes, chunk_count, status, error_message, created_at,
                              last_indexed_at, metadata_json)
      VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
          metadata_json = excluded.metadata_json
      "#,
    )
    .bind(document.id.to_string())
    .bind(document.container_id.to_string())
    .bind(&document.file_name)
    .bind(&document.content_type)
    .bind(&document.path)
    .bind(&document.content_hash)
    .bind(document.size_bytes as i64)
    .bind(document.chunk_count as i64)
    .bind(status_to_str(document.status))
    .bind(&document.error_message)
    .bind(to_ts(document.created_at))
    .bind(document.last_indexed_at.map(to_ts))
    .bind(metadata_json)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn get_document(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
    let row = sqlx::query(
      r#"SELECT id, container_id, file_name, content_type, path, content_hash, size_bytes,
                chunk_count, status, error_message, created_at, last_indexed_at, metadata_json
         FROM documents WHERE id = ?"#,
    )
    .bind(id.to_string())
    .fetch_optional(&self.pool)
    .await?;

    row.as_ref().map(row_to_document).transpose()
  }

  async fn get_document_by_path(&self, container_id: Uuid, path: &str, file_name: &str) -> Result<Option<Document>, StoreError> {
    let row = sqlx::query(
      r#"SELECT id, container_id, file_name, content_type, path, content_hash, size_bytes,
                chunk_count, status, error_message, created_at, last_indexed_at, metadata_json
         FROM documents WHERE container_id = ? AND path = ? AND file_name = ?"#,
    )
    .bind(container_id.to_string())
    .bind(path)
    .bind(file_name)
    .fetch_optional(&self.pool)
    .await?;

    row.as_ref().map(row_to_document).transpose()
  }

  async fn list_documents(&self, container_id: Uuid) -> Result<Vec<Document>, StoreError> {
    let rows = sqlx::query(
      r#"SELECT id, container_id, file_name, content_type, path, content_hash, size_bytes,
                chunk_count, status, error_message, created_at, last_indexed_at, metadata_json
         FROM documents WHERE container_id = ? ORDER BY path ASC, file_name ASC"#,
    )
    .bind(container_id.to_string())
    .fetch_all(&self.pool)
    .await?;

    rows.iter().map(row_to_document).collect()
  }

  async fn delete_document(&self, id: Uuid) -> Result<(), StoreError> {
    let id_str = id.to_string();
    let mut tx = self.pool.begin().await?;

    sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?").bind(&id_str).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM chunks_fts WHERE document_id = ?").bind(&id_str).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM chunks WHERE document_id = ?").bind(&id_str).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM documents WHERE id = ?").bind(&id_str).execute(&mut *tx).await?;

    tx.commit().await?;
    Ok(())
  }

  async fn replace_chunks(&self, document_id: Uuid, chunks: &[Chunk], vectors: &[ChunkVector]) -> Result<(), StoreError> {
    let doc_id = document_id.to_string();
    let mut tx = self.pool.begin().await?;

    sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?").bind(&doc_id).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM chunks_fts WHERE document_id = ?").bind(&doc_id).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM chunks WHERE document_id = ?").bind(&doc_id).execute(&mut *tx).await?;

    for chunk in chunks {
      let metadata_json = serde_json::to_string(&chunk.metadata)?;
      sqlx::query(
        r#"
        INSERT INTO chunks (id, document_id, container_id, content, chunk_index, token_count,
                             start_offset, end_offset, metadata_json)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
      )
      .bind(chunk.id.to_string())
      .bind(chunk.document_id.to_string())
      .bind(chunk.container_id.to_string())
      .bind(&chunk.content)
      .bind(chunk.chunk_index as i64)
      .bind(chunk.token_count as i64)
      .bind(chunk.start_offset as i64)
      .bind(chunk.end_offset as i64)
      .bind(metadata_json)
      .execute(&mut *tx)
      .await?;

      sqlx::query("INSERT INTO chunks_fts (chunk_id, document_id, container_id, content) VALUES (?, ?, ?, ?)")
        .bind(chunk.id.to_string())
        .bind(chunk.document_id.to_string())
        .bind(chunk.container_id.to_string())
        .bind(&chunk.content)
        .execute(&mut *tx)
        .await?;
    }

    for vector in vectors {
      let blob = vec_to_blob(&vector.embedding);
      sqlx::query(
        r#"
        INSERT INTO chunk_vectors (chunk_id, document_id, container_id, embedding, model_id)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(chunk_id) DO UPDATE SET
            embedding = excluded.embedding,
            model_id = excluded.model_id
        "#,
      )
      .bind(vector.chunk_id.to_string())
      .bind(vector.document_id.to_string())
      .bind(vector.container_id.to_string())
      .bind(&blob)
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
      SELECT c.id, c.document_id, c.content, c.chunk_index, d.file_name, d.content_type, chunks_fts.rank AS rank
      FROM chunks_fts
      JOIN chunks c ON c.id = chunks_fts.chunk_id
      JOIN documents d ON d.id = c.document_id
      WHERE chunks_fts.container_id = ? AND chunks_fts MATCH ?
          AND (? IS NULL OR c.document_id = ?)
          AND (? IS NULL OR d.path LIKE ?)
      ORDER BY rank
      LIMIT ?
      "#,
    )
    .bind(container_id.to_string())
    .bind(query)
    .bind(filters.document_id.map(|id| id.to_string()))
    .bind(filters.document_id.map(|id| id.to_string()))
    .bind(&filters.path_prefix)
    .bind(filters.path_prefix.as_ref().map(|p| format!("{p}%")))
    .bind(limit as i64)
    .fetch_all(&self.pool)
    .await?;

    Ok(
      rows
        .iter()
        .map(|row| {
          let rank: f64 = row.get("rank");
          ChunkCandidate {
            chunk_id: row.get::<String, _>("id").parse().unwrap_or_default(),
            document_id: row.get::<String, _>("document_id").parse().unwrap_or_default(),
            file_name: row.get("file_name"),
            content_type: row.get("content_type"),
            content: row.get("content"),
            chunk_index: row.get::<i64, _>("chunk_index") as u32,
            raw_score: -rank,
          }
        })
        .collect(),
    )
  }

  async fn vector_search(&self, container_id: Uuid, query_vector: &[f32], limit: usize, filters: &SearchFilters) -> Result<Vec<ChunkCandidate>, StoreError> {
    let rows = sqlx::query(
      r#"
      SELECT cv.chunk_id, cv.document_id, cv.embedding, c.content, c.chunk_index, d.file_name, d.content_type
      FROM chunk_vectors cv
      JOIN chunks c ON c.id = cv.chunk_id
      JOIN documents d ON d.id = cv.document_id
      WHERE cv.container_id = ?
          AND (? IS NULL OR cv.document_id = ?)
          AND (? IS NULL OR d.path LIKE ?)
      "#,
    )
    .bind(container_id.to_string())
    .bind(filters.document_id.map(|id| id.to_string()))
    .bind(filters.document_id.map(|id| id.to_string()))
    .bind(&filters.path_prefix)
    .bind(filters.path_prefix.as_ref().map(|p| format!("{p}%")))
    .fetch_all(&self.pool)
    .await?;

    let mut candidates: Vec<ChunkCandidate> = rows
      .iter()
      .map(|row| {
        let blob: Vec<u8> = row.get("embedding");
        let embedding = blob_to_vec(&blob);
        let similarity = cosine_similarity(query_vector, &embedding) as f64;
        ChunkCandidate {
          chunk_id: row.get::<String, _>("chunk_id").parse().unwrap_or_default(),
          document_id: row.get::<String, _>("document_id").parse().unwrap_or_default(),
          file_name: row.get("file_name"),
          content_type: row.get("content_type"),
          content: row.get("content"),
          chunk_index: row.get::<i64, _>("chunk_index") as u32,
          raw_score: similarity,
        }
      })
      .collect();

    candidates.sort_by(|a, b| b.raw_score.partial_cmp(&a.raw_score).unwrap_or(std::cmp::Ordering::Equal));
    candidates.truncate(limit);

    Ok(candidates)
  }
}

#[cfg(test)]
mod tests {
  use contextd_core::{DocumentStatus, content_hash};

  use super::*;

  async fn memory_store() -> SqliteStore {
    let pool = SqlitePool::connect("sqlite::memory:").await.expect("connect");
    let store = SqliteStore::new(pool);
    store.migrate().await.expect("migrate");
    store
  }

  fn sample_container() -> Container {
    let now = Utc::now();
    Container {
      id: Uuid::new_v4(),
      name: "acme-reports".to_string(),
      description: None,
      created_at: now,
      updated_at: now,
    }
  }

  #[tokio::test]
  async fn container_round_trips() {
    let store = memory_store().await;
    let container = sample_container();
    store.upsert_container(&container).await.expect("upsert");

    let fetched = store.get_container_by_name("acme-reports").await.expect("get").expect("present");
    assert_eq!(fetched.id, container.id);
  }

  #[tokio::test]
  async fn document_upsert_then_delete_cascades_chunks() {
    let store = memory_store().await;
    let container = sample_container();
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
      created_at: Utc::now(),
      last_indexed_at: Some(Utc::now()),
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
  }

  #[tokio::test]
  async fn keyword_search_matches_fts_query() {
    let store = memory_store().await;
    let container = sample_container();
    store.upsert_container(&container).await.unwrap();

    let document = Document {
      id: Uuid::new_v4(),
      container_id: container.id,
      file_name: "notes.txt".to_string(),
      content_type: "text/plain".to_string(),
      path: "/".to_string(),
      content_hash: content_hash(b"quarterly revenue projections"),
      size_bytes: 30,
      chunk_count: 1,
      status: DocumentStatus::Ready,
      error_message: None,
      created_at: Utc::now(),
      last_indexed_at: None,
      metadata: HashMap::new(),
    };
    store.upsert_document(&document).await.unwrap();

    let chunk = Chunk {
      id: Uuid::new_v4(),
      document_id: document.id,
      container_id: container.id,
      content: "quarterly revenue projections".to_string(),
      chunk_index: 0,
      token_count: 3,
      start_offset: 0,
      end_offset: 30,
      metadata: HashMap::new(),
    };
    store.replace_chunks(document.id, &[chunk], &[]).await.unwrap();

    let results = store.keyword_search(container.id, "revenue", 5, &SearchFilters::default()).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].content.contains("revenue"));
  }

  #[tokio::test]
  async fn folder_delete_cascades_documents_under_prefix() {
    let store = memory_store().await;
    let container = sample_container();
    store.upsert_container(&container).await.unwrap();
    store
      .upsert_folder(&Folder {
        container_id: container.id,
        path: "/reports/".to_string(),
      })
      .await
      .unwrap();

    let document = Document {
      id: Uuid::new_v4(),
      container_id: container.id,
      file_name: "report.txt".to_string(),
      content_type: "text/plain".to_string(),
      path: "/reports/".to_string(),
      content_hash: content_hash(b"annual report data"),
      size_bytes: 19,
      chunk_count: 1,
      status: DocumentStatus::Ready,
      error_message: None,
      created_at: Utc::now(),
      last_indexed_at: Some(Utc::now()),
      metadata: HashMap::new(),
    };
    store.upsert_document(&document).await.unwrap();

    let chunk = Chunk {
      id: Uuid::new_v4(),
      document_id: document.id,
      container_id: container.id,
      content: "annual report data".to_string(),
      chunk_index: 0,
      token_count: 3,
      start_offset: 0,
      end_offset: 19,
      metadata: HashMap::new(),
    };
    store.replace_chunks(document.id, &[chunk], &[]).await.unwrap();

    store.delete_folder(container.id, "/reports/").await.unwrap();

    assert!(store.get_document(document.id).await.unwrap().is_none());
    let results = store.keyword_search(container.id, "annual", 5, &SearchFilters::default()).await.unwrap();
    assert!(results.is_empty());
  }

  #[tokio::test]
  async fn container_with_documents_reports_contents() {
    let store = memory_store().await;
    let container = sample_container();
    store.upsert_container(&container).await.unwrap();
    assert!(!store.container_has_contents(container.id).await.unwrap());

    let document = Document {
      id: Uuid::new_v4(),
      container_id: container.id,
      file_name: "report.txt".to_string(),
      content_type: "text/plain".to_string(),
      path: "/".to_string(),
      content_hash: content_hash(b"x"),
      size_bytes: 1,
      chunk_count: 0,
      status: DocumentStatus::Ready,
      error_message: None,
      created_at: Utc::now(),
      last_indexed_at: None,
      metadata: HashMap::new(),
    };
    store.upsert_document(&document).await.unwrap();
    assert!(store.container_has_contents(container.id).await.unwrap());
  }
}
