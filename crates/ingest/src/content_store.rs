//! Byte-addressable blob storage keyed by a virtual, POSIX-like path.
//! Object-store backends (S3/MinIO/Azure Blob) are configuration surface
//! only; this crate ships a local-filesystem reference implementation.

use std::path::PathBuf;

use tokio::fs;
use tokio::io::AsyncReadExt;

#[derive(Debug, thiserror::Error)]
pub enum ContentStoreError {
  #[error("content not found at '{0}'")]
  NotFound(String),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("path '{0}' escapes the content store root")]
  InvalidPath(String),
}

#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
  async fn exists(&self, path: &str) -> Result<bool, ContentStoreError>;
  async fn open(&self, path: &str) -> Result<Vec<u8>, ContentStoreError>;
  async fn save(&self, path: &str, bytes: &[u8]) -> Result<(), ContentStoreError>;
  async fn delete(&self, path: &str) -> Result<(), ContentStoreError>;
}

/// Rooted under a configured directory; virtual paths are resolved
/// relative to that root and rejected if they would escape it via `..`.
pub struct LocalFsContentStore {
  root: PathBuf,
}

impl LocalFsContentStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn resolve(&self, path: &str) -> Result<PathBuf, ContentStoreError> {
    let relative = path.trim_start_matches('/');
    if relative.split('/').any(|segment| segment == "..") {
      return Err(ContentStoreError::InvalidPath(path.to_string()));
    }
    Ok(self.root.join(relative))
  }
}

#[async_trait::async_trait]
impl ContentStore for LocalFsContentStore {
  async fn exists(&self, path: &str) -> Result<bool, ContentStoreError> {
    let resolved = self.resolve(path)?;
    Ok(fs::metadata(&resolved).await.is_ok())
  }

  async fn open(&self, path: &str) -> Result<Vec<u8>, ContentStoreError> {
    let resolved = self.resolve(path)?;
    let mut file = fs::File::open(&resolved).await.map_err(|err| {
      if err.kind() == std::io::ErrorKind::NotFound {
        ContentStoreError::NotFound(path.to_string())
      } else {
        ContentStoreError::Io(err)
      }
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).await?;
    Ok(bytes)
  }

  async fn save(&self, path: &str, bytes: &[u8]) -> Result<(), ContentStoreError> {
    let resolved = self.resolve(path)?;
    if let Some(parent) = resolved.parent() {
      fs::create_dir_all(parent).await?;
    }
    fs::write(&resolved, bytes).await?;
    Ok(())
  }

  async fn delete(&self, path: &str) -> Result<(), ContentStoreError> {
    let resolved = self.resolve(path)?;
    match fs::remove_file(&resolved).await {
      Ok(()) => Ok(()),
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(err) => Err(ContentStoreError::Io(err)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn save_then_open_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalFsContentStore::new(dir.path());
    store.save("/reports/report.txt", b"annual report data").await.unwrap();

    assert!(store.exists("/reports/report.txt").await.unwrap());
    let bytes = store.open("/reports/report.txt").await.unwrap();
    assert_eq!(bytes, b"annual report data");
  }

  #[tokio::test]
  async fn open_missing_path_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalFsContentStore::new(dir.path());
    let err = store.open("/missing.txt").await.unwrap_err();
    assert!(matches!(err, ContentStoreError::NotFound(_)));
  }

  #[tokio::test]
  async fn delete_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalFsContentStore::new(dir.path());
    store.save("/a.txt", b"x").await.unwrap();
    store.delete("/a.txt").await.unwrap();
    store.delete("/a.txt").await.unwrap();
    assert!(!store.exists("/a.txt").await.unwrap());
  }

  #[tokio::test]
  async fn path_traversal_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalFsContentStore::new(dir.path());
    let err = store.save("/../escape.txt", b"x").await.unwrap_err();
    assert!(matches!(err, ContentStoreError::InvalidPath(_)));
  }
}
