//! Layered configuration for the indexing/retrieval service.
//!
//! Resolution order: project-relative (`.contextd/config.toml`) > user
//! (`~/.config/contextd/config.toml`) > `#[serde(default)]` struct defaults.
//! Each category below corresponds to one of the live-mutable Settings
//! categories; a [`Config`] is the union of all of them plus daemon-level
//! concerns (logging) that sit outside the watchable snapshot.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
  #[default]
  Ollama,
  OpenRouter,
  Generic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
  pub provider: EmbeddingProvider,
  pub model: String,
  pub dimensions: usize,
  pub base_url: Option<String>,
  pub api_key: Option<String>,
  pub batch_size: usize,
  pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
  fn default() -> Self {
    Self {
      provider: EmbeddingProvider::Ollama,
      model: "nomic-embed-text".to_string(),
      dimensions: 768,
      base_url: None,
      api_key: None,
      batch_size: 64,
      timeout_seconds: 60,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum ChunkingStrategy {
  #[default]
  FixedSize,
  Recursive,
  Semantic,
  /// Accepted for forward compatibility; treated as an alias for `Recursive`.
  DocumentAware,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
  pub strategy: ChunkingStrategy,
  pub max_chunk_size: usize,
  pub overlap: usize,
  pub min_chunk_size: usize,
  pub semantic_threshold: f32,
  pub recursive_separators: Vec<String>,
  pub respect_document_structure: bool,
}

impl Default for ChunkingConfig {
  fn default() -> Self {
    Self {
      strategy: ChunkingStrategy::FixedSize,
      max_chunk_size: 512,
      overlap: 50,
      min_chunk_size: 10,
      semantic_threshold: 0.5,
      recursive_separators: vec!["\n\n".to_string(), "\n".to_string(), ". ".to_string(), " ".to_string()],
      respect_document_structure: false,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum SearchMode {
  Semantic,
  Keyword,
  #[default]
  Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum RerankerKind {
  #[default]
  None,
  Rrf,
  CrossEncoder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
  pub mode: SearchMode,
  pub top_k: usize,
  pub reranker: RerankerKind,
  pub rrf_k: u32,
  pub vector_weight: f32,
  pub minimum_score: f32,
  pub cross_encoder_model: Option<String>,
  /// Configuration surface only; not read by the core hybrid searcher (§9 open question).
  pub enable_query_expansion: bool,
  /// Configuration surface only; not read by the core hybrid searcher (§9 open question).
  pub include_web_search: bool,
}

impl Default for SearchConfig {
  fn default() -> Self {
    Self {
      mode: SearchMode::Hybrid,
      top_k: 10,
      reranker: RerankerKind::Rrf,
      rrf_k: 60,
      vector_weight: 0.5,
      minimum_score: 0.0,
      cross_encoder_model: None,
      enable_query_expansion: false,
      include_web_search: false,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
  pub max_file_size_mb: u64,
  pub allowed_extensions: Vec<String>,
  pub default_path: String,
  pub parallel_workers: usize,
  pub auto_start_ingestion: bool,
  pub batch_size: usize,
}

impl Default for UploadConfig {
  fn default() -> Self {
    Self {
      max_file_size_mb: 50,
      allowed_extensions: vec!["txt".into(), "md".into(), "pdf".into()],
      default_path: "/".to_string(),
      parallel_workers: 4,
      auto_start_ingestion: true,
      batch_size: 16,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MinioConfig {
  pub endpoint: String,
  pub access_key: String,
  pub secret_key: String,
  pub bucket_name: String,
  pub use_ssl: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AzureBlobConfig {
  pub connection_string: String,
  pub container_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreProvider {
  #[default]
  Postgres,
  Sqlite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileStorageProvider {
  #[default]
  Local,
  Minio,
  AzureBlob,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  pub vector_store_provider: VectorStoreProvider,
  pub document_store_provider: VectorStoreProvider,
  pub file_storage_provider: FileStorageProvider,
  pub minio: MinioConfig,
  pub local_storage_root_path: String,
  pub azure_blob: AzureBlobConfig,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      vector_store_provider: VectorStoreProvider::Postgres,
      document_store_provider: VectorStoreProvider::Postgres,
      file_storage_provider: FileStorageProvider::Local,
      minio: MinioConfig::default(),
      local_storage_root_path: "./data/blobs".to_string(),
      azure_blob: AzureBlobConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
  #[serde(default = "default_log_level")]
  pub log_level: String,
  #[serde(default = "default_log_rotation")]
  pub log_rotation: String,
  #[serde(default = "default_job_queue_capacity")]
  pub job_queue_capacity: usize,
  #[serde(default = "default_status_cleanup_secs")]
  pub status_cleanup_secs: u64,
}

fn default_log_level() -> String {
  "info".to_string()
}
fn default_log_rotation() -> String {
  "daily".to_string()
}
fn default_job_queue_capacity() -> usize {
  1000
}
fn default_status_cleanup_secs() -> u64 {
  300
}

impl Default for DaemonConfig {
  fn default() -> Self {
    Self {
      log_level: default_log_level(),
      log_rotation: default_log_rotation(),
      job_queue_capacity: default_job_queue_capacity(),
      status_cleanup_secs: default_status_cleanup_secs(),
    }
  }
}

/// Top-level configuration: the union of every watchable Settings category
/// plus ambient daemon configuration (logging, queue sizing).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
  pub embedding: EmbeddingConfig,
  pub chunking: ChunkingConfig,
  pub search: SearchConfig,
  pub upload: UploadConfig,
  pub storage: StorageConfig,
  pub daemon: DaemonConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse config file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

impl Config {
  /// Load config for a project, falling back to the user config, falling
  /// back to defaults. A missing file at either tier is not an error.
  pub fn load_for_project(project_path: &Path) -> Result<Self, ConfigError> {
    let project_config = project_path.join(".contextd").join("config.toml");
    if project_config.exists() {
      return Self::load_file(&project_config);
    }

    if let Some(user_config) = Self::user_config_path()
      && user_config.exists()
    {
      return Self::load_file(&user_config);
    }

    Ok(Self::default())
  }

  fn load_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("contextd").join("config.toml"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_round_trip_through_toml() {
    let config = Config::default();
    let serialized = toml::to_string(&config).expect("serialize");
    let parsed: Config = toml::from_str(&serialized).expect("parse");
    assert_eq!(parsed.embedding.dimensions, config.embedding.dimensions);
    assert_eq!(parsed.search.rrf_k, config.search.rrf_k);
  }

  #[test]
  fn partial_toml_falls_back_to_defaults() {
    let partial = "[search]\ntop_k = 25\n";
    let parsed: Config = toml::from_str(partial).expect("parse");
    assert_eq!(parsed.search.top_k, 25);
    assert_eq!(parsed.search.reranker, RerankerKind::Rrf);
    assert_eq!(parsed.embedding.dimensions, EmbeddingConfig::default().dimensions);
  }

  #[test]
  fn missing_project_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::load_for_project(dir.path()).expect("load");
    assert_eq!(config.upload.parallel_workers, UploadConfig::default().parallel_workers);
  }

  #[test]
  fn project_config_is_preferred_when_present() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join(".contextd")).unwrap();
    std::fs::write(dir.path().join(".contextd/config.toml"), "[upload]\nparallel_workers = 8\n").unwrap();
    let config = Config::load_for_project(dir.path()).expect("load");
    assert_eq!(config.upload.parallel_workers, 8);
  }
}
