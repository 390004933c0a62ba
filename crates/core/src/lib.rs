pub mod config;
pub mod hash;
pub mod model;
pub mod settings;
pub mod vector;

pub use config::{
  ChunkingConfig, ChunkingStrategy, Config, DaemonConfig, EmbeddingConfig, EmbeddingProvider, FileStorageProvider, RerankerKind, SearchConfig, SearchMode, StorageConfig, UploadConfig,
  VectorStoreProvider,
};
pub use hash::{CHARS_PER_TOKEN, content_hash, estimate_tokens};
pub use model::*;
pub use settings::SettingsHandle;
pub use vector::{blob_to_vec, cosine_distance, cosine_similarity, vec_to_blob};
