//! Embedding adapters: the [`Embedder`] trait, a thin HTTP-backed
//! implementation, and a resilient retrying decorator.

mod http;
mod resilient;

pub use http::HttpEmbedder;
pub use resilient::{ResilientEmbedder, RetryConfig};

/// Whether text is being embedded for storage or for a query.
///
/// Instruction-following embedding models produce better retrieval results
/// when the query is prefixed with a task instruction while documents are
/// embedded as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingMode {
  #[default]
  Document,
  Query,
}

#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
  fn model_id(&self) -> &str;
  fn dimensions(&self) -> usize;

  async fn embed(&self, text: &str, mode: EmbeddingMode) -> Result<Vec<f32>, EmbeddingError>;

  /// Embed a batch of texts. MUST preserve input order in the output.
  async fn embed_batch(&self, texts: &[&str], mode: EmbeddingMode) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
  #[error("embedding request cannot be empty")]
  EmptyInput,
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("provider error: {0}")]
  ProviderError(String),
  #[error("network error: {0}")]
  Network(String),
  #[error("request timed out")]
  Timeout,
}
