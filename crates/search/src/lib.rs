//! The hybrid retrieval engine: fans a query out to vector and lexical
//! search, tags hits by source, reranks, and applies a score threshold.

mod hybrid;
pub mod rerank;

pub use hybrid::HybridSearcher;

use std::collections::HashMap;
use std::time::Duration;

use contextd_core::SearchFilters;
use contextd_store::StoreError;
use uuid::Uuid;

/// One retrieved chunk, carrying enough metadata to render a result and
/// enough provenance to explain how it was ranked.
#[derive(Debug, Clone)]
pub struct Hit {
  pub chunk_id: Uuid,
  pub document_id: Uuid,
  pub content: String,
  pub score: f32,
  pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
  pub hits: Vec<Hit>,
  pub total_matches: usize,
  pub duration: Duration,
}

/// Per-query overrides layered on top of the configured [`contextd_core::SearchConfig`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
  pub mode: Option<contextd_core::SearchMode>,
  pub top_k: Option<usize>,
  pub min_score: Option<f32>,
  pub filters: SearchFilters,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
  #[error("store error: {0}")]
  Store(#[from] StoreError),
  #[error("embedding error: {0}")]
  Embedding(#[from] contextd_embedding::EmbeddingError),
}

/// Source tag attached to every hit before reranking, so rerankers can
/// partition and later readers can explain provenance.
pub(crate) const METADATA_SOURCE: &str = "source";
pub(crate) const SOURCE_VECTOR: &str = "vector";
pub(crate) const SOURCE_KEYWORD: &str = "keyword";
pub(crate) const METADATA_RERANKER: &str = "reranker";
