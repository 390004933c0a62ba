//! Fans a query out to vector and lexical search, tags hits by source,
//! reranks, and applies the score threshold after reranking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use contextd_core::{RerankerKind, SearchConfig, SearchMode, SettingsHandle};
use contextd_embedding::{Embedder, EmbeddingMode};
use contextd_llm::LlmProvider;
use contextd_store::{ChunkCandidate, Store};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::rerank::{CrossEncoderReranker, Reranker, RrfReranker};
use crate::{Hit, SearchError, SearchOptions, SearchResult, METADATA_SOURCE, SOURCE_KEYWORD, SOURCE_VECTOR};

pub struct HybridSearcher {
  store: Arc<dyn Store>,
  embedder: Arc<dyn Embedder>,
  /// The cross-encoder reranker's LLM backend. `None` means the
  /// cross-encoder reranker is unconfigured; a live `reranker = CrossEncoder`
  /// setting then falls back to the original ordering (§4.K).
  llm_provider: Option<Arc<dyn LlmProvider>>,
  config: Arc<SettingsHandle<SearchConfig>>,
}

impl HybridSearcher {
  pub fn new(store: Arc<dyn Store>, embedder: Arc<dyn Embedder>, llm_provider: Option<Arc<dyn LlmProvider>>, config: Arc<SettingsHandle<SearchConfig>>) -> Self {
    Self { store, embedder, llm_provider, config }
  }

  /// Picks the reranker named by the live `SearchConfig` snapshot. `None` or
  /// an unconfigured `CrossEncoder` both mean "keep the original ordering".
  fn reranker_for(&self, config: &SearchConfig) -> Option<Box<dyn Reranker>> {
    match config.reranker {
      RerankerKind::None => None,
      RerankerKind::Rrf => Some(Box::new(RrfReranker::new(config.rrf_k))),
      RerankerKind::CrossEncoder => match (&self.llm_provider, &config.cross_encoder_model) {
        (Some(provider), Some(model)) => Some(Box::new(CrossEncoderReranker::new(provider.clone(), model.clone()))),
        _ => None,
      },
    }
  }

  /// Snapshots the search config once, up front: a setting published while
  /// this search is in flight applies to the next search, not this one.
  pub async fn search(&self, container_id: Uuid, query: &str, options: SearchOptions) -> Result<SearchResult, SearchError> {
    let started = Instant::now();
    let config = self.config.snapshot();

    if query.trim().is_empty() {
      return Ok(SearchResult { hits: Vec::new(), total_matches: 0, duration: started.elapsed() });
    }

    let mode = options.mode.unwrap_or(config.mode);
    let top_k = options.top_k.unwrap_or(config.top_k);
    let min_score = options.min_score.unwrap_or(config.minimum_score);

    // In Hybrid mode both sub-queries run concurrently, awaited together,
    // per §5's "two parallel sub-queries awaited together".
    let (vector_hits, keyword_hits) = match mode {
      SearchMode::Semantic => (self.vector_search(container_id, query, top_k, &options).await, Ok(Vec::new())),
      SearchMode::Keyword => (Ok(Vec::new()), self.keyword_search(container_id, query, top_k, &options).await),
      SearchMode::Hybrid => tokio::join!(self.vector_search(container_id, query, top_k, &options), self.keyword_search(container_id, query, top_k, &options)),
    };

    // Neither half of a hybrid search should take the whole query down; a
    // failing source just contributes no hits.
    let mut hits = Vec::new();
    hits.extend(vector_hits.unwrap_or_default());
    hits.extend(keyword_hits.unwrap_or_default());

    let hits = match self.reranker_for(&config) {
      Some(reranker) => reranker.rerank(query, hits).await,
      None => {
        let mut hits = hits;
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits
      }
    };

    let mut hits: Vec<Hit> = hits.into_iter().filter(|h| h.score >= min_score).collect();
    hits.truncate(top_k);

    Ok(SearchResult {
      total_matches: hits.len(),
      hits,
      duration: started.elapsed(),
    })
  }

  /// Runs the same protocol as [`HybridSearcher::search`] but yields hits
  /// one at a time from the final ordered list, checking `cancel` before
  /// every yield. The list itself is materialized up front: only the
  /// delivery to the caller is incremental.
  pub async fn search_streaming(
    &self,
    container_id: Uuid,
    query: &str,
    options: SearchOptions,
    cancel: CancellationToken,
  ) -> Result<impl Stream<Item = Hit> + Send, SearchError> {
    let result = self.search(container_id, query, options).await?;
    Ok(futures::stream::iter(result.hits).take_while(move |_| {
      let cancel = cancel.clone();
      async move { !cancel.is_cancelled() }
    }))
  }

  async fn vector_search(&self, container_id: Uuid, query: &str, top_k: usize, options: &SearchOptions) -> Result<Vec<Hit>, SearchError> {
    let query_vector = self.embedder.embed(query, EmbeddingMode::Query).await?;
    let candidates = self.store.vector_search(container_id, &query_vector, top_k, &options.filters).await?;
    Ok(candidates.into_iter().map(|c| to_hit(c, container_id, SOURCE_VECTOR, |raw| raw as f32)).collect())
  }

  async fn keyword_search(&self, container_id: Uuid, query: &str, top_k: usize, options: &SearchOptions) -> Result<Vec<Hit>, SearchError> {
    let sanitized = sanitize_query(query);
    let mut candidates = self.store.keyword_search(container_id, &sanitized, top_k, &options.filters).await?;
    let mut scores: Vec<f32> = candidates.iter().map(|c| c.raw_score as f32).collect();
    crate::rerank::min_max_normalize(&mut scores);
    for (candidate, score) in candidates.iter_mut().zip(scores.iter()) {
      candidate.raw_score = *score as f64;
    }
    Ok(candidates.into_iter().map(|c| to_hit(c, container_id, SOURCE_KEYWORD, |raw| raw as f32)).collect())
  }
}

fn to_hit(candidate: ChunkCandidate, container_id: Uuid, source: &str, score_fn: impl Fn(f64) -> f32) -> Hit {
  let mut metadata = HashMap::new();
  metadata.insert(METADATA_SOURCE.to_string(), source.to_string());
  metadata.insert("documentId".to_string(), candidate.document_id.to_string());
  metadata.insert("containerId".to_string(), container_id.to_string());
  metadata.insert("fileName".to_string(), candidate.file_name.clone());
  metadata.insert("contentType".to_string(), candidate.content_type.clone());
  metadata.insert("content".to_string(), candidate.content.clone());
  metadata.insert("chunkIndex".to_string(), candidate.chunk_index.to_string());

  Hit {
    chunk_id: candidate.chunk_id,
    document_id: candidate.document_id,
    content: candidate.content,
    score: score_fn(candidate.raw_score),
    metadata,
  }
}

/// Keeps alphanumerics, whitespace, `-` and `_`; collapses runs of
/// whitespace. Mirrors what `plainto_tsquery` tolerates.
fn sanitize_query(query: &str) -> String {
  let filtered: String = query.chars().filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_').collect();
  filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}
