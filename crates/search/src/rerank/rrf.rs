//! Reciprocal Rank Fusion: `score(c) = Σ_src 1 / (k + rank_src(c))`.

use std::collections::HashMap;

use uuid::Uuid;

use crate::rerank::{min_max_normalize, Reranker};
use crate::{Hit, METADATA_RERANKER, METADATA_SOURCE};

pub struct RrfReranker {
  pub k: u32,
}

impl RrfReranker {
  pub fn new(k: u32) -> Self {
    Self { k }
  }
}

#[async_trait::async_trait]
impl Reranker for RrfReranker {
  async fn rerank(&self, _query: &str, hits: Vec<Hit>) -> Vec<Hit> {
    fuse(hits, self.k)
  }
}

fn fuse(hits: Vec<Hit>, k: u32) -> Vec<Hit> {
  let mut by_source: HashMap<String, Vec<&Hit>> = HashMap::new();
  for hit in &hits {
    let source = hit.metadata.get(METADATA_SOURCE).cloned().unwrap_or_default();
    by_source.entry(source).or_default().push(hit);
  }

  if by_source.len() <= 1 {
    return hits;
  }

  let mut rrf_totals: HashMap<Uuid, f32> = HashMap::new();
  for ranked in by_source.values() {
    let mut ranked = ranked.clone();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    for (i, hit) in ranked.iter().enumerate() {
      let rank = (i + 1) as u32;
      *rrf_totals.entry(hit.chunk_id).or_insert(0.0) += 1.0 / (k + rank) as f32;
    }
  }

  let mut merged: HashMap<Uuid, Hit> = HashMap::new();
  for hit in hits {
    merged.entry(hit.chunk_id).or_insert(hit);
  }

  let mut chunk_ids: Vec<Uuid> = merged.keys().copied().collect();
  let mut scores: Vec<f32> = chunk_ids.iter().map(|id| *rrf_totals.get(id).unwrap_or(&0.0)).collect();
  min_max_normalize(&mut scores);

  let mut result: Vec<Hit> = chunk_ids
    .drain(..)
    .zip(scores)
    .map(|(id, score)| {
      let mut hit = merged.remove(&id).expect("chunk id present in merged map");
      hit.score = score;
      hit.metadata.insert("rrfScore".to_string(), score.to_string());
      hit.metadata.insert(METADATA_RERANKER.to_string(), "RRF".to_string());
      hit
    })
    .collect();

  result.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
  result
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap as Map;

  use super::*;

  fn hit(chunk_id: Uuid, score: f32, source: &str) -> Hit {
    let mut metadata = Map::new();
    metadata.insert(METADATA_SOURCE.to_string(), source.to_string());
    Hit {
      chunk_id,
      document_id: Uuid::new_v4(),
      content: "text".to_string(),
      score,
      metadata,
    }
  }

  #[tokio::test]
  async fn single_source_passes_through_unchanged() {
    let a = Uuid::new_v4();
    let hits = vec![hit(a, 0.9, "vector")];
    let reranker = RrfReranker::new(60);
    let result = reranker.rerank("q", hits.clone()).await;
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].chunk_id, hits[0].chunk_id);
  }

  #[tokio::test]
  async fn chunk_in_both_sources_ranks_first() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let c = Uuid::new_v4();
    let d = Uuid::new_v4();
    let e = Uuid::new_v4();

    let hits = vec![
      hit(a, 0.9, "vector"),
      hit(b, 0.8, "vector"),
      hit(c, 0.7, "vector"),
      hit(b, 0.95, "keyword"),
      hit(d, 0.85, "keyword"),
      hit(e, 0.75, "keyword"),
    ];

    let reranker = RrfReranker::new(60);
    let result = reranker.rerank("q", hits).await;
    assert_eq!(result[0].chunk_id, b);
  }
}
