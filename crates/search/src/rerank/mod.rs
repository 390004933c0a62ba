//! Rerankers take the fused, source-tagged hit list from the hybrid
//! searcher and return a reordered, rescored one.

pub mod cross_encoder;
pub mod rrf;

pub use cross_encoder::CrossEncoderReranker;
pub use rrf::RrfReranker;

use crate::Hit;

#[async_trait::async_trait]
pub trait Reranker: Send + Sync {
  async fn rerank(&self, query: &str, hits: Vec<Hit>) -> Vec<Hit>;
}

/// Min-max normalizes `scores` to `[0,1]` in place; if every score is
/// equal, assigns `1.0` to all rather than dividing by zero.
pub(crate) fn min_max_normalize(scores: &mut [f32]) {
  let Some(&min) = scores.iter().min_by(|a, b| a.partial_cmp(b).unwrap()) else { return };
  let Some(&max) = scores.iter().max_by(|a, b| a.partial_cmp(b).unwrap()) else { return };

  if (max - min).abs() < f32::EPSILON {
    scores.iter_mut().for_each(|s| *s = 1.0);
    return;
  }

  for score in scores.iter_mut() {
    *score = (*score - min) / (max - min);
  }
}
