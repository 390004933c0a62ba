//! Prompts an LLM to rate relevance of each hit's content to the query on
//! a 0-10 scale, then min-max normalizes those ratings into scores.

use contextd_llm::{InferenceRequest, LlmProvider};

use crate::rerank::{min_max_normalize, Reranker};
use crate::{Hit, METADATA_RERANKER};

const RELEVANCE_SCHEMA: &str = r#"{"type":"object","properties":{"score":{"type":"number"}},"required":["score"]}"#;

pub struct CrossEncoderReranker {
  provider: std::sync::Arc<dyn LlmProvider>,
  model: String,
}

impl CrossEncoderReranker {
  pub fn new(provider: std::sync::Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
    Self { provider, model: model.into() }
  }
}

#[async_trait::async_trait]
impl Reranker for CrossEncoderReranker {
  async fn rerank(&self, query: &str, hits: Vec<Hit>) -> Vec<Hit> {
    if hits.is_empty() {
      return hits;
    }

    let mut scored = Vec::with_capacity(hits.len());
    for hit in hits {
      let rating = self.rate(query, &hit.content).await;
      scored.push((hit, rating));
    }

    let mut scores: Vec<f32> = scored.iter().map(|(_, r)| *r).collect();
    min_max_normalize(&mut scores);

    let mut result: Vec<Hit> = scored
      .into_iter()
      .zip(scores)
      .map(|((mut hit, raw_rating), normalized)| {
        hit.score = normalized;
        hit.metadata.insert("crossEncoderScore".to_string(), raw_rating.to_string());
        hit.metadata.insert(METADATA_RERANKER.to_string(), "CrossEncoder".to_string());
        hit
      })
      .collect();

    result.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    result
  }
}

impl CrossEncoderReranker {
  /// Rates `content`'s relevance to `query` on 0-10, defaulting to 5.0 if
  /// the provider's response can't be parsed as a number.
  async fn rate(&self, query: &str, content: &str) -> f32 {
    let prompt = format!("Rate the relevance of the following passage to the query \"{query}\" on a scale of 0 to 10. Respond with only the number.\n\nPassage:\n{content}");
    let request = InferenceRequest {
      model: self.model.clone(),
      ..InferenceRequest::new(prompt, RELEVANCE_SCHEMA.to_string())
    };

    match self.provider.infer(request).await {
      Ok(response) => parse_first_number(&response.text).unwrap_or(5.0),
      Err(error) => {
        tracing::warn!(%error, "cross-encoder inference failed, defaulting to neutral score");
        5.0
      }
    }
  }
}

fn parse_first_number(text: &str) -> Option<f32> {
  let mut digits = String::new();
  let mut seen_digit = false;
  for c in text.chars() {
    if c.is_ascii_digit() || (c == '.' && !digits.contains('.')) {
      digits.push(c);
      seen_digit |= c.is_ascii_digit();
    } else if seen_digit {
      break;
    }
  }
  digits.parse().ok()
}
