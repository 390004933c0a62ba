//! Thin HTTP adapter implementing the Embedder contract: `POST {model,
//! prompt} -> {embedding}`, batched client-side.

use std::time::Duration;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::{Embedder, EmbeddingError, EmbeddingMode};

/// Instruction prefix applied to queries for instruction-following models.
/// Document-mode text is embedded as-is.
const QUERY_INSTRUCTION_PREFIX: &str = "Represent this sentence for searching relevant passages: ";

#[derive(Serialize)]
struct EmbedRequest<'a> {
  model: &'a str,
  prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
  embedding: Vec<f32>,
}

pub struct HttpEmbedder {
  client: reqwest::Client,
  base_url: String,
  model: String,
  dimensions: usize,
  batch_size: usize,
}

impl HttpEmbedder {
  pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: usize, batch_size: usize, timeout: Duration) -> Self {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .unwrap_or_else(|_| reqwest::Client::new());

    Self {
      client,
      base_url: base_url.into(),
      model: model.into(),
      dimensions,
      batch_size: batch_size.max(1),
    }
  }

  fn format_prompt<'a>(&self, text: &'a str, mode: EmbeddingMode) -> std::borrow::Cow<'a, str> {
    match mode {
      EmbeddingMode::Document => std::borrow::Cow::Borrowed(text),
      EmbeddingMode::Query => std::borrow::Cow::Owned(format!("{QUERY_INSTRUCTION_PREFIX}{text}")),
    }
  }

  fn check_dimensions(&self, embedding: &[f32]) {
    if embedding.len() != self.dimensions {
      tracing::warn!(
        expected = self.dimensions,
        actual = embedding.len(),
        model = %self.model,
        "embedding dimension mismatch"
      );
    }
  }
}

#[async_trait::async_trait]
impl Embedder for HttpEmbedder {
  fn model_id(&self) -> &str {
    &self.model
  }

  fn dimensions(&self) -> usize {
    self.dimensions
  }

  async fn embed(&self, text: &str, mode: EmbeddingMode) -> Result<Vec<f32>, EmbeddingError> {
    if text.is_empty() {
      return Err(EmbeddingError::EmptyInput);
    }

    let prompt = self.format_prompt(text, mode);
    let response = self
      .client
      .post(format!("{}/embeddings", self.base_url))
      .json(&EmbedRequest { model: &self.model, prompt: &prompt })
      .send()
      .await
      .map_err(map_transport_error)?;

    if !response.status().is_success() {
      return Err(EmbeddingError::ProviderError(format!("status {}", response.status())));
    }

    let body: EmbedResponse = response.json().await.map_err(map_transport_error)?;
    self.check_dimensions(&body.embedding);
    Ok(body.embedding)
  }

  async fn embed_batch(&self, texts: &[&str], mode: EmbeddingMode) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if texts.is_empty() {
      return Err(EmbeddingError::EmptyInput);
    }

    let mut out = Vec::with_capacity(texts.len());
    for group in texts.chunks(self.batch_size) {
      let futures = group.iter().map(|text| self.embed(text, mode));
      let results = try_join_all(futures).await?;
      out.extend(results);
    }
    Ok(out)
  }
}

fn map_transport_error(err: reqwest::Error) -> EmbeddingError {
  if err.is_timeout() {
    EmbeddingError::Timeout
  } else if err.is_connect() {
    EmbeddingError::Network(err.to_string())
  } else {
    EmbeddingError::Request(err)
  }
}
