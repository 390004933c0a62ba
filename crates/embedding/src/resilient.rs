//! Retrying decorator around an [`Embedder`]: exponential backoff with
//! jitter, plus binary-split-and-retry isolation for batches so one bad
//! input doesn't fail an entire batch outright.

use std::time::Duration;

use crate::{Embedder, EmbeddingError, EmbeddingMode};

#[derive(Debug, Clone)]
pub struct RetryConfig {
  pub max_retries: u32,
  pub initial_backoff: Duration,
  pub max_backoff: Duration,
  pub backoff_multiplier: f64,
  pub add_jitter: bool,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: 3,
      initial_backoff: Duration::from_secs(1),
      max_backoff: Duration::from_secs(30),
      backoff_multiplier: 2.0,
      add_jitter: true,
    }
  }
}

impl RetryConfig {
  /// More patient defaults for cloud providers with stricter rate limits.
  pub fn for_cloud() -> Self {
    Self {
      max_retries: 5,
      initial_backoff: Duration::from_secs(1),
      max_backoff: Duration::from_secs(60),
      backoff_multiplier: 2.0,
      add_jitter: true,
    }
  }

  fn backoff_for_attempt(&self, attempt: u32) -> Duration {
    let base = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(self.max_backoff.as_secs_f64());
    let jittered = if self.add_jitter {
      capped * (1.0 + rand::random::<f64>() * 0.25)
    } else {
      capped
    };
    Duration::from_secs_f64(jittered)
  }
}

fn is_retryable(err: &EmbeddingError) -> bool {
  match err {
    EmbeddingError::Network(_) | EmbeddingError::Timeout => true,
    EmbeddingError::ProviderError(msg) => ["429", "502", "503", "504"].iter().any(|code| msg.contains(code)),
    EmbeddingError::Request(_) | EmbeddingError::EmptyInput => false,
  }
}

/// Wraps any [`Embedder`] with retry-with-backoff and batch split isolation.
pub struct ResilientEmbedder<E> {
  inner: E,
  config: RetryConfig,
}

impl<E: Embedder> ResilientEmbedder<E> {
  pub fn new(inner: E) -> Self {
    Self { inner, config: RetryConfig::default() }
  }

  pub fn with_config(inner: E, config: RetryConfig) -> Self {
    Self { inner, config }
  }

  async fn embed_with_retry(&self, text: &str, mode: EmbeddingMode) -> Result<Vec<f32>, EmbeddingError> {
    let mut attempt = 0;
    loop {
      match self.inner.embed(text, mode).await {
        Ok(v) => return Ok(v),
        Err(err) if attempt < self.config.max_retries && is_retryable(&err) => {
          let backoff = self.config.backoff_for_attempt(attempt);
          tracing::warn!(attempt, ?backoff, error = %err, "retrying embed after transient failure");
          tokio::time::sleep(backoff).await;
          attempt += 1;
        }
        Err(err) => return Err(err),
      }
    }
  }

  /// Split `texts` in half and embed each half independently; isolates a
  /// single malformed input from failing the whole batch.
  fn embed_batch_with_retry<'a>(
    &'a self,
    texts: &'a [&str],
    mode: EmbeddingMode,
  ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<Vec<f32>>, EmbeddingError>> + Send + 'a>> {
    Box::pin(async move {
      let mut attempt = 0;
      loop {
        match self.inner.embed_batch(texts, mode).await {
          Ok(v) => return Ok(v),
          Err(err) if attempt < self.config.max_retries && is_retryable(&err) => {
            let backoff = self.config.backoff_for_attempt(attempt);
            tracing::warn!(attempt, ?backoff, error = %err, batch_size = texts.len(), "retrying embed_batch after transient failure");
            tokio::time::sleep(backoff).await;
            attempt += 1;
          }
          Err(err) if texts.len() > 1 => {
            tracing::warn!(error = %err, batch_size = texts.len(), "embed_batch exhausted retries, splitting batch");
            let mid = texts.len() / 2;
            let (left, right) = texts.split_at(mid);
            let (left_res, right_res) = tokio::join!(self.embed_batch_with_retry(left, mode), self.embed_batch_with_retry(right, mode));
            let mut left_vecs = left_res?;
            left_vecs.extend(right_res?);
            return Ok(left_vecs);
          }
          Err(err) => return Err(err),
        }
      }
    })
  }
}

#[async_trait::async_trait]
impl<E: Embedder> Embedder for ResilientEmbedder<E> {
  fn model_id(&self) -> &str {
    self.inner.model_id()
  }

  fn dimensions(&self) -> usize {
    self.inner.dimensions()
  }

  async fn embed(&self, text: &str, mode: EmbeddingMode) -> Result<Vec<f32>, EmbeddingError> {
    self.embed_with_retry(text, mode).await
  }

  async fn embed_batch(&self, texts: &[&str], mode: EmbeddingMode) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if texts.is_empty() {
      return Err(EmbeddingError::EmptyInput);
    }
    self.embed_batch_with_retry(texts, mode).await
  }
}
