mod provider;

#[cfg(feature = "claude")]
mod claude;

pub use provider::{LlmProvider, Result};

/// Create the default LLM provider based on available features.
///
/// Returns the first available provider in priority order:
/// 1. Claude CLI (if the `claude` feature is enabled)
pub fn create_provider() -> Result<Box<dyn LlmProvider>> {
  #[cfg(feature = "claude")]
  {
    let provider = claude::ClaudeProvider::new();
    if provider.is_available() {
      return Ok(Box::new(provider));
    }
    Err(LlmError::ClaudeNotFound)
  }

  #[cfg(not(feature = "claude"))]
  {
    Err(LlmError::NoProviderAvailable)
  }
}

/// Request for LLM inference.
#[derive(Debug, Clone, Default)]
pub struct InferenceRequest {
  pub prompt: String,
  pub system_prompt: Option<String>,
  /// Model to use (default: provider's own default).
  pub model: String,
  pub timeout_secs: u64,
  /// JSON schema the provider should constrain its output to.
  pub json_schema: String,
}

impl InferenceRequest {
  pub fn new(prompt: impl Into<String>, json_schema: String) -> Self {
    Self {
      prompt: prompt.into(),
      system_prompt: None,
      model: Default::default(),
      timeout_secs: 60,
      json_schema,
    }
  }
}

/// Response from LLM inference.
#[derive(Debug, Clone)]
pub struct InferenceResponse {
  pub text: String,
  pub input_tokens: u32,
  pub output_tokens: u32,
  pub cost_usd: Option<f64>,
  pub duration_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
  #[error("failed to spawn process: {0}")]
  SpawnFailed(#[from] std::io::Error),
  #[error("process timed out after {0} seconds")]
  Timeout(u64),
  #[error("process exited with non-zero status: {0}")]
  ProcessFailed(i32),
  #[error("failed to parse JSON response: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("no assistant message in response")]
  NoResponse,
  #[error("no LLM provider available. Enable a provider feature (e.g., 'claude')")]
  NoProviderAvailable,
  #[cfg(feature = "claude")]
  #[error("claude executable not found. Ensure 'claude' is in your PATH")]
  ClaudeNotFound,
  #[cfg(feature = "claude")]
  #[error("claude returned an error: {0}")]
  ClaudeError(String),
}
