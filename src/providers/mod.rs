//! Completion provider integrations
//!
//! A completion provider takes the ordered transcript plus sampling options
//! and returns one reply. Any hosted or local model endpoint that satisfies
//! [`CompletionProvider`] can back the tutor.

mod ollama;
mod openai_compat;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::conversation::Turn;

pub use ollama::OllamaProvider;
pub use openai_compat::{OpenAICompatConfig, OpenAICompatProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Fold reqwest's own timeout into [`ProviderError::Timeout`].
    pub(crate) fn from_request(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(timeout)
        } else {
            ProviderError::RequestFailed(err)
        }
    }
}

/// Sampling knobs sent with every completion request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    /// Upper bound on reply length
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 120,
            temperature: 0.3,
        }
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Produce the next assistant reply for `turns`.
    async fn complete(
        &self,
        turns: &[Turn],
        options: CompletionOptions,
    ) -> Result<String, ProviderError>;
}

/// Build the provider selected by `LLM_PROVIDER`.
pub fn from_config(config: &Config) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
    match config.provider.to_lowercase().as_str() {
        "openai" => {
            let provider = OpenAICompatProvider::new(OpenAICompatConfig {
                base_url: config.openai_base_url.clone(),
                api_key: config.openai_api_key.clone(),
                model: config.model.clone(),
                timeout: config.request_timeout,
            })?;
            Ok(Arc::new(provider))
        }
        "ollama" => {
            let provider = OllamaProvider::new(
                config.ollama_url.clone(),
                config.model.clone(),
                config.request_timeout,
            )?;
            Ok(Arc::new(provider))
        }
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}
