//! Text generation providers used for answers, summaries, and translations.
//!
//! Prompts are assembled by the processing layer; providers only move them over the wire and
//! return the raw model text together with token usage when the provider reports it.

mod ollama;
mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, GenerationProvider};

pub use ollama::OllamaGenerationClient;
pub use openai::OpenAiGenerationClient;

/// Errors surfaced while calling a generation provider.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider was not configured or could not be reached.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate text: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// A single prompt submission.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Fully assembled prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
}

impl CompletionRequest {
    /// Request with temperature zero, used by every pipeline operation.
    pub fn deterministic(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: 0.0,
        }
    }
}

/// Token counts reported by the provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u64,
    /// Tokens produced by the model.
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Sum of prompt and completion tokens.
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// Model output for one request.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated text, untrimmed.
    pub text: String,
    /// Usage, when the provider reports it.
    pub usage: Option<TokenUsage>,
}

/// Interface implemented by text generation providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Submit a prompt and return the generated text.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<Completion, GenerationClientError>;
}

/// Build the generation client selected by `config`.
pub fn generation_client_for(
    config: &Config,
) -> Result<Arc<dyn GenerationClient>, GenerationClientError> {
    let client: Arc<dyn GenerationClient> = match config.generation_provider {
        GenerationProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                GenerationClientError::ProviderUnavailable("OPENAI_API_KEY is not set".into())
            })?;
            Arc::new(OpenAiGenerationClient::new(&config.openai_base_url, api_key)?)
        }
        GenerationProvider::Ollama => Arc::new(OllamaGenerationClient::new(&config.ollama_url)?),
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_accumulates() {
        let mut usage = TokenUsage::default();
        usage += TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 4,
        };
        usage += TokenUsage {
            prompt_tokens: 3,
            completion_tokens: 1,
        };
        assert_eq!(usage.total(), 18);
    }

    #[test]
    fn ollama_provider_needs_no_key() {
        let config = Config {
            generation_provider: GenerationProvider::Ollama,
            ..Config::default()
        };
        assert!(generation_client_for(&config).is_ok());
        assert!(generation_client_for(&Config::default()).is_err());
    }
}
