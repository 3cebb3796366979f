//! Ollama embeddings through `ollama-rs`.

use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest},
};
use reqwest::Url;

use super::{EmbeddingClient, EmbeddingClientError};

/// Sends batches to the Ollama `/api/embed` endpoint.
pub struct OllamaEmbeddingClient {
    ollama: Ollama,
    model: String,
}

impl OllamaEmbeddingClient {
    /// Create a client for the runtime at `base_url` (for example `http://127.0.0.1:11434`).
    pub fn new(base_url: &str, model: &str) -> Result<Self, EmbeddingClientError> {
        let url = Url::parse(base_url).map_err(|error| {
            EmbeddingClientError::ProviderUnavailable(format!(
                "invalid Ollama URL {base_url}: {error}"
            ))
        })?;
        let host = url.host_str().ok_or_else(|| {
            EmbeddingClientError::ProviderUnavailable(format!("Ollama URL {base_url} has no host"))
        })?;
        let port = url.port_or_known_default().unwrap_or(11434);
        let ollama = Ollama::new(format!("{}://{host}", url.scheme()), port);
        Ok(Self {
            ollama,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        let expected = texts.len();
        tracing::debug!(model = %self.model, count = expected, "Requesting Ollama embeddings");
        let request =
            GenerateEmbeddingsRequest::new(self.model.clone(), EmbeddingsInput::Multiple(texts));
        let response = self
            .ollama
            .generate_embeddings(request)
            .await
            .map_err(|error| EmbeddingClientError::GenerationFailed(error.to_string()))?;

        if response.embeddings.len() != expected {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected {expected} embeddings, received {}",
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    #[tokio::test]
    async fn parses_batch_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(json!({
                    "model": "nomic-embed-text",
                    "embeddings": [[0.1, 0.2], [0.3, 0.4]]
                }));
            })
            .await;

        let client = OllamaEmbeddingClient::new(&server.base_url(), "nomic-embed-text")
            .expect("client");
        let vectors = client
            .generate_embeddings(vec!["a".into(), "b".into()])
            .await
            .expect("vectors");

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[test]
    fn rejects_urls_without_host() {
        assert!(OllamaEmbeddingClient::new("not a url", "model").is_err());
    }
}
