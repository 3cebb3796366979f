//! OpenAI-compatible completions client.
//!
//! Instruct models (`gpt-3.5-turbo-instruct`, `davinci-002`, `babbage-002`) only exist on the legacy
//! `/completions` endpoint; everything else goes through `/chat/completions` with the prompt as a
//! single user message.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{Completion, CompletionRequest, GenerationClient, GenerationClientError, TokenUsage};

/// Output cap for legacy completions, whose server default is only 16 tokens.
const LEGACY_MAX_TOKENS: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Completions,
    Chat,
}

impl Endpoint {
    fn for_model(model: &str) -> Self {
        let model = model.to_ascii_lowercase();
        if model.contains("instruct") || model.starts_with("davinci") || model.starts_with("babbage")
        {
            Self::Completions
        } else {
            Self::Chat
        }
    }

    fn path(self) -> &'static str {
        match self {
            Self::Completions => "completions",
            Self::Chat => "chat/completions",
        }
    }
}

/// Client for OpenAI and API-compatible servers.
pub struct OpenAiGenerationClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiGenerationClient {
    /// Create a client for `base_url` (for example `https://api.openai.com/v1`).
    pub fn new(base_url: &str, api_key: String) -> Result<Self, GenerationClientError> {
        let http = Client::builder()
            .user_agent("docusmart/generation")
            .build()
            .map_err(|error| GenerationClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }
}

fn request_body(endpoint: Endpoint, request: &CompletionRequest) -> Value {
    match endpoint {
        Endpoint::Completions => json!({
            "model": request.model,
            "prompt": request.prompt,
            "temperature": request.temperature,
            "max_tokens": LEGACY_MAX_TOKENS,
        }),
        Endpoint::Chat => json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.temperature,
        }),
    }
}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[async_trait]
impl GenerationClient for OpenAiGenerationClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<Completion, GenerationClientError> {
        let endpoint = Endpoint::for_model(&request.model);
        tracing::debug!(
            model = %request.model,
            endpoint = endpoint.path(),
            prompt_chars = request.prompt.len(),
            "Requesting completion"
        );

        let response = self
            .http
            .post(self.endpoint(endpoint))
            .bearer_auth(&self.api_key)
            .json(&request_body(endpoint, &request))
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "{} returned {status}: {body}",
                endpoint.path()
            )));
        }

        let body: CompletionsResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode completion response: {error}"
            ))
        })?;

        let choice = body.choices.into_iter().next().ok_or_else(|| {
            GenerationClientError::InvalidResponse("response contained no choices".into())
        })?;
        let text = match endpoint {
            Endpoint::Completions => choice.text,
            Endpoint::Chat => choice.message.and_then(|message| message.content),
        }
        .ok_or_else(|| GenerationClientError::InvalidResponse("choice carried no text".into()))?;

        Ok(Completion {
            text,
            usage: body.usage.map(|usage| TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn client(server: &MockServer) -> OpenAiGenerationClient {
        OpenAiGenerationClient::new(&server.base_url(), "sk-test".into()).expect("client")
    }

    #[test]
    fn instruct_models_use_legacy_endpoint() {
        assert_eq!(
            Endpoint::for_model("gpt-3.5-turbo-instruct"),
            Endpoint::Completions
        );
        assert_eq!(Endpoint::for_model("davinci-002"), Endpoint::Completions);
        assert_eq!(Endpoint::for_model("gpt-3.5-turbo"), Endpoint::Chat);
        assert_eq!(Endpoint::for_model("gpt-4o-mini"), Endpoint::Chat);
    }

    #[tokio::test]
    async fn legacy_completion_returns_text_and_usage() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(
                        r#"{"model":"gpt-3.5-turbo-instruct","temperature":0.0,"max_tokens":256}"#,
                    );
                then.status(200).json_body(json!({
                    "choices": [{ "text": " The answer is 42." }],
                    "usage": { "prompt_tokens": 12, "completion_tokens": 6, "total_tokens": 18 }
                }));
            })
            .await;

        let completion = client(&server)
            .complete(CompletionRequest::deterministic(
                "gpt-3.5-turbo-instruct",
                "Question?",
            ))
            .await
            .expect("completion");

        mock.assert_async().await;
        assert_eq!(completion.text, " The answer is 42.");
        assert_eq!(
            completion.usage,
            Some(TokenUsage {
                prompt_tokens: 12,
                completion_tokens: 6
            })
        );
    }

    #[tokio::test]
    async fn chat_completion_reads_message_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .json_body_partial(
                        r#"{"model":"gpt-3.5-turbo","messages":[{"role":"user","content":"Translate"}]}"#,
                    );
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "Bonjour" } }]
                }));
            })
            .await;

        let completion = client(&server)
            .complete(CompletionRequest::deterministic("gpt-3.5-turbo", "Translate"))
            .await
            .expect("completion");

        mock.assert_async().await;
        assert_eq!(completion.text, "Bonjour");
        assert_eq!(completion.usage, None);
    }

    #[tokio::test]
    async fn error_status_is_generation_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(429).body("rate limited");
            })
            .await;

        let error = client(&server)
            .complete(CompletionRequest::deterministic("gpt-4o-mini", "Hi"))
            .await
            .expect_err("error response");
        assert!(
            matches!(error, GenerationClientError::GenerationFailed(ref message) if message.contains("429"))
        );
    }
}
