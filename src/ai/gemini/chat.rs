use super::client::GeminiHttpClient;
use super::types::{Content, GenerateContentResponse};
use crate::ai::{ChatService, CompletionRequest};
use crate::models::AiProvider;
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatRequest {
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: Option<ChatGenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

pub struct GeminiChatClient {
    http: GeminiHttpClient,
}

impl GeminiChatClient {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        Self::new_with_client(api_key, model, timeout, reqwest::Client::new())
    }

    pub fn new_with_client(
        api_key: String,
        model: String,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(api_key, model, timeout, client),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    /// Joins the text parts of the first candidate; `None` when there are none.
    fn extract_text(response: GenerateContentResponse) -> Option<String> {
        let candidate = response.candidates.into_iter().next()?;
        if candidate.finish_reason.as_deref() == Some("MAX_TOKENS") {
            tracing::warn!("Gemini reply truncated by output token cap");
        }

        let texts: Vec<String> = candidate
            .content?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }
}

#[async_trait]
impl ChatService for GeminiChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            system_instruction: Some(Content::text(None, request.system)),
            contents: vec![Content::text(Some("user"), &request.prompt)],
            generation_config: Some(ChatGenerationConfig {
                max_output_tokens: Some(request.max_output_tokens),
            }),
        };

        let response: GenerateContentResponse = self.http.generate_content(&body).await?;

        Ok(Self::extract_text(response).unwrap_or_else(|| {
            tracing::warn!("Gemini chat response contained no text");
            String::new()
        }))
    }

    fn provider(&self) -> AiProvider {
        AiProvider::Gemini
    }

    fn model(&self) -> &str {
        self.http.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::gemini::test_support;
    use crate::Error;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DEFAULT_MODEL: &str = "gemini-2.5-flash";

    fn make_client(server: &MockServer, api_key: &str, model: &str) -> GeminiChatClient {
        GeminiChatClient::new(api_key.to_string(), model.to_string(), Duration::from_secs(5))
            .with_base_url(server.uri())
    }

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            system: "You are a museum guide.",
            prompt: prompt.to_string(),
            max_output_tokens: 700,
        }
    }

    #[tokio::test]
    async fn test_complete_parses_response() {
        let server = MockServer::start().await;

        test_support::post_path_regex(test_support::GENERATE_CONTENT_PATH_REGEX)
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [
                            { "text": "{\"text\":\"Visit the Peleș Castle\"," },
                            { "text": "\"items\":[]}" }
                        ]
                    },
                    "finishReason": "STOP"
                }]
            })))
            .mount(&server)
            .await;

        let client = make_client(&server, "test-key", DEFAULT_MODEL);

        let reply = client.complete(&request("Castles in Romania")).await.unwrap();
        assert_eq!(reply, "{\"text\":\"Visit the Peleș Castle\",\"items\":[]}");
    }

    #[tokio::test]
    async fn test_complete_sends_system_instruction_and_cap() {
        let server = MockServer::start().await;

        test_support::post_path_regex(test_support::GENERATE_CONTENT_PATH_REGEX)
            .and(body_partial_json(serde_json::json!({
                "system_instruction": { "parts": [{ "text": "You are a museum guide." }] },
                "contents": [{ "role": "user", "parts": [{ "text": "Jazz festivals" }] }],
                "generationConfig": { "maxOutputTokens": 700 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = make_client(&server, "key", DEFAULT_MODEL);
        client.complete(&request("Jazz festivals")).await.unwrap();
    }

    #[tokio::test]
    async fn test_api_error_returns_ai_provider_error() {
        let server = MockServer::start().await;

        test_support::post_path_regex(test_support::GENERATE_CONTENT_PATH_REGEX)
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = make_client(&server, "bad-key", DEFAULT_MODEL);

        let err = client.complete(&request("x")).await.unwrap_err();
        assert!(matches!(err, Error::AiProvider(_)));
    }

    #[tokio::test]
    async fn test_empty_candidates_yield_empty_reply() {
        let server = MockServer::start().await;

        test_support::post_path_regex(test_support::GENERATE_CONTENT_PATH_REGEX)
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": []
            })))
            .mount(&server)
            .await;

        let client = make_client(&server, "test-key", DEFAULT_MODEL);
        assert_eq!(client.complete(&request("x")).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_complete_strips_models_prefix_from_model_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = make_client(&server, "test-key", "models/gemini-2.5-flash");
        assert_eq!(client.model(), "gemini-2.5-flash");

        client.complete(&request("x")).await.unwrap();
    }

    #[tokio::test]
    async fn test_unparsable_envelope_returns_ai_provider_error() {
        let server = MockServer::start().await;

        test_support::post_path_regex(test_support::GENERATE_CONTENT_PATH_REGEX)
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
            .mount(&server)
            .await;

        let client = make_client(&server, "test-key", DEFAULT_MODEL);

        let err = client.complete(&request("x")).await.unwrap_err();
        assert!(matches!(err, Error::AiProvider(_)));
    }

    #[tokio::test]
    async fn test_timeout_returns_http_error() {
        let server = MockServer::start().await;

        test_support::post_path_regex(test_support::GENERATE_CONTENT_PATH_REGEX)
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(serde_json::json!({
                        "candidates": [{ "content": { "parts": [{ "text": "late" }] } }]
                    })),
            )
            .mount(&server)
            .await;

        let client = GeminiChatClient::new(
            "test-key".to_string(),
            DEFAULT_MODEL.to_string(),
            Duration::from_millis(50),
        )
        .with_base_url(server.uri());

        let err = client.complete(&request("x")).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
