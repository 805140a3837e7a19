use super::client::OpenAiHttpClient;
use super::types::{ChatCompletionRequest, ChatMessage};
use crate::ai::{ChatService, CompletionRequest};
use crate::models::AiProvider;
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

pub struct OpenAiChatClient {
    http: OpenAiHttpClient,
    model: String,
}

impl OpenAiChatClient {
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
            http: OpenAiHttpClient::new_with_client(api_key, timeout, client),
            model,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }
}

#[async_trait]
impl ChatService for OpenAiChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(request.system),
                ChatMessage::user(&request.prompt),
            ],
            max_completion_tokens: request.max_output_tokens,
        };

        let response = self.http.chat_completion(&body).await?;

        let Some(choice) = response.choices.into_iter().next() else {
            tracing::warn!("OpenAI chat response contained no choices");
            return Ok(String::new());
        };

        if choice.finish_reason.as_deref() == Some("length") {
            tracing::warn!(
                "OpenAI reply truncated at {} output tokens",
                request.max_output_tokens
            );
        }

        Ok(choice.message.content.unwrap_or_default())
    }

    fn provider(&self) -> AiProvider {
        AiProvider::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_client(server: &MockServer, api_key: &str, model: &str) -> OpenAiChatClient {
        OpenAiChatClient::new(api_key.to_string(), model.to_string(), Duration::from_secs(5))
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

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "{\"text\":\"Try the Louvre\",\"items\":[]}"
                    },
                    "finish_reason": "stop"
                }]
            })))
            .mount(&server)
            .await;

        let client = make_client(&server, "test-key", "gpt-4.1");

        let reply = client.complete(&request("Museums in Paris")).await.unwrap();
        assert_eq!(reply, "{\"text\":\"Try the Louvre\",\"items\":[]}");
    }

    #[tokio::test]
    async fn test_complete_sends_two_turn_exchange_with_cap() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "custom-model",
                "max_completion_tokens": 700,
                "messages": [
                    { "role": "system", "content": "You are a museum guide." },
                    { "role": "user", "content": "Festivals in Sibiu" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": { "role": "assistant", "content": "ok" },
                    "finish_reason": "stop"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = make_client(&server, "key", "custom-model");

        client.complete(&request("Festivals in Sibiu")).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_content_yields_empty_reply() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": { "role": "assistant", "content": null },
                    "finish_reason": "content_filter"
                }]
            })))
            .mount(&server)
            .await;

        let client = make_client(&server, "key", "gpt-4.1");
        assert_eq!(client.complete(&request("x")).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_empty_choices_yields_empty_reply() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let client = make_client(&server, "key", "gpt-4.1");
        assert_eq!(client.complete(&request("x")).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_api_error_returns_ai_provider_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = make_client(&server, "key", "gpt-4.1");

        let err = client.complete(&request("x")).await.unwrap_err();
        assert!(matches!(err, Error::AiProvider(_)));
    }

    #[tokio::test]
    async fn test_unparsable_envelope_returns_ai_provider_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let client = make_client(&server, "key", "gpt-4.1");

        let err = client.complete(&request("x")).await.unwrap_err();
        assert!(matches!(err, Error::AiProvider(_)));
    }

    #[tokio::test]
    async fn test_timeout_returns_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let client = OpenAiChatClient::new(
            "key".to_string(),
            "gpt-4.1".to_string(),
            Duration::from_millis(50),
        )
        .with_base_url(server.uri());

        let err = client.complete(&request("x")).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
