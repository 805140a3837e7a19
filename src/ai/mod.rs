//! Language-model integration for cultural-discovery completions
//!
//! Provides a provider-neutral chat interface with OpenAI and Gemini
//! implementations plus a scriptable mock for tests.

pub mod gemini;
pub mod mock;
pub mod openai;

pub use gemini::GeminiChatClient;
pub use mock::MockChatClient;
pub use openai::OpenAiChatClient;

use crate::models::{AiProvider, Config};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A two-turn exchange: fixed system instruction plus the caller's prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: &'static str,
    pub prompt: String,
    pub max_output_tokens: u32,
}

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Returns the model's raw reply text, or `""` when the reply carried no content.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    fn provider(&self) -> AiProvider;

    fn model(&self) -> &str;
}

/// Build the chat client selected by `config.provider`.
pub fn build_chat_service(config: &Config, http_client: reqwest::Client) -> Box<dyn ChatService> {
    let api_key = config.api_key.clone();
    let model = config.chat_model.clone();
    let timeout = config.upstream_timeout;

    match config.provider {
        AiProvider::OpenAi => {
            let mut client =
                OpenAiChatClient::new_with_client(api_key, model, timeout, http_client);
            if let Some(base_url) = &config.base_url {
                client = client.with_base_url(base_url.clone());
            }
            Box::new(client)
        }
        AiProvider::Gemini => {
            let mut client =
                GeminiChatClient::new_with_client(api_key, model, timeout, http_client);
            if let Some(base_url) = &config.base_url {
                client = client.with_base_url(base_url.clone());
            }
            Box::new(client)
        }
    }
}

/// Send `body` as JSON on a prepared request and decode the provider's envelope.
///
/// `request` already carries the URL, auth header and timeout. Transport
/// failures surface as [`Error::Http`]; non-2xx statuses and undecodable bodies
/// as [`Error::AiProvider`].
pub(crate) async fn send_json<Req, Resp>(
    provider: AiProvider,
    request: reqwest::RequestBuilder,
    body: &Req,
) -> Result<Resp>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let label = provider.label();
    let response = request.json(body).send().await.map_err(|e| {
        tracing::error!("Failed to send request to {}: {}", label, e);
        e
    })?;

    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        tracing::error!("{} API error (status {}): {}", label, status, text);
        return Err(Error::AiProvider(format!(
            "{} API error (status {}): {}",
            label, status, text
        )));
    }

    serde_json::from_str(&text).map_err(|e| {
        tracing::error!("Failed to parse {} response: {}\nBody: {}", label, e, text);
        Error::AiProvider(format!("Failed to parse {} response: {}", label, e))
    })
}
