//! Prompt gateway: turns a free-text cultural question into a normalized
//! `{ text, items }` payload using the configured language model.
//!
//! Model output is treated as untrusted text. A reply is first parsed whole as a
//! JSON object, then by extracting the span between the first `{` and the last
//! `}`, and finally kept verbatim as `text` with no items. Only a missing prompt
//! or a failed upstream call is reported as an error.

use crate::ai::{ChatService, CompletionRequest};
use crate::models::{CulturalItem, GatewayResponse};
use crate::prompts;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("No prompt provided")]
    BadRequest,

    #[error("AI generation failed.")]
    UpstreamFailure(#[source] crate::Error),
}

/// Outcome of reading a raw model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    /// The whole reply was a JSON object.
    Strict(Map<String, Value>),
    /// A JSON object was found inside surrounding prose or fencing.
    Embedded(Map<String, Value>),
    /// No object could be recovered; holds the reply verbatim.
    Unstructured(String),
}

impl ParsedReply {
    pub fn parse(raw: &str) -> Self {
        if let Some(object) = parse_object(raw) {
            return ParsedReply::Strict(object);
        }

        if let Some(object) = embedded_object_span(raw).and_then(parse_object) {
            return ParsedReply::Embedded(object);
        }

        ParsedReply::Unstructured(raw.to_string())
    }

    pub fn into_response(self) -> GatewayResponse {
        match self {
            ParsedReply::Strict(object) | ParsedReply::Embedded(object) => normalize(&object),
            ParsedReply::Unstructured(text) => GatewayResponse::text_only(text),
        }
    }
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Greedy span from the first `{` to the last `}`.
fn embedded_object_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Coerces a parsed reply object into the response contract.
///
/// Non-string `text` becomes `""`, non-array `items` becomes `[]`, and array
/// elements that are not valid cultural items are dropped. Applying this to an
/// already-normalized response yields the same response.
pub fn normalize(object: &Map<String, Value>) -> GatewayResponse {
    let text = match object.get("text") {
        Some(Value::String(text)) => text.clone(),
        _ => String::new(),
    };

    let items = match object.get("items") {
        Some(Value::Array(values)) => {
            let items: Vec<CulturalItem> = values
                .iter()
                .filter_map(|value| match serde_json::from_value(value.clone()) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        debug!("Dropping invalid cultural item {}: {}", value, e);
                        None
                    }
                })
                .collect();

            if items.len() < values.len() {
                warn!(
                    "Dropped {} of {} cultural items that did not match the schema",
                    values.len() - items.len(),
                    values.len()
                );
            }
            items
        }
        Some(other) => {
            debug!("Replacing non-array items value: {}", other);
            Vec::new()
        }
        None => Vec::new(),
    };

    GatewayResponse { text, items }
}

/// Parse and normalize a raw model reply. Never fails.
pub fn parse_model_reply(raw: &str) -> GatewayResponse {
    let parsed = ParsedReply::parse(raw);
    match &parsed {
        ParsedReply::Strict(_) => {}
        ParsedReply::Embedded(_) => debug!("Recovered JSON object embedded in model reply"),
        ParsedReply::Unstructured(_) => {
            warn!("Model reply was not JSON; returning it as plain text")
        }
    }
    parsed.into_response()
}

/// Stateless request handler shared by every connection.
pub struct PromptGateway {
    chat: Arc<dyn ChatService>,
    max_output_tokens: u32,
}

impl PromptGateway {
    pub fn new(chat: Arc<dyn ChatService>, max_output_tokens: u32) -> Self {
        Self {
            chat,
            max_output_tokens,
        }
    }

    pub fn chat(&self) -> &dyn ChatService {
        self.chat.as_ref()
    }

    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    /// Answer one cultural-discovery prompt.
    ///
    /// Blank or absent prompts are rejected before any upstream call. Exactly
    /// one completion request is made otherwise, with no retry.
    pub async fn handle_prompt_request(
        &self,
        prompt: Option<&str>,
    ) -> Result<GatewayResponse, GatewayError> {
        let prompt = match prompt.map(str::trim) {
            Some(prompt) if !prompt.is_empty() => prompt,
            _ => return Err(GatewayError::BadRequest),
        };

        info!(
            prompt_chars = prompt.chars().count(),
            provider = %self.chat.provider(),
            model = self.chat.model(),
            "Handling prompt request"
        );

        let request = CompletionRequest {
            system: prompts::CULTURAL_SYSTEM,
            prompt: prompt.to_string(),
            max_output_tokens: self.max_output_tokens,
        };

        let raw = self.chat.complete(&request).await.map_err(|e| {
            error!(error = ?e, "AI generation failed");
            GatewayError::UpstreamFailure(e)
        })?;

        let response = parse_model_reply(&raw);
        info!(items = response.items.len(), "Prompt request completed");

        Ok(response)
    }
}
