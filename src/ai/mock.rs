use super::{ChatService, CompletionRequest};
use crate::models::AiProvider;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Scriptable [`ChatService`] double that records every request it sees.
#[derive(Clone)]
pub struct MockChatClient {
    replies: Arc<Mutex<Vec<String>>>,
    failure: Option<String>,
    call_count: Arc<Mutex<usize>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(Vec::new())),
            failure: None,
            call_count: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a raw model reply. Replies are served in order and cycle.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push(reply.into());
        self
    }

    /// Make every call fail as if the provider were unreachable.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

impl Default for MockChatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatService for MockChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let count = {
            let mut count = self.call_count.lock().unwrap();
            *count += 1;
            *count
        };
        self.requests.lock().unwrap().push(request.clone());

        if let Some(message) = &self.failure {
            return Err(Error::AiProvider(message.clone()));
        }

        let replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            Ok(r#"{"text":"","items":[]}"#.to_string())
        } else {
            Ok(replies[(count - 1) % replies.len()].clone())
        }
    }

    fn provider(&self) -> AiProvider {
        AiProvider::OpenAi
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
