//! Deterministic adapter that replays queued responses.
//!
//! Used in tests of the conversation loop and anywhere a network-free model is
//! handy. Every request is recorded so callers can assert on what was sent.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use toolchain_primitives::{ChatMessage, ToolCall};

use crate::traits::{
    AdapterError, AdapterMetadata, AdapterResult, ChatModel, ChatRequest, ChatResponse,
};

/// Chat model returning scripted responses in order.
#[derive(Debug)]
pub struct ScriptedAdapter {
    metadata: AdapterMetadata,
    script: Mutex<VecDeque<AdapterResult<ChatResponse>>>,
    fallback: Option<ChatResponse>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl Default for ScriptedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedAdapter {
    /// Creates an adapter with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: AdapterMetadata::new("scripted", "scripted-model"),
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queues a response.
    #[must_use]
    pub fn respond(self, response: ChatResponse) -> Self {
        self.lock_script().push_back(Ok(response));
        self
    }

    /// Queues a plain assistant text answer.
    #[must_use]
    pub fn respond_text(self, content: impl Into<String>) -> Self {
        self.respond(ChatResponse::new(ChatMessage::assistant(content)).with_finish_reason("stop"))
    }

    /// Queues an assistant message requesting the given tool calls.
    #[must_use]
    pub fn respond_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        self.respond(
            ChatResponse::new(ChatMessage::assistant_tool_calls(None, calls))
                .with_finish_reason("tool_calls"),
        )
    }

    /// Queues a transport failure.
    #[must_use]
    pub fn fail(self, error: AdapterError) -> Self {
        self.lock_script().push_back(Err(error));
        self
    }

    /// Response returned for every request once the script is exhausted.
    #[must_use]
    pub fn repeat(mut self, response: ChatResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Returns clones of every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.lock_requests().clone()
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.lock_requests().len()
    }

    fn lock_script(&self) -> MutexGuard<'_, VecDeque<AdapterResult<ChatResponse>>> {
        self.script.lock().expect("scripted adapter poisoned")
    }

    fn lock_requests(&self) -> MutexGuard<'_, Vec<ChatRequest>> {
        self.requests.lock().expect("scripted adapter poisoned")
    }
}

#[async_trait]
impl ChatModel for ScriptedAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn complete(&self, request: ChatRequest) -> AdapterResult<ChatResponse> {
        self.lock_requests().push(request);

        let next = self.lock_script().pop_front();
        match (next, &self.fallback) {
            (Some(result), _) => result,
            (None, Some(response)) => Ok(response.clone()),
            (None, None) => Err(AdapterError::response("scripted adapter has no responses left")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user("hi")]).unwrap()
    }

    #[tokio::test]
    async fn replays_in_order_then_errors() {
        let adapter = ScriptedAdapter::new()
            .respond_text("first")
            .fail(AdapterError::transport("offline"));

        let first = adapter.complete(request()).await.unwrap();
        assert_eq!(first.message().content(), Some("first"));

        let second = adapter.complete(request()).await.unwrap_err();
        assert!(matches!(second, AdapterError::Transport { .. }));

        let third = adapter.complete(request()).await.unwrap_err();
        assert!(matches!(third, AdapterError::Response { .. }));
        assert_eq!(adapter.request_count(), 3);
    }

    #[tokio::test]
    async fn repeat_serves_unbounded_requests() {
        let adapter = ScriptedAdapter::new()
            .repeat(ChatResponse::new(ChatMessage::assistant("again")));

        for _ in 0..3 {
            let response = adapter.complete(request()).await.unwrap();
            assert_eq!(response.message().content(), Some("again"));
        }
        assert_eq!(adapter.requests().len(), 3);
    }
}
