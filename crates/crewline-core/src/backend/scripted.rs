//! In-process backend that replays queued replies.
//!
//! Used by tests and by `crewline run --dry-run`, where every task is
//! answered with a canned reply instead of a network call.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{CompletionBackend, CompletionRequest, CompletionResponse};
use crate::error::BackendError;

/// A queued reply.
#[derive(Debug)]
pub enum ScriptedReply {
    Text(String),
    /// The backend returns no message body
    Empty,
    Fail(BackendError),
}

#[derive(Debug, Default)]
struct ScriptState {
    replies: VecDeque<ScriptedReply>,
    requests: Vec<CompletionRequest>,
}

/// Backend that answers from a queue and records every request it sees.
///
/// When the queue runs dry the fallback reply is used; without a fallback
/// the call fails with `BackendError::Unknown`.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    state: Mutex<ScriptState>,
    fallback: Option<String>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request with `reply` once the queue is empty.
    pub fn with_fallback(reply: impl Into<String>) -> Self {
        Self {
            state: Mutex::default(),
            fallback: Some(reply.into()),
        }
    }

    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.push(ScriptedReply::Text(text.into()))
    }

    pub fn push_empty(&self) -> &Self {
        self.push(ScriptedReply::Empty)
    }

    pub fn push_error(&self, error: BackendError) -> &Self {
        self.push(ScriptedReply::Fail(error))
    }

    pub fn push(&self, reply: ScriptedReply) -> &Self {
        self.lock().replies.push_back(reply);
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock().requests.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        // Keep serving after a panicking caller poisoned the lock.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, BackendError> {
        let reply = {
            let mut state = self.lock();
            state.requests.push(request);
            state.replies.pop_front()
        };

        match reply {
            Some(ScriptedReply::Text(text)) => Ok(CompletionResponse::text(text)),
            Some(ScriptedReply::Empty) => Ok(CompletionResponse::default()),
            Some(ScriptedReply::Fail(err)) => Err(err),
            None => match &self.fallback {
                Some(text) => Ok(CompletionResponse::text(text.clone())),
                None => Err(BackendError::Unknown("no scripted reply left".to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ResponseShape;

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            system_prompt: prompt.to_string(),
            messages: Vec::new(),
            temperature: 0.7,
            max_output_tokens: None,
            response_shape: ResponseShape::Text,
        }
    }

    #[tokio::test]
    async fn test_replays_in_order_then_fails() {
        let backend = ScriptedBackend::new();
        backend.push_text("first").push_empty();

        let first = backend.complete(request("a")).await.unwrap();
        assert_eq!(first.text.as_deref(), Some("first"));

        let second = backend.complete(request("b")).await.unwrap();
        assert_eq!(second.text, None);

        let third = backend.complete(request("c")).await;
        assert!(matches!(third, Err(BackendError::Unknown(_))));

        let prompts: Vec<String> = backend.requests().into_iter().map(|r| r.system_prompt).collect();
        assert_eq!(prompts, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_fallback_reply() {
        let backend = ScriptedBackend::with_fallback("ok");
        let reply = backend.complete(request("x")).await.unwrap();
        assert_eq!(reply.text.as_deref(), Some("ok"));
        assert_eq!(backend.call_count(), 1);
    }
}
