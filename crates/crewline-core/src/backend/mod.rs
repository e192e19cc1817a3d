//! Completion backend boundary.
//!
//! An agent turns a task into a [`CompletionRequest`] and hands it to a
//! [`CompletionBackend`]. The wire format belongs to the backend
//! implementation:
//!
//! ```text
//! Agent ──► CompletionRequest ──► CompletionBackend ──► CompletionResponse
//!                                    │
//!                      OpenAiBackend (HTTP) / ScriptedBackend (in-process)
//! ```

pub mod openai;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

pub use openai::OpenAiBackend;
pub use scripted::ScriptedBackend;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A role-tagged conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Output format directive passed through to the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseShape {
    /// Free text (default)
    #[default]
    Text,
    /// Any syntactically valid JSON object
    JsonObject,
    /// JSON validated against a schema
    JsonSchema {
        name: String,
        schema: serde_json::Value,
        #[serde(default)]
        strict: bool,
    },
}

/// Everything a backend needs to produce one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    /// Turns that follow the system prompt, in order
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_output_tokens: Option<u32>,
    pub response_shape: ResponseShape,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// What came back from the backend. `text` is `None` when the backend
/// produced no message body at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    pub text: Option<String>,
    pub model: Option<String>,
    pub usage: Option<UsageInfo>,
}

impl CompletionResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// A text-generation service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &str;

    /// Run a single completion round trip. Implementations must not retry.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shape_yaml_forms() {
        let text: ResponseShape = serde_yaml::from_str("type: text").unwrap();
        assert_eq!(text, ResponseShape::Text);

        let object: ResponseShape = serde_yaml::from_str("type: json_object").unwrap();
        assert_eq!(object, ResponseShape::JsonObject);

        let schema: ResponseShape = serde_yaml::from_str(
            r#"
type: json_schema
name: block_logic
schema:
  type: object
  properties:
    block: { type: string }
"#,
        )
        .unwrap();
        match schema {
            ResponseShape::JsonSchema { name, schema, strict } => {
                assert_eq!(name, "block_logic");
                assert_eq!(schema["properties"]["block"]["type"], "string");
                assert!(!strict);
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn test_message_role_names() {
        let msg: ChatMessage = serde_yaml::from_str("role: assistant\ncontent: hi").unwrap();
        assert_eq!(msg, ChatMessage::assistant("hi"));
        assert_eq!(MessageRole::User.as_str(), "user");
    }
}
