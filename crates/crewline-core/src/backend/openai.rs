//! OpenAI-compatible chat completions backend.
//!
//! POST {base_url}/chat/completions
//! Headers:
//!   Authorization: Bearer {api_key}
//!   content-type: application/json

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backend::{
    CompletionBackend, CompletionRequest, CompletionResponse, ResponseShape, UsageInfo,
};
use crate::config::BackendConfig;
use crate::error::{BackendError, CrewError, Result};

/// Calls an OpenAI-compatible endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl OpenAiBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CrewError::invalid_config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Build the JSON request body for `request`.
    pub fn request_body(&self, request: &CompletionRequest) -> Value {
        let mut messages = vec![json!({
            "role": "system",
            "content": request.system_prompt,
        })];
        messages.extend(request.messages.iter().map(|m| {
            json!({
                "role": m.role.as_str(),
                "content": m.content,
            })
        }));

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": request.temperature,
            "response_format": response_format(&request.response_shape),
        });

        if let Some(max_tokens) = request.max_output_tokens {
            body["max_tokens"] = Value::from(max_tokens);
        }

        body
    }
}

fn response_format(shape: &ResponseShape) -> Value {
    match shape {
        ResponseShape::Text => json!({ "type": "text" }),
        ResponseShape::JsonObject => json!({ "type": "json_object" }),
        ResponseShape::JsonSchema { name, schema, strict } => json!({
            "type": "json_schema",
            "json_schema": {
                "name": name,
                "schema": schema,
                "strict": strict,
            }
        }),
    }
}

/// Pull the first choice's message text, token usage and model out of a
/// chat completions response.
fn parse_response(json: &Value) -> CompletionResponse {
    let text = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string());

    let usage = json.get("usage").map(|u| UsageInfo {
        input_tokens: u
            .get("prompt_tokens")
            .or_else(|| u.get("input_tokens"))
            .and_then(|v| v.as_u64()),
        output_tokens: u
            .get("completion_tokens")
            .or_else(|| u.get("output_tokens"))
            .and_then(|v| v.as_u64()),
    });

    let model = json
        .get("model")
        .and_then(|m| m.as_str())
        .map(|s| s.to_string());

    CompletionResponse { text, model, usage }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, BackendError> {
        let url = self.endpoint();
        let body = self.request_body(&request);

        tracing::info!(
            "[OpenAiBackend] Calling chat completions: {} (model: {})",
            url,
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(self.config.timeout_secs)
                } else {
                    BackendError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| BackendError::Http(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: response_text,
            });
        }

        let json: Value = serde_json::from_str(&response_text)
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        let parsed = parse_response(&json);
        if let Some(ref usage) = parsed.usage {
            tracing::debug!(
                "[OpenAiBackend] Tokens: {:?} in / {:?} out",
                usage.input_tokens,
                usage.output_tokens
            );
        }

        Ok(parsed)
    }
}
