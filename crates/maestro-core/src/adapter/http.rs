//! HTTP chat adapter: calls an LLM endpoint directly.
//!
//! Two wire dialects are supported:
//! - OpenAI-compatible: `POST {endpoint}/chat/completions` with a bearer token
//!   (Ollama, vLLM, LiteLLM, OpenAI and most hosted gateways)
//! - Anthropic-compatible: `POST {endpoint}/v1/messages` with `x-api-key`
//!
//! The endpoint comes from the agent's `url` when set, otherwise from the
//! adapter's configured base URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{AdapterRequest, AgentAdapter};
use crate::error::AdapterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatDialect {
    OpenAi,
    Anthropic,
}

/// Calls a chat-completion style endpoint over HTTP.
pub struct HttpChatAdapter {
    client: reqwest::Client,
    dialect: ChatDialect,
    base_url: Option<String>,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: Option<f64>,
}

impl HttpChatAdapter {
    pub fn new(dialect: ChatDialect) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            dialect,
            base_url: None,
            api_key: None,
            max_tokens: 8192,
            temperature: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn endpoint<'a>(&'a self, request: &AdapterRequest<'a>) -> Result<&'a str, AdapterError> {
        request
            .endpoint
            .or(self.base_url.as_deref())
            .map(|u| u.trim_end_matches('/'))
            .ok_or_else(|| {
                AdapterError::fatal(format!(
                    "agent '{}' has no url and no default endpoint is configured",
                    request.agent
                ))
            })
    }

    fn build_body(&self, request: &AdapterRequest<'_>) -> serde_json::Value {
        let mut body = match self.dialect {
            ChatDialect::OpenAi => {
                let mut messages = Vec::new();
                if !request.instructions.is_empty() {
                    messages.push(serde_json::json!({
                        "role": "system",
                        "content": request.instructions
                    }));
                }
                messages.push(serde_json::json!({
                    "role": "user",
                    "content": request.prompt
                }));
                serde_json::json!({
                    "model": request.model,
                    "messages": messages
                })
            }
            ChatDialect::Anthropic => {
                let mut body = serde_json::json!({
                    "model": request.model,
                    "max_tokens": self.max_tokens,
                    "messages": [{ "role": "user", "content": request.prompt }]
                });
                if !request.instructions.is_empty() {
                    body["system"] = serde_json::Value::String(request.instructions.to_string());
                }
                body
            }
        };

        if let Some(temp) = self.temperature.and_then(serde_json::Number::from_f64) {
            body["temperature"] = serde_json::Value::Number(temp);
        }
        body
    }
}

#[async_trait]
impl AgentAdapter for HttpChatAdapter {
    async fn invoke(&self, request: &AdapterRequest<'_>) -> Result<String, AdapterError> {
        let base = self.endpoint(request)?;
        let url = match self.dialect {
            ChatDialect::OpenAi => format!("{}/chat/completions", base),
            ChatDialect::Anthropic => format!("{}/v1/messages", base),
        };
        if !request.tools.is_empty() {
            tracing::debug!(
                "[HttpAdapter] Tools {:?} of agent '{}' are not forwarded over HTTP",
                request.tools,
                request.agent
            );
        }

        tracing::info!(
            "[HttpAdapter] Calling {} (agent: {}, model: {})",
            url,
            request.agent,
            request.model
        );

        let mut call = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&self.build_body(request));
        if let Some(key) = &self.api_key {
            call = match self.dialect {
                ChatDialect::OpenAi => call.header("Authorization", format!("Bearer {}", key)),
                ChatDialect::Anthropic => call
                    .header("x-api-key", key)
                    .header("anthropic-version", "2023-06-01"),
            };
        } else if self.dialect == ChatDialect::Anthropic {
            call = call.header("anthropic-version", "2023-06-01");
        }

        let response = call
            .send()
            .await
            .map_err(|e| AdapterError::recoverable(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AdapterError::recoverable(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| AdapterError::fatal(format!("Failed to parse response JSON: {}", e)))?;

        match self.dialect {
            ChatDialect::OpenAi => openai_content(&json),
            ChatDialect::Anthropic => anthropic_content(&json),
        }
        .ok_or_else(|| AdapterError::fatal("response contained no text content"))
    }
}

/// Throttling and server errors are worth retrying; other failures are not.
fn status_error(status: StatusCode, body: &str) -> AdapterError {
    let message = format!("API returned {}: {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        AdapterError::recoverable(message)
    } else {
        AdapterError::fatal(message)
    }
}

fn openai_content(json: &serde_json::Value) -> Option<String> {
    json.get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

fn anthropic_content(json: &serde_json::Value) -> Option<String> {
    json.get("content")?
        .as_array()?
        .iter()
        .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
        .map(str::to_string)
        .reduce(|a, b| format!("{}\n{}", a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(tools: &'a [String], endpoint: Option<&'a str>) -> AdapterRequest<'a> {
        AdapterRequest {
            agent: "weather",
            instructions: "be terse",
            prompt: "NYC?",
            tools,
            model: "llama3.1",
            endpoint,
        }
    }

    #[test]
    fn test_openai_body() {
        let adapter = HttpChatAdapter::new(ChatDialect::OpenAi).with_temperature(0.5);
        let body = adapter.build_body(&request(&[], None));
        assert_eq!(body["model"], "llama3.1");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "NYC?");
        assert_eq!(body["temperature"], 0.5);
    }

    #[test]
    fn test_anthropic_body() {
        let adapter = HttpChatAdapter::new(ChatDialect::Anthropic);
        let body = adapter.build_body(&request(&[], None));
        assert_eq!(body["system"], "be terse");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 8192);
    }

    #[test]
    fn test_endpoint_resolution() {
        let adapter = HttpChatAdapter::new(ChatDialect::OpenAi).with_base_url("http://base/v1/");
        assert_eq!(adapter.endpoint(&request(&[], None)).unwrap(), "http://base/v1");
        assert_eq!(
            adapter.endpoint(&request(&[], Some("http://agent:8000"))).unwrap(),
            "http://agent:8000"
        );

        let bare = HttpChatAdapter::new(ChatDialect::OpenAi);
        let err = bare.endpoint(&request(&[], None)).unwrap_err();
        assert!(!err.recoverable);
    }

    #[test]
    fn test_status_classification() {
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "").recoverable);
        assert!(status_error(StatusCode::BAD_GATEWAY, "").recoverable);
        assert!(!status_error(StatusCode::UNAUTHORIZED, "").recoverable);
        assert!(!status_error(StatusCode::BAD_REQUEST, "").recoverable);
    }

    #[test]
    fn test_content_extraction() {
        let openai = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "sunny" } }]
        });
        assert_eq!(openai_content(&openai).as_deref(), Some("sunny"));

        let anthropic = serde_json::json!({
            "content": [
                { "type": "text", "text": "line one" },
                { "type": "tool_use", "name": "x" },
                { "type": "text", "text": "line two" }
            ]
        });
        assert_eq!(anthropic_content(&anthropic).as_deref(), Some("line one\nline two"));
        assert_eq!(openai_content(&serde_json::json!({})), None);
    }
}
