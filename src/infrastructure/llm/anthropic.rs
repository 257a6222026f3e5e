//! HTTP client for an Anthropic-shaped `messages` endpoint. Grounded on
//! the teacher's `infrastructure/claude/client.rs`: a reusable pooled
//! `reqwest::Client`, explicit timeout per call, and error classification
//! into the shared taxonomy rather than bespoke error types.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::errors::{CoreError, LlmErrorKind};
use crate::domain::ports::llm::{LlmCompletion, LlmMessage, LlmProvider};

pub struct AnthropicProvider {
    http: Client,
    api_key: String,
    endpoint: String,
}

impl AnthropicProvider {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: &'a [LlmMessage],
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        max_tokens: u32,
        temperature: f32,
        timeout: Duration,
    ) -> Result<LlmCompletion, CoreError> {
        let body = MessagesRequest {
            model,
            max_tokens,
            temperature,
            messages,
        };

        let send = self
            .http
            .post(&self.endpoint)
            .timeout(timeout)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send();

        let resp = tokio::time::timeout(timeout, send).await.map_err(|_| CoreError::LlmUnavailable {
            kind: LlmErrorKind::Timeout,
            message: format!("no response within {timeout:?}"),
        })?;

        let resp = resp.map_err(|e| {
            if e.is_timeout() {
                CoreError::LlmUnavailable {
                    kind: LlmErrorKind::Timeout,
                    message: e.to_string(),
                }
            } else {
                CoreError::LlmUnavailable {
                    kind: LlmErrorKind::Unavailable,
                    message: e.to_string(),
                }
            }
        })?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::LlmUnavailable {
                kind: LlmErrorKind::RateLimited,
                message: "provider rate limit exceeded".to_string(),
            });
        }
        if resp.status() == reqwest::StatusCode::BAD_REQUEST {
            let text = resp.text().await.unwrap_or_default();
            return Err(CoreError::LlmUnavailable {
                kind: LlmErrorKind::InvalidRequest,
                message: text,
            });
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(CoreError::LlmUnavailable {
                kind: LlmErrorKind::Unavailable,
                message: format!("{status}: {text}"),
            });
        }

        let parsed: MessagesResponse = resp.json().await.map_err(|e| CoreError::LlmUnavailable {
            kind: LlmErrorKind::InvalidRequest,
            message: format!("failed to parse response: {e}"),
        })?;

        let text = parsed.content.into_iter().map(|c| c.text).collect::<Vec<_>>().join("");

        Ok(LlmCompletion {
            text,
            tokens_in: parsed.usage.input_tokens,
            tokens_out: parsed.usage.output_tokens,
        })
    }
}
