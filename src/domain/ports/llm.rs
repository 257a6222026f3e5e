//! LLM provider contract (`spec.md` §6).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::errors::CoreResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct LlmCompletion {
    pub text: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

/// `complete(model, messages, max_tokens, temperature, timeout)` per
/// `spec.md` §6. Implementers may support multiple providers; fallback
/// chains are a provider-layer concern and live outside this trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        max_tokens: u32,
        temperature: f32,
        timeout: Duration,
    ) -> CoreResult<LlmCompletion>;
}
