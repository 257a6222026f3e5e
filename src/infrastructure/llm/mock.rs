//! In-memory `LlmProvider` for tests. Grounded on the teacher's
//! `adapters/substrates/mock.rs`.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::errors::CoreError;
use crate::domain::ports::llm::{LlmCompletion, LlmMessage, LlmProvider};

pub struct MockLlmProvider {
    responses: Mutex<Vec<Result<LlmCompletion, CoreError>>>,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<Result<LlmCompletion, CoreError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
        }
    }

    pub fn always_returning(text: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(vec![Ok(LlmCompletion {
                text: text.into(),
                tokens_in: 10,
                tokens_out: 10,
            })]),
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(
        &self,
        _model: &str,
        _messages: &[LlmMessage],
        _max_tokens: u32,
        _temperature: f32,
        _timeout: Duration,
    ) -> Result<LlmCompletion, CoreError> {
        let mut queue = self.responses.lock().expect("mock lock poisoned");
        if queue.len() > 1 {
            queue.remove(0)
        } else if let Some(last) = queue.last() {
            last.clone()
        } else {
            Err(CoreError::LlmUnavailable {
                kind: crate::domain::errors::LlmErrorKind::Unavailable,
                message: "mock exhausted".to_string(),
            })
        }
    }
}
