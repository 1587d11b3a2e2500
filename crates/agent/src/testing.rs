//! Provider double for the loop and advisor tests.

use advisorguard_core::error::ProviderError;
use advisorguard_core::message::{Message, MessageToolCall};
use advisorguard_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use async_trait::async_trait;
use std::sync::Mutex;

/// Replays a fixed list of responses and records every request. Running
/// out of responses is an API error.
pub struct ScriptedProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(mut responses: Vec<ProviderResponse>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn text(answer: &str) -> Self {
        Self::new(vec![Self::answer(answer)])
    }

    pub fn tool_then_answer(calls: Vec<MessageToolCall>, answer: &str) -> Self {
        Self::new(vec![Self::tool_calls(calls), Self::answer(answer)])
    }

    pub fn answer(text: &str) -> ProviderResponse {
        ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "scripted".into(),
        }
    }

    pub fn tool_calls(calls: Vec<MessageToolCall>) -> ProviderResponse {
        let mut message = Message::assistant("");
        message.tool_calls = calls;
        ProviderResponse {
            message,
            usage: None,
            model: "scripted".into(),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses.lock().unwrap().pop().ok_or(ProviderError::ApiError {
            status_code: 500,
            message: "script exhausted".into(),
        })
    }
}
