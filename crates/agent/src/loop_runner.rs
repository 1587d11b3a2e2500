//! The tool-calling loop.
//!
//! Calls the provider, executes any requested tools, feeds the results back
//! and repeats until the model answers in plain text. When bound to a turn,
//! the loop also stops as soon as that turn is denied or failed.

use crate::error::AgentError;
use advisorguard_core::message::{Conversation, Message, Role};
use advisorguard_core::provider::{Provider, ProviderRequest};
use advisorguard_core::tool::{ToolCall, ToolRegistry};
use advisorguard_perimeter::SharedTurn;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const ITERATION_LIMIT_MESSAGE: &str =
    "I've reached the maximum number of tool call iterations. Please provide further guidance.";

/// How a loop run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The model produced a final text answer.
    Answer(String),
    /// The bound turn reached a terminal state during a tool round.
    Halted,
    /// `max_iterations` rounds passed without a final answer.
    IterationLimit,
}

pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_iterations: usize,
    turn: Option<SharedTurn>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            tools,
            system_prompt: system_prompt.into(),
            max_iterations: 8,
            turn: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Stop when `turn` is denied or failed.
    pub fn with_turn(mut self, turn: SharedTurn) -> Self {
        self.turn = Some(turn);
        self
    }

    async fn halted(&self) -> bool {
        match &self.turn {
            Some(turn) => turn.lock().await.state().is_terminal(),
            None => false,
        }
    }

    pub async fn process(&self, conversation: &mut Conversation) -> Result<LoopOutcome, AgentError> {
        info!(
            conversation_id = %conversation.id,
            messages = conversation.messages.len(),
            "Processing conversation"
        );

        if conversation.messages.first().map(|m| m.role) != Some(Role::System) {
            conversation.messages.insert(0, Message::system(&self.system_prompt));
        }

        let tool_definitions = self.tools.definitions();

        for iteration in 1..=self.max_iterations {
            debug!(conversation_id = %conversation.id, iteration, "Agent loop iteration");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };
            let response = self.provider.complete(request).await?;

            if let Some(usage) = &response.usage {
                debug!(model = %response.model, tokens = usage.total_tokens, "Provider responded");
            }

            if !response.message.has_tool_calls() {
                let text = response.message.content.clone();
                conversation.push(response.message);
                return Ok(LoopOutcome::Answer(text));
            }

            let tool_calls = response.message.tool_calls.clone();
            debug!(tool_count = tool_calls.len(), "Executing tool calls");
            conversation.push(response.message);

            for tc in &tool_calls {
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: serde_json::from_str(&tc.arguments).unwrap_or_default(),
                };

                match self.tools.execute(&call).await {
                    Ok(result) => {
                        debug!(tool = %tc.name, success = result.success, "Tool executed");
                        conversation.push(Message::tool_result(&tc.id, &result.output));
                    }
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool execution failed");
                        // the model sees the error and may recover
                        conversation.push(Message::tool_result(&tc.id, format!("Error: {e}")));
                    }
                }

                if self.halted().await {
                    info!(conversation_id = %conversation.id, "Turn ended by a gate, stopping loop");
                    return Ok(LoopOutcome::Halted);
                }
            }
        }

        warn!(
            conversation_id = %conversation.id,
            iterations = self.max_iterations,
            "Max tool iterations reached"
        );
        Ok(LoopOutcome::IterationLimit)
    }
}
