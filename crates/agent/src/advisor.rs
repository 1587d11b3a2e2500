//! The advisor turn: prompt gate, gated tool loop, response gate.
//!
//! The prompt perimeter runs before the model sees anything. During the
//! loop the model can only reach documents and actions through the
//! retrieval and action tools. The drafted answer then goes through the
//! response perimeter (and the delivery check when enabled) before it is
//! returned.

use crate::documents::DocumentStore;
use crate::error::AgentError;
use crate::loop_runner::{AgentLoop, ITERATION_LIMIT_MESSAGE, LoopOutcome};
use advisorguard_config::AppConfig;
use advisorguard_core::{CertificationLevel, Conversation, DraftResponse, Message, Provider, Query, Subject};
use advisorguard_perimeter::{
    AgentAction, GateError, Perimeter, PerimeterPipeline, SharedTurn, Turn, TurnState, gate_registry,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a financial advisor assistant. \
Every question you receive has already passed a permission check. \
Only use documents returned by access_financial_knowledge; never invent document contents. \
Before giving advice or performing any action, call check_action_permissions and respect its answer. \
If a tool refuses, explain the refusal to the user instead of working around it.";

pub const PERMISSION_CHECK_FAILED: &str =
    "I could not verify your permissions, so I can't answer right now. Please try again later.";

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The answer passed every perimeter.
    Delivered {
        response: DraftResponse,
        warnings: Vec<String>,
    },
    /// A perimeter denied the turn.
    Refused {
        perimeter: Perimeter,
        reason: String,
        warnings: Vec<String>,
    },
    /// A perimeter could not reach a decision.
    Failed { perimeter: Perimeter, error: String },
}

impl TurnOutcome {
    /// Text to show the user.
    pub fn message(&self) -> String {
        match self {
            TurnOutcome::Delivered { response, .. } => response.answer.clone(),
            TurnOutcome::Refused { reason, .. } => format!("I'm sorry, I can't help with that. {reason}."),
            TurnOutcome::Failed { .. } => PERMISSION_CHECK_FAILED.to_string(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, TurnOutcome::Delivered { .. })
    }
}

fn failed(e: &GateError) -> TurnOutcome {
    warn!(perimeter = %e.perimeter(), error = %e, "Turn failed");
    TurnOutcome::Failed {
        perimeter: e.perimeter(),
        error: e.to_string(),
    }
}

/// The outcome of a denied or failed turn, `None` while it is still live.
fn terminal(turn: &Turn) -> Option<TurnOutcome> {
    match turn.state() {
        TurnState::Denied => turn.denial().map(|d| TurnOutcome::Refused {
            perimeter: d.perimeter,
            reason: d.reason.clone(),
            warnings: d.warnings.clone(),
        }),
        TurnState::Failed => turn.failure().map(failed),
        _ => None,
    }
}

fn merge(warnings: &mut Vec<String>, more: Vec<String>) {
    for w in more {
        if !warnings.contains(&w) {
            warnings.push(w);
        }
    }
}

fn user_message(query: &Query, level: Option<CertificationLevel>) -> String {
    let mut context = Vec::new();
    if let Some(value) = query.portfolio_value {
        context.push(format!("portfolio value: {value:.2}"));
    }
    if let Some(profile) = &query.risk_profile {
        context.push(format!("risk profile: {profile}"));
    }
    if let Some(horizon) = &query.investment_horizon {
        context.push(format!("investment horizon: {horizon}"));
    }
    if let Some(level) = level {
        context.push(format!(
            "required certification: {level} (check the \"{}\" action before advising)",
            AgentAction::for_level(level).name()
        ));
    }

    if context.is_empty() {
        query.question.clone()
    } else {
        format!("{}\n\n[{}]", query.question, context.join("; "))
    }
}

pub struct AdvisorAgent {
    pipeline: PerimeterPipeline,
    provider: Arc<dyn Provider>,
    documents: DocumentStore,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_iterations: usize,
    system_prompt: String,
}

impl AdvisorAgent {
    pub fn new(
        pipeline: PerimeterPipeline,
        provider: Arc<dyn Provider>,
        documents: DocumentStore,
        config: &AppConfig,
    ) -> Self {
        Self {
            pipeline,
            provider,
            documents,
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_tokens: config.provider.max_tokens,
            max_iterations: config.agent.max_iterations,
            system_prompt: config
                .agent
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    pub fn pipeline(&self) -> &PerimeterPipeline {
        &self.pipeline
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// Run one question through every perimeter.
    ///
    /// Denials and PDP failures end the turn with a [`TurnOutcome`]; only a
    /// provider failure is an `Err`.
    pub async fn run_turn(&self, subject: Subject, query: Query) -> Result<TurnOutcome, AgentError> {
        let user = subject.key().to_string();
        info!(user = %user, "Turn received");
        let turn: SharedTurn = Arc::new(Mutex::new(self.pipeline.begin(subject)));
        let mut warnings = Vec::new();

        let level = {
            let mut t = turn.lock().await;
            match t.check_prompt(query.clone()).await {
                Ok(decision) => merge(&mut warnings, decision.warnings),
                Err(e) => return Ok(failed(&e)),
            }
            if let Some(outcome) = terminal(&t) {
                return Ok(outcome);
            }
            t.required_certification()
        };

        let tools = gate_registry(
            turn.clone(),
            self.documents.shared(),
            &[Perimeter::Retrieval, Perimeter::Action],
        );
        let agent = AgentLoop::new(self.provider.clone(), &self.model, Arc::new(tools), &self.system_prompt)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_max_iterations(self.max_iterations)
            .with_turn(turn.clone());

        let mut conversation = Conversation::new();
        conversation.push(Message::user(user_message(&query, level)));
        let outcome = agent.process(&mut conversation).await?;

        let mut t = turn.lock().await;
        if let Some(outcome) = terminal(&t) {
            return Ok(outcome);
        }
        let answer = match outcome {
            LoopOutcome::Answer(text) => text,
            LoopOutcome::IterationLimit => ITERATION_LIMIT_MESSAGE.to_string(),
            LoopOutcome::Halted => {
                return Ok(failed(&GateError::OutOfOrder {
                    perimeter: Perimeter::Action,
                    state: t.state().to_string(),
                }));
            }
        };

        let mut response = DraftResponse::new(answer);
        response.certification_level = level;
        response.used_premium_features = query.requests_portfolio_analysis();

        match t.enforce_response(&mut response).await {
            Ok(decision) => merge(&mut warnings, decision.warnings),
            Err(e) => return Ok(failed(&e)),
        }
        if let Some(outcome) = terminal(&t) {
            return Ok(outcome);
        }

        if self.pipeline.checks_delivery() {
            match t.authorize_delivery(&response).await {
                Ok(decision) => merge(&mut warnings, decision.warnings),
                Err(e) => return Ok(failed(&e)),
            }
            if let Some(outcome) = terminal(&t) {
                return Ok(outcome);
            }
        }

        if let Err(e) = t.finish() {
            return Ok(failed(&e));
        }
        info!(
            user = %user,
            disclaimer_added = response.disclaimer_added,
            tool_results = conversation.tool_result_count(),
            "Turn delivered"
        );
        Ok(TurnOutcome::Delivered { response, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_carries_query_context() {
        let query = Query::new("Should I rebalance?")
            .with_portfolio_value(150_000.0)
            .with_risk_profile("moderate");
        let text = user_message(&query, Some(CertificationLevel::Professional));
        assert!(text.starts_with("Should I rebalance?"));
        assert!(text.contains("portfolio value: 150000.00"));
        assert!(text.contains("risk profile: moderate"));
        assert!(text.contains("\"portfolio_analysis\""));
    }

    #[test]
    fn bare_question_has_no_context_block() {
        assert_eq!(user_message(&Query::new("What is a bond?"), None), "What is a bond?");
    }

    #[test]
    fn outcome_messages() {
        let refused = TurnOutcome::Refused {
            perimeter: Perimeter::Prompt,
            reason: "User has not opted in to receive AI-generated financial advice".into(),
            warnings: vec![],
        };
        assert!(refused.message().contains("not opted in"));
        let failed = TurnOutcome::Failed {
            perimeter: Perimeter::Retrieval,
            error: "Permission check failed at retrieval perimeter: Network error".into(),
        };
        assert_eq!(failed.message(), PERMISSION_CHECK_FAILED);
        assert!(!failed.is_delivered());
    }
}
