//! Per-turn state machine.
//!
//! ```text
//! Start -> PromptChecked -> (RetrievalChecked)? -> (ActionChecked)? -> ResponseChecked -> Done
//! ```
//!
//! Any deny moves the turn to `Denied`, any PDP failure to `Failed`; both
//! are terminal. Gate methods called from the wrong state return
//! [`GateError::OutOfOrder`] without touching the PDP.

use crate::action::{ActionGate, AgentAction};
use crate::audit::AuditLogger;
use crate::classify::{Classifier, KeywordClassifier, required_certification};
use crate::error::{GateError, Perimeter};
use crate::prompt::PromptGate;
use crate::response::ResponseGate;
use crate::retrieval::RetrievalGate;
use advisorguard_config::AppConfig;
use advisorguard_core::{CertificationLevel, Decision, Document, DraftResponse, PolicyDecisionPoint, Query, Subject};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Start,
    PromptChecked,
    RetrievalChecked,
    ActionChecked,
    ResponseChecked,
    Done,
    Denied,
    Failed,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Start => "start",
            TurnState::PromptChecked => "prompt_checked",
            TurnState::RetrievalChecked => "retrieval_checked",
            TurnState::ActionChecked => "action_checked",
            TurnState::ResponseChecked => "response_checked",
            TurnState::Done => "done",
            TurnState::Denied => "denied",
            TurnState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done | TurnState::Denied | TurnState::Failed)
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four gates wired to one PDP, classifier and audit log.
///
/// Cheap to clone; every [`Turn`] holds a clone.
#[derive(Clone)]
pub struct PerimeterPipeline {
    prompt: Arc<PromptGate>,
    retrieval: Arc<RetrievalGate>,
    action: Arc<ActionGate>,
    response: Arc<ResponseGate>,
    classifier: Arc<dyn Classifier>,
    audit: Arc<AuditLogger>,
}

impl PerimeterPipeline {
    pub fn new(
        pdp: Arc<dyn PolicyDecisionPoint>,
        classifier: Arc<dyn Classifier>,
        audit: Arc<AuditLogger>,
        config: &AppConfig,
    ) -> Self {
        Self {
            prompt: Arc::new(PromptGate::new(
                pdp.clone(),
                classifier.clone(),
                audit.clone(),
                config.prompt.clone(),
            )),
            retrieval: Arc::new(RetrievalGate::new(pdp.clone(), audit.clone(), config.retrieval.clone())),
            action: Arc::new(ActionGate::new(pdp.clone(), audit.clone())),
            response: Arc::new(ResponseGate::new(
                pdp,
                classifier.clone(),
                audit.clone(),
                config.response.clone(),
            )),
            classifier,
            audit,
        }
    }

    /// Keyword classifier and an audit log forwarding to tracing.
    pub fn from_config(pdp: Arc<dyn PolicyDecisionPoint>, config: &AppConfig) -> Self {
        Self::new(pdp, Arc::new(KeywordClassifier), Arc::new(AuditLogger::tracing()), config)
    }

    pub fn audit(&self) -> Arc<AuditLogger> {
        self.audit.clone()
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn checks_delivery(&self) -> bool {
        self.response.checks_delivery()
    }

    pub fn begin(&self, subject: Subject) -> Turn {
        debug!(user = subject.key(), "Turn started");
        Turn {
            pipeline: self.clone(),
            subject,
            query: None,
            state: TurnState::Start,
            denial: None,
            failure: None,
        }
    }
}

/// Where and why a turn was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub perimeter: Perimeter,
    pub reason: String,
    pub warnings: Vec<String>,
}

/// One user question on its way through the perimeters.
pub struct Turn {
    pipeline: PerimeterPipeline,
    subject: Subject,
    query: Option<Query>,
    state: TurnState,
    denial: Option<Denial>,
    failure: Option<GateError>,
}

impl Turn {
    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    pub fn denial(&self) -> Option<&Denial> {
        self.denial.as_ref()
    }

    /// The PDP failure that ended the turn.
    pub fn failure(&self) -> Option<&GateError> {
        self.failure.as_ref()
    }

    /// Certification level the checked query calls for.
    pub fn required_certification(&self) -> Option<CertificationLevel> {
        self.query
            .as_ref()
            .map(|q| required_certification(q, self.pipeline.classifier()))
    }

    fn expect_state(&self, perimeter: Perimeter, allowed: &[TurnState]) -> Result<(), GateError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(GateError::OutOfOrder {
                perimeter,
                state: self.state.to_string(),
            })
        }
    }

    fn settle<T>(&mut self, result: &Result<T, GateError>) {
        if let Err(e) = result {
            self.state = TurnState::Failed;
            self.failure = Some(e.clone());
        }
    }

    fn advance(&mut self, perimeter: Perimeter, decision: &Decision, next: TurnState) {
        if decision.allowed {
            self.state = next;
        } else {
            self.state = TurnState::Denied;
            self.denial = Some(Denial {
                perimeter,
                reason: decision
                    .reason
                    .clone()
                    .unwrap_or_else(|| format!("Denied at {perimeter} perimeter")),
                warnings: decision.warnings.clone(),
            });
        }
        debug!(user = self.subject.key(), state = %self.state, "Turn advanced");
    }

    pub async fn check_prompt(&mut self, query: Query) -> Result<Decision, GateError> {
        self.expect_state(Perimeter::Prompt, &[TurnState::Start])?;
        let result = self.pipeline.prompt.evaluate(&self.subject, &query).await;
        self.settle(&result);
        let decision = result?;
        self.query = Some(query);
        self.advance(Perimeter::Prompt, &decision, TurnState::PromptChecked);
        Ok(decision)
    }

    pub async fn filter_documents(&mut self, documents: &[Document]) -> Result<Vec<Document>, GateError> {
        self.expect_state(
            Perimeter::Retrieval,
            &[TurnState::PromptChecked, TurnState::RetrievalChecked],
        )?;
        let result = self.pipeline.retrieval.filter(&self.subject, documents).await;
        self.settle(&result);
        let visible = result?;
        self.state = TurnState::RetrievalChecked;
        Ok(visible)
    }

    pub async fn allowed_categories(&mut self) -> Result<Vec<String>, GateError> {
        self.expect_state(
            Perimeter::Retrieval,
            &[TurnState::PromptChecked, TurnState::RetrievalChecked],
        )?;
        let result = self.pipeline.retrieval.allowed_categories(&self.subject).await;
        self.settle(&result);
        let categories = result?;
        self.state = TurnState::RetrievalChecked;
        Ok(categories)
    }

    pub async fn authorize_action(&mut self, action: &AgentAction) -> Result<Decision, GateError> {
        self.expect_state(
            Perimeter::Action,
            &[
                TurnState::PromptChecked,
                TurnState::RetrievalChecked,
                TurnState::ActionChecked,
            ],
        )?;
        let result = self.pipeline.action.evaluate(&self.subject, action).await;
        self.settle(&result);
        let decision = result?;
        self.advance(Perimeter::Action, &decision, TurnState::ActionChecked);
        Ok(decision)
    }

    /// Every one of `actions` must be allowed; partial access denies the turn.
    pub async fn authorize_actions(&mut self, actions: &[AgentAction]) -> Result<Decision, GateError> {
        self.expect_state(
            Perimeter::Action,
            &[
                TurnState::PromptChecked,
                TurnState::RetrievalChecked,
                TurnState::ActionChecked,
            ],
        )?;
        let result = self.pipeline.action.evaluate_all(&self.subject, actions).await;
        self.settle(&result);
        let decision = result?;
        self.advance(Perimeter::Action, &decision, TurnState::ActionChecked);
        Ok(decision)
    }

    pub async fn enforce_response(&mut self, response: &mut DraftResponse) -> Result<Decision, GateError> {
        self.expect_state(
            Perimeter::Response,
            &[
                TurnState::PromptChecked,
                TurnState::RetrievalChecked,
                TurnState::ActionChecked,
            ],
        )?;
        let result = self.pipeline.response.enforce(&self.subject, response).await;
        self.settle(&result);
        let decision = result?;
        self.advance(Perimeter::Response, &decision, TurnState::ResponseChecked);
        Ok(decision)
    }

    pub async fn authorize_delivery(&mut self, response: &DraftResponse) -> Result<Decision, GateError> {
        self.expect_state(Perimeter::Response, &[TurnState::ResponseChecked])?;
        let result = self.pipeline.response.authorize_delivery(&self.subject, response).await;
        self.settle(&result);
        let decision = result?;
        self.advance(Perimeter::Response, &decision, TurnState::ResponseChecked);
        Ok(decision)
    }

    pub fn finish(&mut self) -> Result<(), GateError> {
        self.expect_state(Perimeter::Response, &[TurnState::ResponseChecked])?;
        self.state = TurnState::Done;
        Ok(())
    }
}
