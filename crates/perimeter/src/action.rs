//! Action perimeter: may the agent do this on the user's behalf?
//!
//! Every call is a fresh PDP check. Nothing is cached and nothing is
//! retried. Composite capabilities need every part allowed.

use crate::audit::{AuditEvent, AuditLogger, AuditOutcome};
use crate::error::{GateError, Perimeter};
use advisorguard_core::{CertificationLevel, Decision, PolicyDecisionPoint, ResourceDescriptor, Subject};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MARKET_DATA_ENDPOINT: &str = "market_data";
pub const PORTFOLIO_ANALYSIS_ENDPOINT: &str = "portfolio_analysis";
/// Tool-facing name of the market data plus portfolio analysis composite.
pub const FULL_MARKET_ACCESS: &str = "full_market_access";
pub const NO_ACTIONS: &str = "No actions to authorize";

/// Something the agent may attempt during a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentAction {
    BasicAdvice,
    PortfolioAnalysis,
    SpecificRecommendations,
    UpdatePortfolio {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        portfolio_id: Option<String>,
    },
    AccessApiEndpoint {
        endpoint: String,
    },
}

impl AgentAction {
    pub fn endpoint(name: impl Into<String>) -> Self {
        AgentAction::AccessApiEndpoint { endpoint: name.into() }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AgentAction::BasicAdvice => "basic_advice",
            AgentAction::PortfolioAnalysis => "portfolio_analysis",
            AgentAction::SpecificRecommendations => "specific_recommendations",
            AgentAction::UpdatePortfolio { .. } => "update_portfolio",
            AgentAction::AccessApiEndpoint { .. } => "access_api_endpoint",
        }
    }

    /// The PDP action and resource this agent action is checked as.
    pub fn to_check(&self) -> (&'static str, ResourceDescriptor) {
        match self {
            AgentAction::BasicAdvice => (
                "provide",
                ResourceDescriptor::new("financial_action").with_attribute("action", self.name()),
            ),
            AgentAction::PortfolioAnalysis => (
                "analyze",
                ResourceDescriptor::new("financial_action").with_attribute("action", self.name()),
            ),
            AgentAction::SpecificRecommendations => (
                "recommend",
                ResourceDescriptor::new("financial_action").with_attribute("action", self.name()),
            ),
            AgentAction::UpdatePortfolio { portfolio_id } => {
                let resource = ResourceDescriptor::new("portfolio");
                let resource = match portfolio_id {
                    Some(id) => resource.with_key(id),
                    None => resource,
                };
                ("update", resource)
            }
            AgentAction::AccessApiEndpoint { endpoint } => (
                "access",
                ResourceDescriptor::new("api").with_attribute("endpoint", endpoint.as_str()),
            ),
        }
    }

    /// The endpoints that together make up full market access.
    pub fn market_access() -> Vec<AgentAction> {
        vec![
            AgentAction::endpoint(MARKET_DATA_ENDPOINT),
            AgentAction::endpoint(PORTFOLIO_ANALYSIS_ENDPOINT),
        ]
    }

    /// The advice action a certification level calls for.
    pub fn for_level(level: CertificationLevel) -> Self {
        match level {
            CertificationLevel::General => AgentAction::BasicAdvice,
            CertificationLevel::Professional => AgentAction::PortfolioAnalysis,
            CertificationLevel::Expert => AgentAction::SpecificRecommendations,
        }
    }
}

impl fmt::Display for AgentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentAction::AccessApiEndpoint { endpoint } => write!(f, "access_api_endpoint({endpoint})"),
            AgentAction::UpdatePortfolio { portfolio_id: Some(id) } => write!(f, "update_portfolio({id})"),
            other => f.write_str(other.name()),
        }
    }
}

pub struct ActionGate {
    pdp: Arc<dyn PolicyDecisionPoint>,
    audit: Arc<AuditLogger>,
}

impl ActionGate {
    pub fn new(pdp: Arc<dyn PolicyDecisionPoint>, audit: Arc<AuditLogger>) -> Self {
        Self { pdp, audit }
    }

    pub async fn authorize(&self, subject: &Subject, action: &AgentAction) -> Result<bool, GateError> {
        let (pdp_action, resource) = action.to_check();
        debug!(user = subject.key(), action = %action, "Checking action");

        let allowed = match self.pdp.check(subject, pdp_action, &resource).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(user = subject.key(), action = %action, error = %e, "Action check failed");
                self.audit.log(
                    Perimeter::Action,
                    AuditEvent::PolicyCheckFailed { error: e.to_string() },
                    subject.key(),
                    &resource.resource_type,
                    AuditOutcome::Failed,
                    Some(action.to_string()),
                );
                return Err(GateError::policy(Perimeter::Action, e));
            }
        };

        if allowed {
            info!(user = subject.key(), action = %action, "Action authorized");
        } else {
            warn!(user = subject.key(), action = %action, "Action denied");
        }
        self.audit.log(
            Perimeter::Action,
            AuditEvent::ActionAuthorized {
                action: action.to_string(),
            },
            subject.key(),
            &resource.resource_type,
            AuditOutcome::from_allowed(allowed),
            None,
        );
        Ok(allowed)
    }

    /// `authorize` as a [`Decision`] with an explanation on deny.
    pub async fn evaluate(&self, subject: &Subject, action: &AgentAction) -> Result<Decision, GateError> {
        if self.authorize(subject, action).await? {
            Ok(Decision::allow())
        } else {
            Ok(Decision::deny(format!("Not authorized to perform {action}")))
        }
    }

    /// All of `actions` must be allowed. Checks run concurrently; the first
    /// failure aborts the whole set. An empty set is denied.
    pub async fn authorize_all(&self, subject: &Subject, actions: &[AgentAction]) -> Result<bool, GateError> {
        if actions.is_empty() {
            warn!(user = subject.key(), "Empty action set denied");
            return Ok(false);
        }
        let results = try_join_all(actions.iter().map(|a| self.authorize(subject, a))).await?;
        Ok(results.into_iter().all(|allowed| allowed))
    }

    /// `authorize_all` as a [`Decision`] naming every requested action on deny.
    pub async fn evaluate_all(&self, subject: &Subject, actions: &[AgentAction]) -> Result<Decision, GateError> {
        if actions.is_empty() {
            return Ok(Decision::deny(NO_ACTIONS));
        }
        if self.authorize_all(subject, actions).await? {
            Ok(Decision::allow())
        } else {
            let names: Vec<String> = actions.iter().map(ToString::to_string).collect();
            Ok(Decision::deny(format!("Not authorized to perform {}", names.join(" and "))))
        }
    }

    /// Market data and portfolio analysis APIs together.
    pub async fn full_market_access(&self, subject: &Subject) -> Result<bool, GateError> {
        self.authorize_all(subject, &AgentAction::market_access()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPdp;
    use advisorguard_core::Scalar;

    fn gate(pdp: Arc<ScriptedPdp>) -> ActionGate {
        ActionGate::new(pdp, Arc::new(AuditLogger::new()))
    }

    #[test]
    fn action_mapping() {
        let cases = [
            (AgentAction::BasicAdvice, "provide", "financial_action"),
            (AgentAction::PortfolioAnalysis, "analyze", "financial_action"),
            (AgentAction::SpecificRecommendations, "recommend", "financial_action"),
            (AgentAction::UpdatePortfolio { portfolio_id: None }, "update", "portfolio"),
            (AgentAction::endpoint("market_data"), "access", "api"),
        ];
        for (action, pdp_action, resource_type) in cases {
            let (a, r) = action.to_check();
            assert_eq!(a, pdp_action);
            assert_eq!(r.resource_type, resource_type);
        }

        let (_, r) = AgentAction::SpecificRecommendations.to_check();
        assert_eq!(r.attribute("action"), Some(&Scalar::from("specific_recommendations")));
        let (_, r) = AgentAction::UpdatePortfolio { portfolio_id: Some("pf_42".into()) }.to_check();
        assert_eq!(r.key.as_deref(), Some("pf_42"));
    }

    #[test]
    fn action_parses_from_tool_arguments() {
        let action: AgentAction =
            serde_json::from_value(serde_json::json!({"action": "access_api_endpoint", "endpoint": "market_data"})).unwrap();
        assert_eq!(action, AgentAction::endpoint("market_data"));
        let action: AgentAction = serde_json::from_value(serde_json::json!({"action": "update_portfolio"})).unwrap();
        assert_eq!(action, AgentAction::UpdatePortfolio { portfolio_id: None });
    }

    #[test]
    fn levels_map_to_advice_actions() {
        assert_eq!(AgentAction::for_level(CertificationLevel::General), AgentAction::BasicAdvice);
        assert_eq!(AgentAction::for_level(CertificationLevel::Professional), AgentAction::PortfolioAnalysis);
        assert_eq!(
            AgentAction::for_level(CertificationLevel::Expert),
            AgentAction::SpecificRecommendations
        );
    }

    #[tokio::test]
    async fn partial_api_access_is_denial() {
        let pdp = Arc::new(ScriptedPdp::new(|_, _, resource| {
            Ok(resource.attribute("endpoint").and_then(|v| v.as_str()) == Some("market_data"))
        }));
        let gate = gate(pdp.clone());
        assert!(!gate.full_market_access(&Subject::new("u")).await.unwrap());
        assert_eq!(pdp.calls().len(), 2);
    }

    #[tokio::test]
    async fn full_access_needs_both_endpoints() {
        let gate = gate(Arc::new(ScriptedPdp::allow_all()));
        assert!(gate.full_market_access(&Subject::new("u")).await.unwrap());
    }

    #[tokio::test]
    async fn every_call_is_a_fresh_check() {
        let pdp = Arc::new(ScriptedPdp::allow_all());
        let gate = gate(pdp.clone());
        let subject = Subject::new("u");
        gate.authorize(&subject, &AgentAction::BasicAdvice).await.unwrap();
        gate.authorize(&subject, &AgentAction::BasicAdvice).await.unwrap();
        assert_eq!(pdp.calls(), vec!["provide financial_action", "provide financial_action"]);
    }

    #[tokio::test]
    async fn evaluate_explains_denial() {
        let gate = gate(Arc::new(ScriptedPdp::deny_all()));
        let decision = gate
            .evaluate(&Subject::new("u"), &AgentAction::UpdatePortfolio { portfolio_id: Some("pf_1".into()) })
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.reason.as_deref(), Some("Not authorized to perform update_portfolio(pf_1)"));
    }

    #[tokio::test]
    async fn empty_action_set_is_denied_without_checks() {
        let pdp = Arc::new(ScriptedPdp::allow_all());
        let gate = gate(pdp.clone());
        assert!(!gate.authorize_all(&Subject::new("u"), &[]).await.unwrap());
        let decision = gate.evaluate_all(&Subject::new("u"), &[]).await.unwrap();
        assert_eq!(decision.reason.as_deref(), Some(NO_ACTIONS));
        assert!(pdp.calls().is_empty());
    }

    #[tokio::test]
    async fn evaluate_all_names_every_action() {
        let gate = gate(Arc::new(ScriptedPdp::new(|_, _, resource| {
            Ok(resource.attribute("endpoint").and_then(|v| v.as_str()) == Some("market_data"))
        })));
        let decision = gate
            .evaluate_all(&Subject::new("u"), &AgentAction::market_access())
            .await
            .unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("Not authorized to perform access_api_endpoint(market_data) and access_api_endpoint(portfolio_analysis)")
        );
    }

    #[tokio::test]
    async fn failure_in_composite_is_an_error() {
        let gate = gate(Arc::new(ScriptedPdp::unreachable()));
        let err = gate.full_market_access(&Subject::new("u")).await.unwrap_err();
        assert_eq!(err.perimeter(), Perimeter::Action);
    }
}
