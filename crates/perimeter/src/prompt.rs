//! Prompt perimeter: may this user receive an answer to this question?
//!
//! One check on the advice resource carrying the question's length and
//! whether it seeks advice, then (only if that passed and the query carries
//! a portfolio value) a second check for portfolio analysis.

use crate::audit::{AuditEvent, AuditLogger, AuditOutcome};
use crate::classify::{Classifier, TextKind};
use crate::error::{GateError, Perimeter};
use advisorguard_config::PromptGateConfig;
use advisorguard_core::{Decision, PolicyDecisionPoint, Query, ResourceDescriptor, Subject};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const NOT_OPTED_IN: &str = "User has not opted in to receive AI-generated financial advice";
pub const NO_PERMISSION: &str = "User does not have permission to access this information";
pub const PORTFOLIO_REQUIRES_PREMIUM: &str = "Portfolio analysis requires premium";

pub struct PromptGate {
    pdp: Arc<dyn PolicyDecisionPoint>,
    classifier: Arc<dyn Classifier>,
    audit: Arc<AuditLogger>,
    config: PromptGateConfig,
}

impl PromptGate {
    pub fn new(
        pdp: Arc<dyn PolicyDecisionPoint>,
        classifier: Arc<dyn Classifier>,
        audit: Arc<AuditLogger>,
        config: PromptGateConfig,
    ) -> Self {
        Self {
            pdp,
            classifier,
            audit,
            config,
        }
    }

    async fn check(
        &self,
        subject: &Subject,
        action: &str,
        resource: &ResourceDescriptor,
    ) -> Result<bool, GateError> {
        match self.pdp.check(subject, action, resource).await {
            Ok(allowed) => Ok(allowed),
            Err(e) => {
                warn!(user = subject.key(), action, error = %e, "Prompt check failed");
                self.audit.log(
                    Perimeter::Prompt,
                    AuditEvent::PolicyCheckFailed { error: e.to_string() },
                    subject.key(),
                    &resource.resource_type,
                    AuditOutcome::Failed,
                    None,
                );
                Err(GateError::policy(Perimeter::Prompt, e))
            }
        }
    }

    pub async fn evaluate(&self, subject: &Subject, query: &Query) -> Result<Decision, GateError> {
        let advice_seeking = self
            .classifier
            .classify(&query.question, TextKind::Prompt)
            .advice;
        let resource = ResourceDescriptor::new(&self.config.resource_type)
            .with_attribute("length", query.question.chars().count())
            .with_attribute("is_ai_generated", advice_seeking);
        debug!(user = subject.key(), advice_seeking, "Evaluating prompt");

        if !self.check(subject, &self.config.action, &resource).await? {
            let reason = if advice_seeking { NOT_OPTED_IN } else { NO_PERMISSION };
            warn!(user = subject.key(), reason, "Prompt denied");
            self.audit.log(
                Perimeter::Prompt,
                AuditEvent::PromptChecked { advice_seeking },
                subject.key(),
                &self.config.resource_type,
                AuditOutcome::Denied,
                Some(reason.into()),
            );
            return Ok(Decision::deny(reason).with_warning(reason));
        }

        let mut decision = Decision::allow();
        if query.requests_portfolio_analysis() {
            let analysis = ResourceDescriptor::new(&self.config.portfolio_resource_type);
            if !self.check(subject, &self.config.portfolio_action, &analysis).await? {
                warn!(user = subject.key(), "Portfolio analysis denied");
                decision = Decision::deny(PORTFOLIO_REQUIRES_PREMIUM).with_warning(PORTFOLIO_REQUIRES_PREMIUM);
            }
        }

        info!(user = subject.key(), allowed = decision.allowed, "Prompt checked");
        self.audit.log(
            Perimeter::Prompt,
            AuditEvent::PromptChecked { advice_seeking },
            subject.key(),
            &self.config.resource_type,
            AuditOutcome::from_allowed(decision.allowed),
            decision.reason.clone(),
        );
        Ok(decision)
    }
}
