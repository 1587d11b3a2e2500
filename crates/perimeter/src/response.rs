//! Response perimeter: annotate a drafted answer before it leaves.
//!
//! [`ResponseGate::enforce`] appends the AI-advice disclaimer when the
//! answer gives advice, adds certification-level disclaimers and
//! instrument risk warnings, and is idempotent: running it again on its own
//! output changes nothing.
//!
//! Whether an answer "contains advice" is decided by
//! [`ClassificationSource`]: the local classifier (default) or the PDP.

use crate::audit::{AuditEvent, AuditLogger, AuditOutcome};
use crate::classify::{Classifier, TextKind};
use crate::compliance::{AI_ADVICE_DISCLAIMER, required_disclaimers, risk_warnings};
use crate::error::{GateError, Perimeter};
use advisorguard_config::{ClassificationSource, ResponseGateConfig};
use advisorguard_core::{Decision, DraftResponse, PolicyCheckError, PolicyDecisionPoint, ResourceDescriptor, Subject};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PREMIUM_NOT_AVAILABLE: &str = "Premium features not available";
pub const DELIVERY_DENIED: &str = "User is not permitted to receive this response";

const DELIVERY_RESOURCE: &str = "financial_advice";
const DELIVERY_ACTION: &str = "receive";
const PREMIUM_ACTION: &str = "access_premium";

pub struct ResponseGate {
    pdp: Arc<dyn PolicyDecisionPoint>,
    classifier: Arc<dyn Classifier>,
    audit: Arc<AuditLogger>,
    config: ResponseGateConfig,
}

impl ResponseGate {
    pub fn new(
        pdp: Arc<dyn PolicyDecisionPoint>,
        classifier: Arc<dyn Classifier>,
        audit: Arc<AuditLogger>,
        config: ResponseGateConfig,
    ) -> Self {
        Self {
            pdp,
            classifier,
            audit,
            config,
        }
    }

    pub fn checks_delivery(&self) -> bool {
        self.config.check_delivery
    }

    async fn check(&self, subject: &Subject, action: &str, resource: &ResourceDescriptor) -> Result<bool, GateError> {
        self.pdp.check(subject, action, resource).await.map_err(|e: PolicyCheckError| {
            warn!(user = subject.key(), action, error = %e, "Response check failed");
            self.audit.log(
                Perimeter::Response,
                AuditEvent::PolicyCheckFailed { error: e.to_string() },
                subject.key(),
                &resource.resource_type,
                AuditOutcome::Failed,
                None,
            );
            GateError::policy(Perimeter::Response, e)
        })
    }

    /// Annotate `response` in place. All PDP checks run first; a deny or a
    /// failure leaves `response` exactly as it was.
    pub async fn enforce(&self, subject: &Subject, response: &mut DraftResponse) -> Result<Decision, GateError> {
        let body = response
            .answer
            .strip_suffix(AI_ADVICE_DISCLAIMER)
            .unwrap_or(&response.answer);
        let classification = self.classifier.classify(body, TextKind::Response);
        let local_advice = classification.advice;

        let resource = ResourceDescriptor::new(&self.config.resource_type)
            .with_attribute("contains_advice", local_advice.to_string());
        let requires_disclaimer = self.check(subject, &self.config.action, &resource).await?;

        let mut decision = Decision::allow();
        let (advice, apply_disclaimer) = match self.config.classification_source {
            ClassificationSource::Local => (local_advice, local_advice && requires_disclaimer),
            ClassificationSource::Policy => {
                if local_advice != requires_disclaimer {
                    let note = format!(
                        "Advice classification mismatch: local classifier says {local_advice}, policy says {requires_disclaimer}"
                    );
                    warn!(user = subject.key(), local = local_advice, policy = requires_disclaimer, "Classification ambiguous");
                    self.audit.log(
                        Perimeter::Response,
                        AuditEvent::ClassificationMismatch {
                            local: local_advice,
                            policy: requires_disclaimer,
                        },
                        subject.key(),
                        &self.config.resource_type,
                        AuditOutcome::Flagged,
                        Some(note.clone()),
                    );
                    decision.push_warning(note);
                }
                (requires_disclaimer, requires_disclaimer)
            }
        };
        debug!(user = subject.key(), advice, apply_disclaimer, "Response classified");

        if let Some(level) = response.certification_level {
            let compliance = ResourceDescriptor::new(&self.config.compliance_resource_type)
                .with_attribute("certification", level.as_str());
            if !self.check(subject, &self.config.compliance_action, &compliance).await? {
                let reason = format!("Response requires {level} compliance validation");
                warn!(user = subject.key(), %level, "Compliance validation denied");
                self.audit.log(
                    Perimeter::Response,
                    AuditEvent::ResponseEnforced {
                        disclaimer_added: response.disclaimer_added,
                    },
                    subject.key(),
                    &self.config.compliance_resource_type,
                    AuditOutcome::Denied,
                    Some(reason.clone()),
                );
                let mut denied = Decision::deny(reason);
                denied.warnings = decision.warnings;
                return Ok(denied);
            }
        }

        // Every check has passed; only now is the response touched.
        if apply_disclaimer {
            if !response.answer.ends_with(AI_ADVICE_DISCLAIMER) {
                response.answer.push_str(AI_ADVICE_DISCLAIMER);
            }
            response.disclaimer_added = true;
            response.includes_advice = true;
        }

        for warning in risk_warnings(&classification.risk_terms) {
            if !response.risk_warnings.iter().any(|w| w == warning) {
                response.risk_warnings.push(warning.to_string());
            }
        }

        if let Some(level) = response.certification_level {
            for note in required_disclaimers(level) {
                if !response.compliance_notes.iter().any(|n| n == note) {
                    response.compliance_notes.push(note.to_string());
                }
            }
        }

        info!(
            user = subject.key(),
            disclaimer_added = response.disclaimer_added,
            risk_warnings = response.risk_warnings.len(),
            "Response enforced"
        );
        self.audit.log(
            Perimeter::Response,
            AuditEvent::ResponseEnforced {
                disclaimer_added: response.disclaimer_added,
            },
            subject.key(),
            &self.config.resource_type,
            AuditOutcome::Allowed,
            None,
        );
        Ok(decision)
    }

    /// May `subject` receive `response`? Premium content additionally needs
    /// the premium permission.
    pub async fn authorize_delivery(&self, subject: &Subject, response: &DraftResponse) -> Result<Decision, GateError> {
        let resource = ResourceDescriptor::new(DELIVERY_RESOURCE)
            .with_attribute("length", response.answer.chars().count());
        let mut decision = if self.check(subject, DELIVERY_ACTION, &resource).await? {
            Decision::allow()
        } else {
            Decision::deny(DELIVERY_DENIED)
        };

        if decision.allowed && response.used_premium_features {
            let premium = ResourceDescriptor::new(DELIVERY_RESOURCE);
            if !self.check(subject, PREMIUM_ACTION, &premium).await? {
                decision = Decision::deny(PREMIUM_NOT_AVAILABLE).with_warning(PREMIUM_NOT_AVAILABLE);
            }
        }

        self.audit.log(
            Perimeter::Response,
            AuditEvent::DeliveryChecked,
            subject.key(),
            DELIVERY_RESOURCE,
            AuditOutcome::from_allowed(decision.allowed),
            decision.reason.clone(),
        );
        Ok(decision)
    }
}
