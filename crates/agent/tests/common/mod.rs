//! Doubles for the full-turn tests: a PDP with a small advisor policy and a
//! provider that replays scripted rounds.

#![allow(dead_code)]

use advisorguard_agent::{AdvisorAgent, DocumentStore};
use advisorguard_config::AppConfig;
use advisorguard_core::error::{PolicyCheckError, ProviderError};
use advisorguard_core::message::{Message, MessageToolCall};
use advisorguard_core::provider::{Provider, ProviderRequest, ProviderResponse};
use advisorguard_core::{CertificationLevel, PolicyDecisionPoint, ResourceDescriptor, Subject};
use advisorguard_perimeter::{AuditLogger, KeywordClassifier, PerimeterPipeline};
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

fn rank(classification: &str) -> u8 {
    match classification {
        "public" => 0,
        "restricted" => 1,
        "confidential" => 2,
        _ => 3,
    }
}

/// Opt-in gates AI advice, tier gates premium features, clearance gates
/// documents, nobody may update portfolios.
pub fn advisor_policy(subject: &Subject, action: &str, resource: &ResourceDescriptor) -> bool {
    let premium = subject.tier.as_deref() == Some("premium");
    match (action, resource.resource_type.as_str()) {
        ("receive", "financial_advice") => {
            let ai = resource.attribute("is_ai_generated").and_then(|v| v.as_bool()) == Some(true);
            !ai || subject.ai_advice_opted_in == Some(true)
        }
        ("analyze_portfolio", _) | ("access_premium", _) => premium,
        ("read", "financial_document") => {
            let doc = resource
                .attribute("classification")
                .and_then(|v| v.as_str())
                .map(rank)
                .unwrap_or(3);
            doc <= subject.clearance_level.as_deref().map(rank).unwrap_or(0)
        }
        ("update", "portfolio") => false,
        ("compliance_validation", "response") => {
            let required = resource
                .attribute("certification")
                .and_then(|v| v.as_str())
                .and_then(|s| CertificationLevel::from_str(s).ok());
            let held = subject.certification_level.unwrap_or(CertificationLevel::General);
            required.is_none_or(|required| held >= required)
        }
        _ => true,
    }
}

/// A PDP answering from [`advisor_policy`], failing any action listed in
/// `unreachable_for`.
pub struct PolicyPdp {
    unreachable_for: Vec<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl PolicyPdp {
    pub fn new() -> Self {
        Self {
            unreachable_for: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(actions: &[&'static str]) -> Self {
        Self {
            unreachable_for: actions.to_vec(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PolicyDecisionPoint for PolicyPdp {
    fn name(&self) -> &str {
        "policy"
    }

    async fn check(
        &self,
        subject: &Subject,
        action: &str,
        resource: &ResourceDescriptor,
    ) -> Result<bool, PolicyCheckError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{action} {}", resource.resource_type));
        if self.unreachable_for.iter().any(|a| *a == action) {
            return Err(PolicyCheckError::Network("connection refused".into()));
        }
        Ok(advisor_policy(subject, action, resource))
    }
}

/// Replays rounds in order; records every request.
pub struct ScriptedProvider {
    rounds: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(mut rounds: Vec<ProviderResponse>) -> Self {
        rounds.reverse();
        Self {
            rounds: Mutex::new(rounds),
            requests: Mutex::new(Vec::new()),
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
        self.rounds.lock().unwrap().pop().ok_or(ProviderError::ApiError {
            status_code: 500,
            message: "script exhausted".into(),
        })
    }
}

pub fn answer(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: None,
        model: "scripted".into(),
    }
}

pub fn call(name: &str, arguments: serde_json::Value) -> ProviderResponse {
    let mut message = Message::assistant("");
    message.tool_calls = vec![MessageToolCall::new(name, arguments.to_string())];
    ProviderResponse {
        message,
        usage: None,
        model: "scripted".into(),
    }
}

pub struct Harness {
    pub agent: AdvisorAgent,
    pub pdp: Arc<PolicyPdp>,
    pub provider: Arc<ScriptedProvider>,
    pub audit: Arc<AuditLogger>,
}

pub fn harness(pdp: PolicyPdp, rounds: Vec<ProviderResponse>, config: AppConfig) -> Harness {
    let pdp = Arc::new(pdp);
    let provider = Arc::new(ScriptedProvider::new(rounds));
    let audit = Arc::new(AuditLogger::new());
    let pipeline = PerimeterPipeline::new(pdp.clone(), Arc::new(KeywordClassifier), audit.clone(), &config);
    let agent = AdvisorAgent::new(pipeline, provider.clone(), DocumentStore::sample(), &config);
    Harness {
        agent,
        pdp,
        provider,
        audit,
    }
}
