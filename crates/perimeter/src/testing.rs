//! Test doubles shared by the gate tests.

use advisorguard_core::{PolicyCheckError, PolicyDecisionPoint, ResourceDescriptor, Subject};
use async_trait::async_trait;
use std::sync::Mutex;

type Rule = dyn Fn(&Subject, &str, &ResourceDescriptor) -> Result<bool, PolicyCheckError> + Send + Sync;

/// A PDP whose answers come from a closure. Records every check as
/// `"<action> <resource_type>"`.
pub struct ScriptedPdp {
    rule: Box<Rule>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedPdp {
    pub fn new(
        rule: impl Fn(&Subject, &str, &ResourceDescriptor) -> Result<bool, PolicyCheckError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            rule: Box::new(rule),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn allow_all() -> Self {
        Self::new(|_, _, _| Ok(true))
    }

    pub fn deny_all() -> Self {
        Self::new(|_, _, _| Ok(false))
    }

    pub fn unreachable() -> Self {
        Self::new(|_, _, _| Err(PolicyCheckError::Network("connection refused".into())))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PolicyDecisionPoint for ScriptedPdp {
    fn name(&self) -> &str {
        "scripted"
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
        (self.rule)(subject, action, resource)
    }
}
