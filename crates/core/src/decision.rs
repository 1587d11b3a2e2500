//! Gate decisions.
//!
//! A denial is an ordinary value, not an error: the orchestrator turns it
//! into a refusal. Failures to *reach* a decision travel on the error
//! channel instead (see [`crate::PolicyCheckError`]).

use serde::{Deserialize, Serialize};

/// The outcome of one gate invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,

    /// Why the gate denied. `None` for an allow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Advisory messages, in the order they were raised.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            warnings: Vec::new(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.push_warning(warning);
        self
    }

    /// Add a warning unless the same text is already present.
    pub fn push_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    pub fn is_denied(&self) -> bool {
        !self.allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_carries_reason() {
        let d = Decision::deny("not opted in");
        assert!(d.is_denied());
        assert_eq!(d.reason.as_deref(), Some("not opted in"));
    }

    #[test]
    fn warnings_are_ordered_and_unique() {
        let d = Decision::allow()
            .with_warning("first")
            .with_warning("second")
            .with_warning("first");
        assert_eq!(d.warnings, vec!["first", "second"]);
    }
}
