//! Gate errors.
//!
//! A deny is never an error here. `GateError` means the pipeline could not
//! reach a decision, or was driven out of order.

use advisorguard_core::PolicyCheckError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four checkpoints of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perimeter {
    Prompt,
    Retrieval,
    Action,
    Response,
}

impl Perimeter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Perimeter::Prompt => "prompt",
            Perimeter::Retrieval => "retrieval",
            Perimeter::Action => "action",
            Perimeter::Response => "response",
        }
    }
}

impl fmt::Display for Perimeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GateError {
    #[error("Permission check failed at {perimeter} perimeter: {source}")]
    PolicyCheck {
        perimeter: Perimeter,
        #[source]
        source: PolicyCheckError,
    },

    #[error("{perimeter} gate called out of order (turn is {state})")]
    OutOfOrder { perimeter: Perimeter, state: String },
}

impl GateError {
    pub fn policy(perimeter: Perimeter, source: PolicyCheckError) -> Self {
        GateError::PolicyCheck { perimeter, source }
    }

    pub fn perimeter(&self) -> Perimeter {
        match self {
            GateError::PolicyCheck { perimeter, .. } | GateError::OutOfOrder { perimeter, .. } => *perimeter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_error_names_perimeter() {
        let err = GateError::policy(
            Perimeter::Retrieval,
            PolicyCheckError::Network("connection refused".into()),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("Permission check failed at retrieval perimeter"));
        assert!(msg.contains("connection refused"));
        assert_eq!(err.perimeter(), Perimeter::Retrieval);
    }
}
