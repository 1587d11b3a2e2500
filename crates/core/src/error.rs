//! Error types for the AdvisorGuard domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for AdvisorGuard operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Policy decision point ---
    #[error("Policy check error: {0}")]
    Policy(#[from] PolicyCheckError),

    // --- Language model provider ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tools ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// The PDP could not produce a decision.
///
/// This is never a deny: a caller that receives one of these must abort
/// the turn rather than fall back to either outcome.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PolicyCheckError {
    #[error("PDP unreachable: {0}")]
    Network(String),

    #[error("PDP request timed out: {0}")]
    Timeout(String),

    #[error("PDP rejected credentials: {0}")]
    Unauthorized(String),

    #[error("PDP returned an error: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("PDP response could not be decoded: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_error_displays_status() {
        let err = Error::Policy(PolicyCheckError::Api {
            status_code: 503,
            message: "pdp overloaded".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("pdp overloaded"));
    }

    #[test]
    fn policy_error_converts_into_top_level() {
        let err: Error = PolicyCheckError::Network("connection refused".into()).into();
        assert!(matches!(err, Error::Policy(PolicyCheckError::Network(_))));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::ExecutionFailed {
            tool_name: "check_action_permissions".into(),
            reason: "unknown action".into(),
        });
        assert!(err.to_string().contains("check_action_permissions"));
        assert!(err.to_string().contains("unknown action"));
    }
}
