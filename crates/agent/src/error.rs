use crate::documents::DocumentError;
use advisorguard_core::ProviderError;

/// Failures that abort a turn before any outcome can be reported.
///
/// Denials and PDP failures are not here: they end a turn normally, as a
/// [`TurnOutcome`](crate::TurnOutcome).
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Documents(#[from] DocumentError),
}
