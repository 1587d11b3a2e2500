//! The advisor agent: one permission-gated turn per question.
//!
//! 1. **Prompt perimeter** decides whether the question may be answered
//! 2. **Tool loop** lets the model read documents and request actions,
//!    each through its perimeter tool
//! 3. **Response perimeter** annotates the drafted answer
//!
//! A denial at any step ends the turn with a refusal; a PDP failure ends it
//! with a "could not verify permissions" message.

pub mod advisor;
pub mod documents;
pub mod error;
pub mod loop_runner;

#[cfg(test)]
mod testing;

pub use advisor::{AdvisorAgent, DEFAULT_SYSTEM_PROMPT, PERMISSION_CHECK_FAILED, TurnOutcome};
pub use documents::{DocumentError, DocumentStore};
pub use error::AgentError;
pub use loop_runner::{AgentLoop, LoopOutcome};
