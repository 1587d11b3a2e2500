//! The four permission perimeters of an advisor turn.
//!
//! ```text
//! question ─▶ PromptGate ─▶ RetrievalGate ─▶ ActionGate ─▶ ResponseGate ─▶ answer
//! ```
//!
//! Each gate asks the [`PolicyDecisionPoint`](advisorguard_core::PolicyDecisionPoint)
//! and returns a [`Decision`](advisorguard_core::Decision); a PDP failure is a
//! [`GateError`], never a deny. [`PerimeterPipeline`] wires the gates and
//! hands out one [`Turn`] per question, which enforces gate order.

pub mod action;
pub mod audit;
pub mod classify;
pub mod compliance;
pub mod error;
pub mod prompt;
pub mod response;
pub mod retrieval;
pub mod tools;
pub mod turn;

#[cfg(test)]
mod testing;

pub use action::{ActionGate, AgentAction};
pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink};
pub use classify::{Classification, Classifier, KeywordClassifier, RiskCategory, TextKind, required_certification};
pub use error::{GateError, Perimeter};
pub use prompt::PromptGate;
pub use response::ResponseGate;
pub use retrieval::RetrievalGate;
pub use tools::{SharedTurn, gate_registry};
pub use turn::{Denial, PerimeterPipeline, Turn, TurnState};
