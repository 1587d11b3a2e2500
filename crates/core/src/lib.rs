//! # AdvisorGuard Core
//!
//! Domain types, traits, and error definitions for the AdvisorGuard
//! four-perimeter access-control pipeline. This crate has **no I/O**; it
//! defines the domain model that the PDP client, the gates and the agent
//! orchestrator implement against.
//!
//! ## Design Philosophy
//!
//! Every external capability is a trait here:
//! - [`PolicyDecisionPoint`]: the remote authorization service
//! - [`Provider`]: the language model backend
//! - [`Tool`]: something the agent may call during a turn
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted doubles and the dependency graph stays pointed inward.

pub mod decision;
pub mod error;
pub mod financial;
pub mod message;
pub mod pdp;
pub mod provider;
pub mod resource;
pub mod subject;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use decision::Decision;
pub use error::{Error, PolicyCheckError, ProviderError, Result, ToolError};
pub use financial::{Document, DraftResponse, Query};
pub use message::{Conversation, Message, MessageToolCall, Role};
pub use pdp::{CheckContext, PolicyDecisionPoint};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use resource::{ResourceDescriptor, Scalar};
pub use subject::{CertificationLevel, Subject};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
