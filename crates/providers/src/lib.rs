//! LLM provider implementations for AdvisorGuard.
//!
//! All providers implement the `advisorguard_core::Provider` trait. The
//! model only proposes text and tool calls; every permission decision is
//! made by the perimeter gates.

pub mod anthropic;

pub use anthropic::AnthropicProvider;
