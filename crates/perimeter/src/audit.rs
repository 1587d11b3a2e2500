//! Audit log of gate decisions.
//!
//! Every gate records what it decided, for whom, and on what. Entries are
//! kept in memory for the turn summary and forwarded to any number of sinks.

use crate::error::Perimeter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub perimeter: Perimeter,
    pub event: AuditEvent,
    /// User the decision was made for.
    pub actor: String,
    /// What was checked (resource type, action or document id).
    pub target: String,
    pub outcome: AuditOutcome,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    PromptChecked { advice_seeking: bool },
    DocumentsFiltered { requested: usize, allowed: usize },
    CategoriesResolved { categories: Vec<String> },
    ActionAuthorized { action: String },
    ResponseEnforced { disclaimer_added: bool },
    DeliveryChecked,
    /// The local classifier and the PDP disagreed about whether a response
    /// contains advice.
    ClassificationMismatch { local: bool, policy: bool },
    PolicyCheckFailed { error: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Allowed,
    Denied,
    Flagged,
    Failed,
}

impl AuditOutcome {
    pub fn from_allowed(allowed: bool) -> Self {
        if allowed {
            AuditOutcome::Allowed
        } else {
            AuditOutcome::Denied
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

pub struct AuditLogger {
    entries: std::sync::Mutex<Vec<AuditEntry>>,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("entry_count", &self.count())
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: std::sync::Mutex::new(Vec::new()),
            sinks,
        }
    }

    /// Logger that forwards to [`TracingSink`].
    pub fn tracing() -> Self {
        Self::with_sinks(vec![Box::new(TracingSink)])
    }

    pub fn log(
        &self,
        perimeter: Perimeter,
        event: AuditEvent,
        actor: &str,
        target: &str,
        outcome: AuditOutcome,
        details: Option<String>,
    ) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            perimeter,
            event,
            actor: actor.into(),
            target: target.into(),
            outcome,
            details,
        };

        self.entries.lock().unwrap().push(entry.clone());

        for sink in &self.sinks {
            sink.record(&entry);
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn entries_for(&self, perimeter: Perimeter) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.perimeter == perimeter)
            .cloned()
            .collect()
    }

    pub fn entries_by_outcome(&self, outcome: AuditOutcome) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.outcome == outcome)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

/// Logs entries via `tracing::info!`.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &AuditEntry) {
        tracing::info!(
            perimeter = %entry.perimeter,
            event = ?entry.event,
            actor = %entry.actor,
            target = %entry.target,
            outcome = ?entry.outcome,
            details = ?entry.details,
            "AUDIT"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn filters_by_perimeter_and_outcome() {
        let logger = AuditLogger::new();
        logger.log(
            Perimeter::Prompt,
            AuditEvent::PromptChecked { advice_seeking: true },
            "user@example.com",
            "financial_advice",
            AuditOutcome::Allowed,
            None,
        );
        logger.log(
            Perimeter::Action,
            AuditEvent::ActionAuthorized { action: "update_portfolio".into() },
            "user@example.com",
            "portfolio",
            AuditOutcome::Denied,
            Some("Not authorized to perform update_portfolio".into()),
        );

        assert_eq!(logger.count(), 2);
        assert_eq!(logger.entries_for(Perimeter::Action).len(), 1);
        let denied = logger.entries_by_outcome(AuditOutcome::Denied);
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].target, "portfolio");
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_value(AuditEvent::DocumentsFiltered { requested: 4, allowed: 2 }).unwrap();
        assert_eq!(json["type"], "documents_filtered");
        assert_eq!(json["allowed"], 2);
    }

    #[test]
    fn sinks_receive_entries() {
        struct Collect(Arc<Mutex<Vec<Perimeter>>>);

        impl AuditSink for Collect {
            fn record(&self, entry: &AuditEntry) {
                self.0.lock().unwrap().push(entry.perimeter);
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let logger = AuditLogger::with_sinks(vec![Box::new(Collect(seen.clone()))]);
        logger.log(
            Perimeter::Response,
            AuditEvent::ClassificationMismatch { local: true, policy: false },
            "u",
            "financial_response",
            AuditOutcome::Flagged,
            None,
        );
        assert_eq!(*seen.lock().unwrap(), vec![Perimeter::Response]);
    }
}
