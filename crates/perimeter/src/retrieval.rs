//! Retrieval perimeter: which documents may the model read for this user?
//!
//! Two call patterns:
//! - [`RetrievalGate::filter`] decides per document (bulk or one check each)
//! - [`RetrievalGate::allowed_categories`] expands a coarse set of
//!   documentation categories by certification tier
//!
//! `filter` only ever returns a subsequence of its input.

use crate::audit::{AuditEvent, AuditLogger, AuditOutcome};
use crate::error::{GateError, Perimeter};
use advisorguard_config::{RetrievalGateConfig, RetrievalStrategy};
use advisorguard_core::{CheckContext, Document, PolicyCheckError, PolicyDecisionPoint, ResourceDescriptor, Subject};
use futures::future::try_join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct RetrievalGate {
    pdp: Arc<dyn PolicyDecisionPoint>,
    audit: Arc<AuditLogger>,
    config: RetrievalGateConfig,
}

impl RetrievalGate {
    pub fn new(pdp: Arc<dyn PolicyDecisionPoint>, audit: Arc<AuditLogger>, config: RetrievalGateConfig) -> Self {
        Self { pdp, audit, config }
    }

    pub fn strategy(&self) -> RetrievalStrategy {
        self.config.strategy
    }

    fn descriptor(&self, doc: &Document) -> ResourceDescriptor {
        ResourceDescriptor::new(&self.config.resource_type)
            .with_key(&doc.id)
            .with_attribute("doc_type", doc.doc_type.as_str())
            .with_attribute("classification", doc.classification.as_str())
    }

    fn failed(&self, subject: &Subject, target: &str, e: PolicyCheckError) -> GateError {
        warn!(user = subject.key(), error = %e, "Retrieval check failed");
        self.audit.log(
            Perimeter::Retrieval,
            AuditEvent::PolicyCheckFailed { error: e.to_string() },
            subject.key(),
            target,
            AuditOutcome::Failed,
            None,
        );
        GateError::policy(Perimeter::Retrieval, e)
    }

    /// Ids of the documents the PDP allows, by the configured strategy.
    async fn allowed_ids(&self, subject: &Subject, documents: &[Document]) -> Result<HashSet<String>, PolicyCheckError> {
        let descriptors: Vec<ResourceDescriptor> = documents.iter().map(|d| self.descriptor(d)).collect();
        let action = self.config.action.as_str();

        match self.config.strategy {
            RetrievalStrategy::Batch => {
                let allowed = self.pdp.filter(subject, action, &CheckContext::new(), &descriptors).await?;
                Ok(allowed.into_iter().filter_map(|r| r.key).collect())
            }
            RetrievalStrategy::PerDocument => {
                let checks = descriptors.iter().map(|r| self.pdp.check(subject, action, r));
                let results = try_join_all(checks).await?;
                Ok(documents
                    .iter()
                    .zip(results)
                    .filter(|(_, allowed)| *allowed)
                    .map(|(d, _)| d.id.clone())
                    .collect())
            }
        }
    }

    /// The documents `subject` may read, in input order. Keys the PDP
    /// returns that are not in the input are ignored.
    pub async fn filter(&self, subject: &Subject, documents: &[Document]) -> Result<Vec<Document>, GateError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        debug!(user = subject.key(), count = documents.len(), strategy = ?self.config.strategy, "Filtering documents");
        let allowed = self
            .allowed_ids(subject, documents)
            .await
            .map_err(|e| self.failed(subject, &self.config.resource_type, e))?;

        let mut seen = HashSet::new();
        let visible: Vec<Document> = documents
            .iter()
            .filter(|d| allowed.contains(&d.id) && seen.insert(d.id.as_str()))
            .cloned()
            .collect();

        info!(user = subject.key(), requested = documents.len(), allowed = visible.len(), "Documents filtered");
        self.audit.log(
            Perimeter::Retrieval,
            AuditEvent::DocumentsFiltered {
                requested: documents.len(),
                allowed: visible.len(),
            },
            subject.key(),
            &self.config.resource_type,
            AuditOutcome::Allowed,
            None,
        );
        Ok(visible)
    }

    /// Documentation categories `subject` may browse: the base categories
    /// plus those of every tier whose action the PDP allows.
    pub async fn allowed_categories(&self, subject: &Subject) -> Result<Vec<String>, GateError> {
        let resource = ResourceDescriptor::new(&self.config.category_resource_type);
        let checks = self
            .config
            .category_tiers
            .iter()
            .map(|tier| self.pdp.check(subject, &tier.action, &resource));
        let passed = try_join_all(checks)
            .await
            .map_err(|e| self.failed(subject, &self.config.category_resource_type, e))?;

        let mut categories: Vec<String> = Vec::new();
        let unlocked = self
            .config
            .category_tiers
            .iter()
            .zip(passed)
            .filter(|(_, ok)| *ok)
            .flat_map(|(tier, _)| tier.categories.iter());
        for category in self.config.base_categories.iter().chain(unlocked) {
            if !categories.contains(category) {
                categories.push(category.clone());
            }
        }

        info!(user = subject.key(), count = categories.len(), "Documentation categories resolved");
        self.audit.log(
            Perimeter::Retrieval,
            AuditEvent::CategoriesResolved {
                categories: categories.clone(),
            },
            subject.key(),
            &self.config.category_resource_type,
            AuditOutcome::Allowed,
            None,
        );
        Ok(categories)
    }
}
