//! The policy decision point capability.
//!
//! Every authorization decision in the pipeline is delegated to an
//! implementation of [`PolicyDecisionPoint`]. Gates never decide on their
//! own; they build `(subject, action, resource)` triples and branch on the
//! answer.

use crate::error::PolicyCheckError;
use crate::resource::{ResourceDescriptor, Scalar};
use crate::subject::Subject;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Request-level attributes sent alongside a bulk check.
pub type CheckContext = BTreeMap<String, Scalar>;

#[async_trait]
pub trait PolicyDecisionPoint: Send + Sync {
    /// A short name for logs (e.g. "http", "scripted").
    fn name(&self) -> &str;

    /// Is `subject` allowed to perform `action` on `resource`?
    async fn check(
        &self,
        subject: &Subject,
        action: &str,
        resource: &ResourceDescriptor,
    ) -> Result<bool, PolicyCheckError>;

    /// Return the subset of `resources` the subject may perform `action` on,
    /// in input order.
    ///
    /// The default runs one `check` per resource, sequentially, and has
    /// nowhere to put `context`. Backends with a bulk endpoint should
    /// override it.
    async fn filter(
        &self,
        subject: &Subject,
        action: &str,
        _context: &CheckContext,
        resources: &[ResourceDescriptor],
    ) -> Result<Vec<ResourceDescriptor>, PolicyCheckError> {
        let mut allowed = Vec::with_capacity(resources.len());
        for resource in resources {
            if self.check(subject, action, resource).await? {
                allowed.push(resource.clone());
            }
        }
        Ok(allowed)
    }

    async fn health_check(&self) -> Result<bool, PolicyCheckError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Allows only resources whose `classification` attribute is "public".
    struct PublicOnly;

    #[async_trait]
    impl PolicyDecisionPoint for PublicOnly {
        fn name(&self) -> &str {
            "public-only"
        }

        async fn check(
            &self,
            _subject: &Subject,
            _action: &str,
            resource: &ResourceDescriptor,
        ) -> Result<bool, PolicyCheckError> {
            match resource.attribute("classification").and_then(|v| v.as_str()) {
                Some("public") => Ok(true),
                Some(_) => Ok(false),
                None => Err(PolicyCheckError::InvalidResponse("no classification".into())),
            }
        }
    }

    fn doc(key: &str, classification: &str) -> ResourceDescriptor {
        ResourceDescriptor::new("financial_document")
            .with_key(key)
            .with_attribute("classification", classification)
    }

    #[tokio::test]
    async fn default_filter_keeps_input_order() {
        let pdp = PublicOnly;
        let subject = Subject::new("u1");
        let resources = vec![
            doc("a", "public"),
            doc("b", "confidential"),
            doc("c", "public"),
        ];
        let allowed = pdp.filter(&subject, "read", &CheckContext::new(), &resources).await.unwrap();
        let keys: Vec<_> = allowed.iter().filter_map(|r| r.key.as_deref()).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn default_filter_propagates_errors() {
        let pdp = PublicOnly;
        let resources = vec![doc("a", "public"), ResourceDescriptor::new("financial_document")];
        let err = pdp
            .filter(&Subject::new("u1"), "read", &CheckContext::new(), &resources)
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyCheckError::InvalidResponse(_)));
    }
}
