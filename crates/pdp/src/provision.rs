//! Push a [`PolicyCatalog`] to the PDP's management API.
//!
//! Provisioning is a one-time setup step. Every item is sent on its own;
//! an item that fails is logged and counted and the run continues, so a
//! re-run against an already provisioned project reports conflicts but still
//! creates anything missing.

use crate::catalog::{ConditionSetKind, PolicyCatalog};
use advisorguard_config::PdpConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Management API unreachable: {0}")]
    Network(String),

    #[error("Management API rejected the API key")]
    Unauthorized,

    #[error("Management API error: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Management API response could not be decoded: {0}")]
    InvalidResponse(String),

    #[error("No PDP API key configured (set ADVISORGUARD_PDP_KEY)")]
    MissingApiKey,
}

/// Project and environment the API key is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiScope {
    pub project_id: String,
    pub environment_id: String,
}

/// Outcome of one provisioning run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub created: usize,
    /// `"<kind> <key>: <error>"` per failed item, in push order.
    pub failures: Vec<String>,
}

impl ProvisionReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ProvisioningClient {
    api_url: String,
    api_key: String,
    tenant: String,
    client: reqwest::Client,
}

impl ProvisioningClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ProvisionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProvisionError::Network(e.to_string()))?;

        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            tenant: advisorguard_core::resource::DEFAULT_TENANT.into(),
            client,
        })
    }

    pub fn from_config(config: &PdpConfig) -> Result<Self, ProvisionError> {
        let key = config.api_key.as_deref().ok_or(ProvisionError::MissingApiKey)?;
        Ok(Self::new(&config.api_url, key)?.with_tenant(&config.tenant))
    }

    /// Tenant used for seed-user role assignments.
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProvisionError> {
        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(ProvisionError::Unauthorized);
        }
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Api {
                status_code: status,
                message,
            });
        }
        Ok(response)
    }

    pub async fn scope(&self) -> Result<ApiScope, ProvisionError> {
        let url = format!("{}/v2/api-key/scope", self.api_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ProvisionError::Network(e.to_string()))?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ProvisionError::InvalidResponse(e.to_string()))
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<(), ProvisionError> {
        let url = format!("{}{}", self.api_url, path);
        debug!(url = %url, "Provisioning item");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProvisionError::Network(e.to_string()))?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn push(&self, report: &mut ProvisionReport, kind: &str, key: &str, path: &str, body: serde_json::Value) {
        match self.post(path, &body).await {
            Ok(()) => {
                info!(kind, key, "Created");
                report.created += 1;
            }
            Err(e) => {
                warn!(kind, key, error = %e, "Failed to create");
                report.failures.push(format!("{kind} {key}: {e}"));
            }
        }
    }

    /// Push every item of `catalog`. Only a failure to resolve the API
    /// key's scope aborts the run.
    pub async fn provision(&self, catalog: &PolicyCatalog) -> Result<ProvisionReport, ProvisionError> {
        let scope = self.scope().await?;
        let schema = format!("/v2/schema/{}/{}", scope.project_id, scope.environment_id);
        let facts = format!("/v2/facts/{}/{}", scope.project_id, scope.environment_id);
        info!(catalog = %catalog.name, project = %scope.project_id, env = %scope.environment_id, "Provisioning catalog");

        let mut report = ProvisionReport::default();

        for resource in &catalog.resources {
            let actions: serde_json::Map<String, serde_json::Value> = resource
                .actions
                .iter()
                .map(|a| (a.clone(), serde_json::json!({})))
                .collect();
            let body = serde_json::json!({
                "key": resource.key,
                "name": resource.name,
                "description": resource.description,
                "actions": actions,
                "attributes": resource.attributes,
            });
            self.push(&mut report, "resource", &resource.key, &format!("{schema}/resources"), body)
                .await;
        }

        for role in &catalog.roles {
            let body = serde_json::json!({
                "key": role.key,
                "name": role.name,
                "description": role.description,
                "permissions": role.permissions,
            });
            self.push(&mut report, "role", &role.key, &format!("{schema}/roles"), body)
                .await;
        }

        for set in &catalog.condition_sets {
            let mut body = serde_json::json!({
                "key": set.key,
                "name": set.name,
                "type": match set.kind {
                    ConditionSetKind::UserSet => "userset",
                    ConditionSetKind::ResourceSet => "resourceset",
                },
                "conditions": set.conditions,
            });
            if let Some(resource_type) = &set.resource_type {
                body["resource_id"] = serde_json::json!(resource_type);
            }
            self.push(&mut report, "condition set", &set.key, &format!("{schema}/condition_sets"), body)
                .await;
        }

        for rule in &catalog.set_rules {
            let key = format!("{}:{}:{}", rule.user_set, rule.permission, rule.resource_set);
            let body = serde_json::json!({
                "user_set": rule.user_set,
                "permission": rule.permission,
                "resource_set": rule.resource_set,
            });
            self.push(&mut report, "set rule", &key, &format!("{facts}/set_rules"), body)
                .await;
        }

        for user in &catalog.users {
            let body = serde_json::json!({
                "key": user.key,
                "email": user.email,
                "attributes": user.attributes,
            });
            self.push(&mut report, "user", &user.key, &format!("{facts}/users"), body)
                .await;

            for role in &user.roles {
                let body = serde_json::json!({ "role": role, "tenant": self.tenant });
                self.push(
                    &mut report,
                    "role assignment",
                    &format!("{}={role}", user.key),
                    &format!("{facts}/users/{}/roles", user.key),
                    body,
                )
                .await;
            }
        }

        info!(created = report.created, failed = report.failed(), "Provisioning finished");
        Ok(report)
    }
}
