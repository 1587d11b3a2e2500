//! HTTP client for a Permit-compatible policy decision point.
//!
//! Endpoints:
//! - `POST /allowed`: single check, answers `{"allow": bool}`
//! - `POST /allowed/bulk`: ordered list of checks, answers
//!   `{"allow": [{"allow": bool}, ...]}`
//! - `GET /healthy`
//!
//! Authentication is a bearer API key. Any failure to obtain an answer is a
//! [`PolicyCheckError`]; the client never guesses a decision.

use advisorguard_config::PdpConfig;
use advisorguard_core::error::PolicyCheckError;
use advisorguard_core::resource::{ResourceDescriptor, Scalar};
use advisorguard_core::{CheckContext, PolicyDecisionPoint, Subject};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpPdpClient {
    base_url: String,
    api_key: Option<String>,
    tenant: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CheckUser<'a> {
    key: &'a str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, Scalar>,
}

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    user: CheckUser<'a>,
    action: &'a str,
    resource: ResourceDescriptor,
    context: &'a CheckContext,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    allow: bool,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    allow: Vec<CheckResponse>,
}

impl HttpPdpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PolicyCheckError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PolicyCheckError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            tenant: advisorguard_core::resource::DEFAULT_TENANT.into(),
            client,
        })
    }

    pub fn from_config(config: &PdpConfig) -> Result<Self, PolicyCheckError> {
        let mut client = Self::new(&config.url, Duration::from_secs(config.timeout_secs))?
            .with_tenant(&config.tenant);
        if let Some(key) = &config.api_key {
            client = client.with_api_key(key);
        }
        Ok(client)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Tenant stamped on descriptors that still carry the default tenant.
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_for<'a>(
        &self,
        subject: &'a Subject,
        action: &'a str,
        context: &'a CheckContext,
        resource: &ResourceDescriptor,
    ) -> CheckRequest<'a> {
        let mut resource = resource.clone();
        if resource.tenant == advisorguard_core::resource::DEFAULT_TENANT {
            resource.tenant = self.tenant.clone();
        }
        CheckRequest {
            user: CheckUser {
                key: subject.key(),
                attributes: subject.attributes(),
            },
            action,
            resource,
            context,
        }
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, PolicyCheckError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();

        if status == 401 || status == 403 {
            return Err(PolicyCheckError::Unauthorized(format!(
                "PDP rejected the API key (status {status})"
            )));
        }
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "PDP returned error");
            return Err(PolicyCheckError::Api {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

fn transport_error(e: reqwest::Error) -> PolicyCheckError {
    if e.is_timeout() {
        PolicyCheckError::Timeout(e.to_string())
    } else {
        PolicyCheckError::Network(e.to_string())
    }
}

#[async_trait]
impl PolicyDecisionPoint for HttpPdpClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn check(
        &self,
        subject: &Subject,
        action: &str,
        resource: &ResourceDescriptor,
    ) -> Result<bool, PolicyCheckError> {
        let context = CheckContext::new();
        let body = self.request_for(subject, action, &context, resource);
        debug!(
            user = subject.key(),
            action,
            resource = %resource.resource_type,
            "PDP check"
        );

        let response = self.post("/allowed", &body).await?;
        let decision: CheckResponse = response
            .json()
            .await
            .map_err(|e| PolicyCheckError::InvalidResponse(format!("/allowed: {e}")))?;
        Ok(decision.allow)
    }

    async fn filter(
        &self,
        subject: &Subject,
        action: &str,
        context: &CheckContext,
        resources: &[ResourceDescriptor],
    ) -> Result<Vec<ResourceDescriptor>, PolicyCheckError> {
        if resources.is_empty() {
            return Ok(Vec::new());
        }

        let body: Vec<CheckRequest<'_>> = resources
            .iter()
            .map(|r| self.request_for(subject, action, context, r))
            .collect();
        debug!(user = subject.key(), action, count = resources.len(), "PDP bulk check");

        let response = self.post("/allowed/bulk", &body).await?;
        let bulk: BulkResponse = response
            .json()
            .await
            .map_err(|e| PolicyCheckError::InvalidResponse(format!("/allowed/bulk: {e}")))?;

        if bulk.allow.len() != resources.len() {
            return Err(PolicyCheckError::InvalidResponse(format!(
                "bulk check returned {} decisions for {} resources",
                bulk.allow.len(),
                resources.len()
            )));
        }

        Ok(resources
            .iter()
            .zip(bulk.allow)
            .filter(|(_, d)| d.allow)
            .map(|(r, _)| r.clone())
            .collect())
    }

    async fn health_check(&self) -> Result<bool, PolicyCheckError> {
        let url = format!("{}/healthy", self.base_url);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        Ok(response.status().is_success())
    }
}
