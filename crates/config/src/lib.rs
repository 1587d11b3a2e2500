//! Configuration loading and validation for AdvisorGuard.
//!
//! Loads configuration from `~/.advisorguard/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.advisorguard/config.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Policy decision point connection
    #[serde(default)]
    pub pdp: PdpConfig,

    /// Language model provider
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Orchestrator settings
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub prompt: PromptGateConfig,

    #[serde(default)]
    pub retrieval: RetrievalGateConfig,

    #[serde(default)]
    pub response: ResponseGateConfig,

    /// Knowledge-base documents
    #[serde(default)]
    pub documents: DocumentsConfig,

    /// Which policy catalog `provision` and `catalog` operate on
    #[serde(default)]
    pub catalog: CatalogConfig,
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("pdp", &self.pdp)
            .field("provider", &self.provider)
            .field("agent", &self.agent)
            .field("prompt", &self.prompt)
            .field("retrieval", &self.retrieval)
            .field("response", &self.response)
            .field("documents", &self.documents)
            .field("catalog", &self.catalog)
            .finish()
    }
}

// --- PDP ---

#[derive(Clone, Serialize, Deserialize)]
pub struct PdpConfig {
    /// Base URL of the decision endpoint (`/allowed`, `/allowed/bulk`).
    #[serde(default = "default_pdp_url")]
    pub url: String,

    /// Base URL of the management API used by `provision`.
    #[serde(default = "default_pdp_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_tenant")]
    pub tenant: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_pdp_url() -> String {
    "http://localhost:7766".into()
}
fn default_pdp_api_url() -> String {
    "https://api.permit.io".into()
}
fn default_tenant() -> String {
    "default".into()
}
fn default_timeout_secs() -> u64 {
    10
}

impl Default for PdpConfig {
    fn default() -> Self {
        Self {
            url: default_pdp_url(),
            api_url: default_pdp_api_url(),
            api_key: None,
            tenant: default_tenant(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for PdpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdpConfig")
            .field("url", &self.url)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("tenant", &self.tenant)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// --- Provider ---

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_provider_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    2048
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_provider_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

// --- Agent ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum LLM round trips per turn.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Replaces the built-in advisor system prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_iterations() -> usize {
    8
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            system_prompt: None,
        }
    }
}

// --- Prompt gate ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptGateConfig {
    #[serde(default = "default_prompt_resource")]
    pub resource_type: String,

    #[serde(default = "default_prompt_action")]
    pub action: String,

    /// Resource checked when the query carries a portfolio value.
    #[serde(default = "default_portfolio_resource")]
    pub portfolio_resource_type: String,

    #[serde(default = "default_portfolio_action")]
    pub portfolio_action: String,
}

fn default_prompt_resource() -> String {
    "financial_advice".into()
}
fn default_prompt_action() -> String {
    "receive".into()
}
fn default_portfolio_resource() -> String {
    "financial_analysis".into()
}
fn default_portfolio_action() -> String {
    "analyze_portfolio".into()
}

impl Default for PromptGateConfig {
    fn default() -> Self {
        Self {
            resource_type: default_prompt_resource(),
            action: default_prompt_action(),
            portfolio_resource_type: default_portfolio_resource(),
            portfolio_action: default_portfolio_action(),
        }
    }
}

// --- Retrieval gate ---

/// How the retrieval gate asks the PDP about a document set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// One bulk filter call.
    #[default]
    Batch,
    /// One check per document, issued concurrently.
    PerDocument,
}

/// Categories unlocked by one documentation permission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTier {
    pub action: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalGateConfig {
    #[serde(default)]
    pub strategy: RetrievalStrategy,

    #[serde(default = "default_document_resource")]
    pub resource_type: String,

    #[serde(default = "default_read_action")]
    pub action: String,

    /// Resource type for category tier checks.
    #[serde(default = "default_category_resource")]
    pub category_resource_type: String,

    /// Categories every user may read.
    #[serde(default = "default_base_categories")]
    pub base_categories: Vec<String>,

    #[serde(default = "default_category_tiers")]
    pub category_tiers: Vec<CategoryTier>,
}

fn default_document_resource() -> String {
    "financial_document".into()
}
fn default_read_action() -> String {
    "read".into()
}
fn default_category_resource() -> String {
    "documentation".into()
}
fn default_base_categories() -> Vec<String> {
    vec!["general_advice".into(), "market_basics".into()]
}
fn default_category_tiers() -> Vec<CategoryTier> {
    vec![
        CategoryTier {
            action: "access_professional_docs".into(),
            categories: vec![
                "portfolio_analysis".into(),
                "retirement_planning".into(),
                "tax_planning".into(),
            ],
        },
        CategoryTier {
            action: "access_expert_docs".into(),
            categories: vec![
                "advanced_strategies".into(),
                "derivatives".into(),
                "estate_planning".into(),
            ],
        },
    ]
}

impl Default for RetrievalGateConfig {
    fn default() -> Self {
        Self {
            strategy: RetrievalStrategy::default(),
            resource_type: default_document_resource(),
            action: default_read_action(),
            category_resource_type: default_category_resource(),
            base_categories: default_base_categories(),
            category_tiers: default_category_tiers(),
        }
    }
}

// --- Response gate ---

/// Who decides whether a response contains advice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    /// The local keyword classifier decides; the PDP only gates the disclaimer.
    #[default]
    Local,
    /// The PDP's answer decides; the local result is sent as a hint.
    Policy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseGateConfig {
    #[serde(default)]
    pub classification_source: ClassificationSource,

    #[serde(default = "default_response_resource")]
    pub resource_type: String,

    #[serde(default = "default_disclaimer_action")]
    pub action: String,

    #[serde(default = "default_compliance_resource")]
    pub compliance_resource_type: String,

    #[serde(default = "default_compliance_action")]
    pub compliance_action: String,

    /// Run the delivery check (receive + premium) before returning a response.
    #[serde(default)]
    pub check_delivery: bool,
}

fn default_response_resource() -> String {
    "financial_response".into()
}
fn default_disclaimer_action() -> String {
    "requires_disclaimer".into()
}
fn default_compliance_resource() -> String {
    "response".into()
}
fn default_compliance_action() -> String {
    "compliance_validation".into()
}

impl Default for ResponseGateConfig {
    fn default() -> Self {
        Self {
            classification_source: ClassificationSource::default(),
            resource_type: default_response_resource(),
            action: default_disclaimer_action(),
            compliance_resource_type: default_compliance_resource(),
            compliance_action: default_compliance_action(),
            check_delivery: false,
        }
    }
}

// --- Documents & catalog ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// TOML file with `[[documents]]` entries. The sample set is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// A built-in catalog name (`perimeters`, `tiers`, `certification`) or a
    /// path to a catalog TOML file.
    #[serde(default = "default_catalog")]
    pub source: String,
}

fn default_catalog() -> String {
    "perimeters".into()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            source: default_catalog(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.advisorguard/config.toml).
    ///
    /// Environment variables override the file:
    /// - `ADVISORGUARD_PDP_KEY` (falls back to `PDP_API_KEY`)
    /// - `ADVISORGUARD_PDP_URL`
    /// - `ANTHROPIC_API_KEY`
    /// - `ADVISORGUARD_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ADVISORGUARD_PDP_KEY").or_else(|| lookup("PDP_API_KEY")) {
            self.pdp.api_key = Some(key);
        }
        if let Some(url) = lookup("ADVISORGUARD_PDP_URL") {
            self.pdp.url = url;
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(model) = lookup("ADVISORGUARD_MODEL") {
            self.provider.model = model;
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs_home().join(".advisorguard")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pdp.url.trim().is_empty() {
            return Err(ConfigError::ValidationError("pdp.url must not be empty".into()));
        }

        if self.pdp.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "pdp.timeout_secs must be greater than 0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 1.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        let resource_types = [
            ("prompt.resource_type", &self.prompt.resource_type),
            ("prompt.portfolio_resource_type", &self.prompt.portfolio_resource_type),
            ("retrieval.resource_type", &self.retrieval.resource_type),
            ("retrieval.category_resource_type", &self.retrieval.category_resource_type),
            ("response.resource_type", &self.response.resource_type),
            ("response.compliance_resource_type", &self.response.compliance_resource_type),
        ];
        for (field, value) in resource_types {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!("{field} must not be empty")));
            }
        }

        Ok(())
    }

    pub fn has_pdp_key(&self) -> bool {
        self.pdp.api_key.is_some()
    }

    pub fn has_provider_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pdp.url, "http://localhost:7766");
        assert_eq!(config.pdp.timeout_secs, 10);
        assert_eq!(config.prompt.resource_type, "financial_advice");
        assert_eq!(config.response.classification_source, ClassificationSource::Local);
        assert_eq!(config.retrieval.strategy, RetrievalStrategy::Batch);
    }

    #[test]
    fn config_roundtrip_toml() {
        let toml_str = AppConfig::default_toml();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.pdp.url, "http://localhost:7766");
        assert_eq!(parsed.retrieval.category_tiers.len(), 2);
        assert!(toml_str.contains("financial_advice"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[pdp]
url = "http://pdp.internal:7000"

[retrieval]
strategy = "per_document"

[response]
classification_source = "policy"
check_delivery = true
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.pdp.url, "http://pdp.internal:7000");
        assert_eq!(config.pdp.tenant, "default");
        assert_eq!(config.retrieval.strategy, RetrievalStrategy::PerDocument);
        assert_eq!(config.retrieval.base_categories, vec!["general_advice", "market_basics"]);
        assert_eq!(config.response.classification_source, ClassificationSource::Policy);
        assert!(config.response.check_delivery);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pdp\nurl = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = AppConfig::default();
        config.pdp.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_resource_type_rejected() {
        let mut config = AppConfig::default();
        config.response.compliance_resource_type = " ".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("response.compliance_resource_type"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.catalog.source, "perimeters");
    }

    #[test]
    fn env_overrides_take_priority() {
        let env: HashMap<&str, &str> = [
            ("PDP_API_KEY", "permit_key_fallback"),
            ("ADVISORGUARD_PDP_URL", "http://cloudpdp.example"),
            ("ANTHROPIC_API_KEY", "sk-ant-test"),
            ("ADVISORGUARD_MODEL", "claude-haiku"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(config.pdp.api_key.as_deref(), Some("permit_key_fallback"));
        assert_eq!(config.pdp.url, "http://cloudpdp.example");
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-ant-test"));
        assert_eq!(config.provider.model, "claude-haiku");
    }

    #[test]
    fn primary_pdp_key_wins_over_fallback() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|name| match name {
            "ADVISORGUARD_PDP_KEY" => Some("primary".into()),
            "PDP_API_KEY" => Some("fallback".into()),
            _ => None,
        });
        assert_eq!(config.pdp.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.pdp.api_key = Some("permit_key_secret".into());
        config.provider.api_key = Some("sk-ant-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("permit_key_secret"));
        assert!(!debug.contains("sk-ant-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
