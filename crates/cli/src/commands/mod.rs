pub mod ask;
pub mod catalog;
pub mod check;
pub mod doctor;
pub mod onboard;
pub mod provision;

use advisorguard_config::AppConfig;
use advisorguard_core::{CertificationLevel, Query, Scalar, Subject};
use clap::Args;

/// Who the request is made for. Unset attributes are left to the PDP's
/// stored user record.
#[derive(Args, Debug, Clone)]
pub struct SubjectArgs {
    /// User key known to the PDP
    #[arg(short, long, default_value = "user@example.com")]
    pub user: String,

    /// Subscription tier (e.g. "free", "premium")
    #[arg(long)]
    pub tier: Option<String>,

    /// Document clearance (public, restricted, confidential)
    #[arg(long)]
    pub clearance: Option<String>,

    /// Whether the user opted in to AI-generated advice
    #[arg(long)]
    pub opt_in: Option<bool>,

    /// Advisor certification level (general, professional, expert)
    #[arg(long, value_parser = parse_certification)]
    pub certification: Option<CertificationLevel>,
}

impl SubjectArgs {
    pub fn into_subject(self) -> Subject {
        let mut subject = Subject::new(self.user);
        subject.tier = self.tier;
        subject.clearance_level = self.clearance;
        subject.ai_advice_opted_in = self.opt_in;
        subject.certification_level = self.certification;
        subject
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Portfolio value in dollars
    #[arg(long)]
    pub portfolio_value: Option<f64>,

    /// Risk profile (e.g. "conservative", "moderate", "aggressive")
    #[arg(long)]
    pub risk_profile: Option<String>,

    /// Investment horizon (e.g. "5 years")
    #[arg(long)]
    pub horizon: Option<String>,
}

impl QueryArgs {
    pub fn into_query(self, question: String) -> Query {
        let mut query = Query::new(question);
        query.portfolio_value = self.portfolio_value;
        query.risk_profile = self.risk_profile;
        query.investment_horizon = self.horizon;
        query
    }
}

fn parse_certification(s: &str) -> Result<CertificationLevel, String> {
    s.parse()
}

/// Parse `name=value` into an attribute. Values are read as bool, then
/// integer, then float, else kept as a string.
pub fn parse_attribute(raw: &str) -> Result<(String, Scalar), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("attribute '{raw}' is not in NAME=VALUE form"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("attribute '{raw}' has an empty name"));
    }

    let value = value.trim();
    let scalar = if let Ok(b) = value.parse::<bool>() {
        Scalar::Bool(b)
    } else if let Ok(i) = value.parse::<i64>() {
        Scalar::Int(i)
    } else if let Ok(f) = value.parse::<f64>() {
        Scalar::Float(f)
    } else {
        Scalar::from(value)
    };
    Ok((name.to_string(), scalar))
}

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load().map_err(|e| format!("Failed to load config: {e}").into())
}

/// The catalog named on the command line, else the configured one.
pub fn catalog_source(source: Option<String>, config: &AppConfig) -> String {
    source.unwrap_or_else(|| config.catalog.source.clone())
}
