//! Financial domain objects that flow through the perimeters:
//! the user's [`Query`], the [`Document`]s the model may read, and the
//! [`DraftResponse`] the response gate annotates.

use crate::subject::CertificationLevel;
use serde::{Deserialize, Serialize};

/// A user's question plus optional structured context. Read-only within the
/// pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub question: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_profile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_horizon: Option<String>,
}

impl Query {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            portfolio_value: None,
            risk_profile: None,
            investment_horizon: None,
        }
    }

    pub fn with_portfolio_value(mut self, value: f64) -> Self {
        self.portfolio_value = Some(value);
        self
    }

    pub fn with_risk_profile(mut self, profile: impl Into<String>) -> Self {
        self.risk_profile = Some(profile.into());
        self
    }

    pub fn with_investment_horizon(mut self, horizon: impl Into<String>) -> Self {
        self.investment_horizon = Some(horizon.into());
        self
    }

    /// Whether this query asks for portfolio analysis.
    pub fn requests_portfolio_analysis(&self) -> bool {
        self.portfolio_value.is_some()
    }
}

/// A knowledge-base document with a classification level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,

    /// Document type (e.g. "investment", "tax", "retirement").
    #[serde(rename = "type")]
    pub doc_type: String,

    pub content: String,

    /// "public" / "restricted" / "confidential", or a certification tier.
    pub classification: String,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        doc_type: impl Into<String>,
        content: impl Into<String>,
        classification: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            doc_type: doc_type.into(),
            content: content.into(),
            classification: classification.into(),
        }
    }
}

/// The agent's answer before it is released to the user.
///
/// The response gate mutates this in place: it appends disclaimer text and
/// fills the compliance fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftResponse {
    pub answer: String,

    #[serde(default)]
    pub compliance_notes: Vec<String>,

    #[serde(default)]
    pub risk_warnings: Vec<String>,

    #[serde(default)]
    pub disclaimer_added: bool,

    #[serde(default)]
    pub includes_advice: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certification_level: Option<CertificationLevel>,

    #[serde(default)]
    pub used_premium_features: bool,
}

impl DraftResponse {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            ..Self::default()
        }
    }

    pub fn with_certification(mut self, level: CertificationLevel) -> Self {
        self.certification_level = Some(level);
        self
    }

    pub fn with_premium_features(mut self) -> Self {
        self.used_premium_features = true;
        self
    }
}
