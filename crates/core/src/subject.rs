//! The requesting user and the advisor certification tiers.

use crate::resource::Scalar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Coarse advisor-capability tier.
///
/// Ordered: `General < Professional < Expert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificationLevel {
    General,
    Professional,
    Expert,
}

impl CertificationLevel {
    pub const ALL: [CertificationLevel; 3] = [
        CertificationLevel::General,
        CertificationLevel::Professional,
        CertificationLevel::Expert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CertificationLevel::General => "general",
            CertificationLevel::Professional => "professional",
            CertificationLevel::Expert => "expert",
        }
    }
}

impl fmt::Display for CertificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(CertificationLevel::General),
            "professional" => Ok(CertificationLevel::Professional),
            "expert" => Ok(CertificationLevel::Expert),
            other => Err(format!("unknown certification level '{other}'")),
        }
    }
}

/// The user on whose behalf a turn runs.
///
/// Immutable for the duration of a request; gates borrow it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearance_level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_advice_opted_in: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certification_level: Option<CertificationLevel>,
}

impl Subject {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tier: None,
            clearance_level: None,
            ai_advice_opted_in: None,
            certification_level: None,
        }
    }

    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = Some(tier.into());
        self
    }

    pub fn with_clearance(mut self, level: impl Into<String>) -> Self {
        self.clearance_level = Some(level.into());
        self
    }

    pub fn with_opt_in(mut self, opted_in: bool) -> Self {
        self.ai_advice_opted_in = Some(opted_in);
        self
    }

    pub fn with_certification(mut self, level: CertificationLevel) -> Self {
        self.certification_level = Some(level);
        self
    }

    /// The key the PDP knows this user by.
    pub fn key(&self) -> &str {
        &self.user_id
    }

    /// Attributes forwarded with every check. Only set fields are included,
    /// so the PDP falls back to the attributes it has stored for the user.
    pub fn attributes(&self) -> BTreeMap<String, Scalar> {
        let mut attrs = BTreeMap::new();
        if let Some(tier) = &self.tier {
            attrs.insert("tier".into(), Scalar::from(tier.as_str()));
        }
        if let Some(level) = &self.clearance_level {
            attrs.insert("clearance_level".into(), Scalar::from(level.as_str()));
        }
        if let Some(opted_in) = self.ai_advice_opted_in {
            attrs.insert("ai_advice_opted_in".into(), Scalar::Bool(opted_in));
        }
        if let Some(level) = self.certification_level {
            attrs.insert("certification_level".into(), Scalar::from(level.as_str()));
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certification_levels_are_ordered() {
        assert!(CertificationLevel::General < CertificationLevel::Professional);
        assert!(CertificationLevel::Professional < CertificationLevel::Expert);
    }

    #[test]
    fn certification_level_parses_case_insensitively() {
        assert_eq!("Expert".parse::<CertificationLevel>(), Ok(CertificationLevel::Expert));
        assert!("guru".parse::<CertificationLevel>().is_err());
    }

    #[test]
    fn attributes_only_include_set_fields() {
        let subject = Subject::new("user@example.com").with_opt_in(false);
        let attrs = subject.attributes();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs["ai_advice_opted_in"], Scalar::Bool(false));
    }

    #[test]
    fn subject_deserializes_with_defaults() {
        let s: Subject =
            serde_json::from_str(r#"{"user_id": "a", "certification_level": "professional"}"#)
                .unwrap();
        assert_eq!(s.key(), "a");
        assert_eq!(s.certification_level, Some(CertificationLevel::Professional));
        assert!(s.tier.is_none());
    }
}
