//! Text classification used by the prompt and response gates.
//!
//! The gates only depend on the [`Classifier`] trait. [`KeywordClassifier`]
//! is a case-insensitive substring matcher; swap in a model-backed
//! classifier by implementing the trait.

use advisorguard_core::{CertificationLevel, Query};
use serde::{Deserialize, Serialize};

/// Which advice vocabulary applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    /// A user's question: is the user *asking* for advice?
    Prompt,
    /// A drafted answer: does it *give* advice?
    Response,
}

/// Financial instrument families that carry a fixed risk warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Stock,
    Bond,
    International,
    SmallCap,
    HighYield,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 5] = [
        RiskCategory::Stock,
        RiskCategory::Bond,
        RiskCategory::International,
        RiskCategory::SmallCap,
        RiskCategory::HighYield,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub advice: bool,
    /// Certification level the text's subject matter calls for.
    pub category: CertificationLevel,
    /// Instrument families mentioned, in [`RiskCategory::ALL`] order.
    pub risk_terms: Vec<RiskCategory>,
}

pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str, kind: TextKind) -> Classification;
}

const PROMPT_ADVICE: &[&str] = &[
    "should i",
    "recommend",
    "advice",
    "suggest",
    "help me",
    "what's best",
    "what is best",
    "better option",
];

const RESPONSE_ADVICE: &[&str] = &[
    "recommend",
    "should",
    "consider",
    "advise",
    "suggest",
    "better to",
    "optimal",
    "best option",
    "strategy",
    "allocation",
];

const EXPERT_TOPICS: &[&str] = &[
    "derivative",
    "options trading",
    "futures",
    "hedg",
    "leverage",
    "estate planning",
    "tax optimization",
    "alternative investment",
    "private equity",
];

const PROFESSIONAL_TOPICS: &[&str] = &[
    "portfolio",
    "retirement planning",
    "asset allocation",
    "rebalanc",
    "tax",
    "401(k)",
    "ira",
];

fn risk_keywords(category: RiskCategory) -> &'static [&'static str] {
    match category {
        RiskCategory::Stock => &["stock", "equity", "equities", "shares"],
        RiskCategory::Bond => &["bond", "fixed income", "fixed-income", "treasury", "treasuries"],
        RiskCategory::International => &["international", "foreign", "emerging market", "overseas"],
        RiskCategory::SmallCap => &["small-cap", "small cap"],
        RiskCategory::HighYield => &["high-yield", "high yield", "junk bond"],
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Whole-word match, for short keywords that occur inside unrelated words.
fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn category(lower: &str) -> CertificationLevel {
        if contains_any(lower, EXPERT_TOPICS) {
            return CertificationLevel::Expert;
        }
        let professional = PROFESSIONAL_TOPICS.iter().any(|topic| match *topic {
            "ira" | "tax" => contains_word(lower, topic),
            other => lower.contains(other),
        });
        if professional {
            CertificationLevel::Professional
        } else {
            CertificationLevel::General
        }
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str, kind: TextKind) -> Classification {
        let lower = text.to_lowercase();
        let advice = match kind {
            TextKind::Prompt => contains_any(&lower, PROMPT_ADVICE),
            TextKind::Response => contains_any(&lower, RESPONSE_ADVICE),
        };
        let risk_terms = RiskCategory::ALL
            .into_iter()
            .filter(|c| contains_any(&lower, risk_keywords(*c)))
            .collect();

        Classification {
            advice,
            category: Self::category(&lower),
            risk_terms,
        }
    }
}

/// Certification level needed to answer `query`.
///
/// Portfolio size dominates: above 1,000,000 needs an expert, above 100,000
/// a professional. Otherwise the question's topic decides.
pub fn required_certification(query: &Query, classifier: &dyn Classifier) -> CertificationLevel {
    if let Some(value) = query.portfolio_value {
        if value > 1_000_000.0 {
            return CertificationLevel::Expert;
        }
        if value > 100_000.0 {
            return CertificationLevel::Professional;
        }
    }
    classifier.classify(&query.question, TextKind::Prompt).category
}
