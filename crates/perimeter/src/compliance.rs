//! Fixed compliance text appended by the response gate.

use crate::classify::RiskCategory;
use advisorguard_core::CertificationLevel;

/// Appended to the answer once, when it contains advice.
pub const AI_ADVICE_DISCLAIMER: &str = "\n\nIMPORTANT DISCLAIMER: This is AI-generated financial advice. \
This information is for educational purposes only and should not be considered as professional \
financial advice. Always consult with a qualified financial advisor before making investment decisions.";

pub const DIVERSIFICATION_WARNING: &str =
    "Diversification does not guarantee a profit or protect against loss in a declining market.";

const BASE_DISCLAIMERS: &[&str] = &[
    "This information is for educational purposes only and does not constitute personalized financial advice.",
    "Past performance does not guarantee future results.",
];

const PROFESSIONAL_DISCLAIMERS: &[&str] = &[
    "Investment recommendations should be reviewed against your complete financial situation and risk tolerance.",
];

const EXPERT_DISCLAIMERS: &[&str] = &[
    "Investment recommendations should be reviewed against your complete financial situation and risk tolerance.",
    "Complex strategies may involve derivatives, leverage, or tax consequences; consult a qualified tax professional.",
];

/// Disclaimers a response at `level` must carry: the base list plus the
/// level's additions.
pub fn required_disclaimers(level: CertificationLevel) -> Vec<&'static str> {
    let additions = match level {
        CertificationLevel::General => &[][..],
        CertificationLevel::Professional => PROFESSIONAL_DISCLAIMERS,
        CertificationLevel::Expert => EXPERT_DISCLAIMERS,
    };
    BASE_DISCLAIMERS.iter().chain(additions).copied().collect()
}

pub fn risk_warning(category: RiskCategory) -> &'static str {
    match category {
        RiskCategory::Stock => "Stock investments are subject to market volatility and may lose value.",
        RiskCategory::Bond => {
            "Bond prices move inversely to interest rates; fixed-income investments carry interest rate and credit risk."
        }
        RiskCategory::International => {
            "International investments involve currency, political, and economic risks."
        }
        RiskCategory::SmallCap => {
            "Small-cap stocks may be more volatile and less liquid than large-cap stocks."
        }
        RiskCategory::HighYield => {
            "High-yield bonds carry a greater risk of default than investment-grade bonds."
        }
    }
}

/// Warnings for the detected instrument families, followed by the
/// diversification warning when there is at least one.
pub fn risk_warnings(terms: &[RiskCategory]) -> Vec<&'static str> {
    let mut warnings: Vec<&'static str> = terms.iter().map(|c| risk_warning(*c)).collect();
    if !warnings.is_empty() {
        warnings.push(DIVERSIFICATION_WARNING);
    }
    warnings
}
