//! Per-request prediction output.
//!
//! A PredictionResult carries no timestamp and no id. Persisting it (and
//! stamping it) is the store's job, so two calls with the same record
//! compare equal.
//!
//! RULE: Every cut-off is a strict lower bound. `verdict`, `RiskLevel` and
//! the top two `risk_summary` bands read the same configured thresholds,
//! so a probability sitting exactly on a threshold lands in the lower
//! band for all three labels.

use crate::{
    config::RiskThresholds,
    explainer::RiskFactor,
    strategy::StrategyAction,
    types::Probability,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_probability(p: Probability, thresholds: &RiskThresholds) -> Self {
        if p > thresholds.high {
            RiskLevel::High
        } else if p > thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low    => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High   => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Yes,
    No,
}

impl Verdict {
    pub fn from_probability(p: Probability, decision_threshold: f64) -> Self {
        if p > decision_threshold { Verdict::Yes } else { Verdict::No }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Yes => "Yes",
            Verdict::No  => "No",
        }
    }
}

/// Five-band wording shown next to the score. The top two bands are
/// the High and Medium risk levels; the lower three split Low further.
pub fn risk_summary(p: Probability, thresholds: &RiskThresholds) -> &'static str {
    match RiskLevel::from_probability(p, thresholds) {
        RiskLevel::High   => "Critical Risk",
        RiskLevel::Medium => "High Risk",
        RiskLevel::Low if p > 0.30 => "Moderate Risk",
        RiskLevel::Low if p > 0.15 => "Low Risk",
        RiskLevel::Low    => "Minimal Risk",
    }
}

/// Distance from the decision boundary, scaled to [0, 1].
pub fn confidence(p: Probability) -> f64 {
    ((p - 0.5).abs() * 2.0).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub churn_probability: Probability,
    pub prediction:        Verdict,
    pub risk_level:        RiskLevel,
    pub summary:           String,
    pub confidence:        f64,
    pub risk_factors:      Vec<RiskFactor>,
    pub suggestions:       Vec<StrategyAction>,
    pub model_version:     String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_strict_at_the_boundary() {
        let t = RiskThresholds { high: 0.7, medium: 0.5 };
        assert_eq!(RiskLevel::from_probability(0.71, &t), RiskLevel::High);
        assert_eq!(RiskLevel::from_probability(0.7, &t), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.51, &t), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.5, &t), RiskLevel::Low);
        assert_eq!(Verdict::from_probability(0.5, 0.5), Verdict::No);
        assert_eq!(Verdict::from_probability(0.5001, 0.5), Verdict::Yes);
    }

    #[test]
    fn lower_summary_bands_split_low_risk() {
        let t = RiskThresholds { high: 0.7, medium: 0.5 };
        assert_eq!(risk_summary(0.5, &t), "Moderate Risk");
        assert_eq!(risk_summary(0.3, &t), "Low Risk");
        assert_eq!(risk_summary(0.15, &t), "Minimal Risk");
        assert_eq!(risk_summary(0.0, &t), "Minimal Risk");
    }

    #[test]
    fn confidence_is_zero_at_one_half() {
        assert_eq!(confidence(0.5), 0.0);
        assert!((confidence(0.9) - 0.8).abs() < 1e-12);
        assert!((confidence(0.1) - 0.8).abs() < 1e-12);
    }
}
