use serde::{Deserialize, Serialize};

/// Probability cut-offs for the coarse risk buckets.
/// High when p > `high`, Medium when p > `medium`, Low otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub high:   f64,
    pub medium: f64,
}

/// Externally supplied cost constants for the financial-impact report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialConstants {
    /// Cost of one retention intervention, per customer.
    pub retention_cost_estimate: f64,
    /// Fraction of targeted churners a retention program keeps.
    pub retention_success_rate:  f64,
    pub months_per_year:         f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnConfig {
    /// `prediction` is Yes when the churn probability is above this.
    pub decision_threshold:       f64,
    pub risk_thresholds:          RiskThresholds,
    pub max_risk_factors:         usize,
    pub max_actions:              usize,
    /// Groups and segments smaller than this are reported as insufficient.
    pub min_sample_size:          usize,
    pub significance_level:       f64,
    pub feature_importance_top_n: usize,
    pub financial:                FinancialConstants,
}

impl ChurnConfig {
    /// Load `{data_dir}/config/churn_config.json`.
    /// In tests, use ChurnConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/config/churn_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: ChurnConfig = serde_json::from_str(&content)?;
        config.validate()?;
        log::info!("config loaded from {path}");
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let t = &self.risk_thresholds;
        if !(0.0..=1.0).contains(&t.medium) || !(0.0..=1.0).contains(&t.high) || t.medium > t.high {
            anyhow::bail!("risk thresholds must satisfy 0 <= medium <= high <= 1, got {t:?}");
        }
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            anyhow::bail!("decision threshold {} outside [0, 1]", self.decision_threshold);
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            anyhow::bail!("significance level {} outside (0, 1)", self.significance_level);
        }
        if self.min_sample_size == 0 {
            anyhow::bail!("min_sample_size must be at least 1");
        }
        let f = &self.financial;
        if !(0.0..=1.0).contains(&f.retention_success_rate) || f.months_per_year <= 0.0 {
            anyhow::bail!("invalid financial constants {f:?}");
        }
        Ok(())
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self {
            decision_threshold: 0.5,
            risk_thresholds: RiskThresholds {
                high:   0.70,
                medium: 0.50,
            },
            max_risk_factors: 5,
            max_actions: 3,
            min_sample_size: 5,
            significance_level: 0.05,
            feature_importance_top_n: 5,
            financial: FinancialConstants {
                retention_cost_estimate: 300.0,
                retention_success_rate:  0.25,
                months_per_year:         12.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_test_is_valid() {
        assert!(ChurnConfig::default_test().validate().is_ok());
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let mut c = ChurnConfig::default_test();
        c.risk_thresholds.medium = 0.8;
        assert!(c.validate().is_err());
    }
}
