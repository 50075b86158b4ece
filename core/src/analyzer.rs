//! StatisticalAnalyzer: population-level tests, segments and aggregates.
//!
//! RULE: No statistic is ever computed from a group smaller than
//! `min_sample_size`. Single operations return
//! `ChurnError::InsufficientData`; `analyze()` records those as
//! `insufficient` entries and carries on with the rest of the report.
//!
//! Per-category maps are BTreeMaps so that output order is stable.

use crate::{
    config::{ChurnConfig, FinancialConstants},
    customer::{Contract, CustomerRecord, InternetService, AddOn, PaymentMethod},
    error::{ChurnError, ChurnResult},
    features::Feature,
    model::{ModelBundle, ModelMetrics},
    population::Population,
    stats,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Variables ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoricalVariable {
    SeniorCitizen,
    Partner,
    Dependents,
    Contract,
    PaymentMethod,
    PaperlessBilling,
    InternetService,
}

impl CategoricalVariable {
    pub const ALL: [CategoricalVariable; 7] = [
        CategoricalVariable::SeniorCitizen,
        CategoricalVariable::Partner,
        CategoricalVariable::Dependents,
        CategoricalVariable::Contract,
        CategoricalVariable::PaymentMethod,
        CategoricalVariable::PaperlessBilling,
        CategoricalVariable::InternetService,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::SeniorCitizen    => "SeniorCitizen",
            Self::Partner          => "Partner",
            Self::Dependents       => "Dependents",
            Self::Contract         => "Contract",
            Self::PaymentMethod    => "PaymentMethod",
            Self::PaperlessBilling => "PaperlessBilling",
            Self::InternetService  => "InternetService",
        }
    }

    pub fn category(&self, r: &CustomerRecord) -> &'static str {
        match self {
            Self::SeniorCitizen    => if r.senior_citizen { "1" } else { "0" },
            Self::Partner          => r.partner.as_str(),
            Self::Dependents       => r.dependents.as_str(),
            Self::Contract         => r.contract.as_str(),
            Self::PaymentMethod    => r.payment_method.as_str(),
            Self::PaperlessBilling => r.paperless_billing.as_str(),
            Self::InternetService  => r.internet_service.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContinuousVariable {
    Tenure,
    MonthlyCharges,
    TotalCharges,
}

impl ContinuousVariable {
    pub const ALL: [ContinuousVariable; 3] = [
        ContinuousVariable::Tenure,
        ContinuousVariable::MonthlyCharges,
        ContinuousVariable::TotalCharges,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Tenure         => "tenure",
            Self::MonthlyCharges => "MonthlyCharges",
            Self::TotalCharges   => "TotalCharges",
        }
    }

    pub fn value(&self, r: &CustomerRecord) -> f64 {
        match self {
            Self::Tenure         => f64::from(r.tenure),
            Self::MonthlyCharges => r.monthly_charges,
            Self::TotalCharges   => r.total_charges,
        }
    }
}

// ── Results ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestKind {
    #[serde(rename = "chi-square")]
    ChiSquare,
    #[serde(rename = "mann-whitney-u")]
    MannWhitneyU,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalTestResult {
    pub variable:           String,
    pub test_kind:          TestKind,
    pub statistic:          f64,
    pub p_value:            f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degrees_of_freedom: Option<usize>,
    pub significant:        bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub label:        String,
    /// Percentage, one decimal.
    pub churn_rate:   f64,
    pub size:         usize,
    /// Share of the population, percentage, one decimal.
    pub pct_of_total: f64,
}

/// A test or segment that was skipped for lack of data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsufficientResult {
    pub subject:  String,
    pub required: usize,
    pub actual:   usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialImpact {
    pub avg_monthly_loss:             f64,
    pub avg_annual_loss_per_customer: f64,
    pub total_annual_exposure:        f64,
    pub avg_customer_lifetime_months: f64,
    pub retention_cost_estimate:      f64,
    pub roi_per_saved_customer:       f64,
    /// Expected annual loss per customer across the whole base.
    pub avg_loss_per_customer:        f64,
    /// Net gain if the retention program reaches every churner.
    pub roi_potential:                f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnSplit {
    #[serde(rename = "Yes")]
    pub yes: f64,
    #[serde(rename = "No")]
    pub no:  f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature:    Feature,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_customers:    usize,
    pub churned_customers:  usize,
    pub overall_churn_rate: ChurnSplit,
    /// Category → churn percentage.
    pub contract_impact:    BTreeMap<String, f64>,
    pub payment_impact:     BTreeMap<String, f64>,
    pub internet_impact:    BTreeMap<String, f64>,
    pub feature_importance: Vec<FeatureImportance>,
    pub model_version:      String,
    pub model_metrics:      ModelMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub statistical_tests: Vec<StatisticalTestResult>,
    pub segments:          Vec<Segment>,
    /// Exhaustive, mutually exclusive partition by contract type.
    pub contract_segments: Vec<Segment>,
    pub financial_impact:  Option<FinancialImpact>,
    pub insufficient:      Vec<InsufficientResult>,
}

// ── Segment rules ────────────────────────────────────────────────────────────

pub struct SegmentRule {
    pub label:   &'static str,
    pub matches: fn(&CustomerRecord) -> bool,
}

pub static SEGMENT_RULES: [SegmentRule; 5] = [
    SegmentRule {
        label:   "Month-to-month + E-check",
        matches: |r| r.contract == Contract::MonthToMonth
            && r.payment_method == PaymentMethod::ElectronicCheck,
    },
    SegmentRule {
        label:   "Two year + Auto-payment",
        matches: |r| r.contract == Contract::TwoYear && r.payment_method.is_automatic(),
    },
    SegmentRule {
        label:   "Senior + Month-to-month",
        matches: |r| r.senior_citizen && r.contract == Contract::MonthToMonth,
    },
    SegmentRule {
        label:   "Fiber + No Security",
        matches: |r| r.internet_service == InternetService::FiberOptic
            && r.online_security == AddOn::No,
    },
    SegmentRule {
        label:   "New Customer (<6mo)",
        matches: |r| r.tenure <= 6,
    },
];

// ── Analyzer ─────────────────────────────────────────────────────────────────

pub struct StatisticalAnalyzer {
    pub min_sample_size:    usize,
    pub significance_level: f64,
}

impl StatisticalAnalyzer {
    pub fn new(min_sample_size: usize, significance_level: f64) -> Self {
        Self { min_sample_size, significance_level }
    }

    pub fn from_config(config: &ChurnConfig) -> Self {
        Self::new(config.min_sample_size, config.significance_level)
    }

    fn require(&self, subject: &str, actual: usize) -> ChurnResult<()> {
        let required = self.min_sample_size.max(1);
        if actual < required {
            log::warn!("insufficient data for {subject}: {actual} < {required}");
            return Err(ChurnError::insufficient(subject, required, actual));
        }
        Ok(())
    }

    fn require_groups(&self, variable: &str, population: &Population) -> ChurnResult<()> {
        let churned = population.churned_count();
        self.require(&format!("{variable} (churned group)"), churned)?;
        self.require(&format!("{variable} (retained group)"), population.len() - churned)
    }

    /// Chi-square test of independence between churn and `variable`.
    pub fn chi_square_test(
        &self,
        population: &Population,
        variable: CategoricalVariable,
    ) -> ChurnResult<StatisticalTestResult> {
        self.require_groups(variable.name(), population)?;

        // category → [churned, retained]
        let mut counts: BTreeMap<&'static str, [f64; 2]> = BTreeMap::new();
        for c in population.customers() {
            let cell = counts.entry(variable.category(&c.record)).or_insert([0.0, 0.0]);
            cell[if c.churned { 0 } else { 1 }] += 1.0;
        }
        let observed = vec![
            counts.values().map(|c| c[0]).collect::<Vec<_>>(),
            counts.values().map(|c| c[1]).collect::<Vec<_>>(),
        ];

        let result = stats::chi_square_contingency(&observed).ok_or_else(|| {
            ChurnError::Other(anyhow::anyhow!("degenerate contingency table for {}", variable.name()))
        })?;
        log::debug!(
            "chi-square {}: stat={:.4} dof={} p={:.6}",
            variable.name(),
            result.statistic,
            result.dof,
            result.p_value
        );

        Ok(StatisticalTestResult {
            variable:           variable.name().to_string(),
            test_kind:          TestKind::ChiSquare,
            statistic:          result.statistic,
            p_value:            result.p_value,
            degrees_of_freedom: Some(result.dof),
            significant:        result.p_value < self.significance_level,
        })
    }

    /// Mann-Whitney U of churned against retained customers on `variable`.
    /// The statistic is U of the churned group.
    pub fn mann_whitney_test(
        &self,
        population: &Population,
        variable: ContinuousVariable,
    ) -> ChurnResult<StatisticalTestResult> {
        self.require_groups(variable.name(), population)?;

        let churned: Vec<f64> = population.churned().map(|c| variable.value(&c.record)).collect();
        let retained: Vec<f64> = population.retained().map(|c| variable.value(&c.record)).collect();

        let result = stats::mann_whitney_u(&churned, &retained).ok_or_else(|| {
            ChurnError::insufficient(variable.name(), self.min_sample_size, 0)
        })?;
        log::debug!(
            "mann-whitney {}: U={:.1} p={:.6}",
            variable.name(),
            result.statistic,
            result.p_value
        );

        Ok(StatisticalTestResult {
            variable:           variable.name().to_string(),
            test_kind:          TestKind::MannWhitneyU,
            statistic:          result.statistic,
            p_value:            result.p_value,
            degrees_of_freedom: None,
            significant:        result.p_value < self.significance_level,
        })
    }

    /// Churn rate of the customers matching `predicate`.
    pub fn segment(
        &self,
        population: &Population,
        label: &str,
        predicate: impl Fn(&CustomerRecord) -> bool,
    ) -> ChurnResult<Segment> {
        let (size, churned) = population
            .customers()
            .iter()
            .filter(|c| predicate(&c.record))
            .fold((0usize, 0usize), |(n, k), c| (n + 1, k + usize::from(c.churned)));
        self.require(label, size)?;

        Ok(Segment {
            label:        label.to_string(),
            churn_rate:   round_to(churned as f64 / size as f64 * 100.0, 1),
            size,
            pct_of_total: round_to(size as f64 / population.len() as f64 * 100.0, 1),
        })
    }

    pub fn rule_segment(&self, population: &Population, rule: &SegmentRule) -> ChurnResult<Segment> {
        self.segment(population, rule.label, rule.matches)
    }

    /// One segment per contract type that occurs, in vocabulary order.
    pub fn contract_partition(&self, population: &Population) -> Vec<ChurnResult<Segment>> {
        Contract::ALL
            .iter()
            .filter(|ct| population.customers().iter().any(|c| c.record.contract == **ct))
            .map(|ct| self.segment(population, ct.as_str(), |r| r.contract == *ct))
            .collect()
    }

    /// Loss figures for the churned subgroup combined with the configured
    /// cost constants.
    pub fn financial_impact(
        &self,
        population: &Population,
        constants: &FinancialConstants,
    ) -> ChurnResult<FinancialImpact> {
        let churned: Vec<&CustomerRecord> = population.churned().map(|c| &c.record).collect();
        self.require("financial impact (churned group)", churned.len())?;

        let n = churned.len() as f64;
        let avg_monthly = churned.iter().map(|r| r.monthly_charges).sum::<f64>() / n;
        let avg_tenure = churned.iter().map(|r| f64::from(r.tenure)).sum::<f64>() / n;
        let annual = avg_monthly * constants.months_per_year;
        let roi_per_saved = annual - constants.retention_cost_estimate;

        Ok(FinancialImpact {
            avg_monthly_loss:             round_to(avg_monthly, 2),
            avg_annual_loss_per_customer: round_to(annual, 2),
            total_annual_exposure:        round_to(annual * n, 2),
            avg_customer_lifetime_months: round_to(avg_tenure, 1),
            retention_cost_estimate:      constants.retention_cost_estimate,
            roi_per_saved_customer:       round_to(roi_per_saved, 2),
            avg_loss_per_customer:        round_to(population.churn_rate() * annual, 2),
            roi_potential:                round_to(roi_per_saved * n * constants.retention_success_rate, 2),
        })
    }

    pub fn aggregate_stats(
        &self,
        population: &Population,
        bundle: &ModelBundle,
        top_n: usize,
    ) -> ChurnResult<AggregateStats> {
        if population.is_empty() {
            return Err(ChurnError::insufficient("population", 1, 0));
        }
        let rate = population.churn_rate();

        Ok(AggregateStats {
            total_customers:    population.len(),
            churned_customers:  population.churned_count(),
            overall_churn_rate: ChurnSplit {
                yes: round_to(rate, 4),
                no:  round_to(1.0 - rate, 4),
            },
            contract_impact:    churn_by_category(population, CategoricalVariable::Contract),
            payment_impact:     churn_by_category(population, CategoricalVariable::PaymentMethod),
            internet_impact:    churn_by_category(population, CategoricalVariable::InternetService),
            feature_importance: importance_ranking(bundle, top_n),
            model_version:      bundle.metadata.version.clone(),
            model_metrics:      bundle.metadata.metrics.clone(),
        })
    }

    /// Full report. Only InsufficientData is absorbed; any other error
    /// aborts.
    pub fn analyze(
        &self,
        population: &Population,
        constants: &FinancialConstants,
    ) -> ChurnResult<Analysis> {
        let mut insufficient = Vec::new();

        let mut statistical_tests = Vec::new();
        for var in CategoricalVariable::ALL {
            if let Some(t) = absorb(self.chi_square_test(population, var), &mut insufficient)? {
                statistical_tests.push(t);
            }
        }
        for var in ContinuousVariable::ALL {
            if let Some(t) = absorb(self.mann_whitney_test(population, var), &mut insufficient)? {
                statistical_tests.push(t);
            }
        }

        let mut segments = Vec::new();
        for rule in &SEGMENT_RULES {
            if let Some(s) = absorb(self.rule_segment(population, rule), &mut insufficient)? {
                segments.push(s);
            }
        }

        let mut contract_segments = Vec::new();
        for result in self.contract_partition(population) {
            if let Some(s) = absorb(result, &mut insufficient)? {
                contract_segments.push(s);
            }
        }

        let financial_impact = absorb(self.financial_impact(population, constants), &mut insufficient)?;

        log::info!(
            "analysis over {} customers: {} tests, {} segments, {} insufficient",
            population.len(),
            statistical_tests.len(),
            segments.len(),
            insufficient.len()
        );

        Ok(Analysis {
            statistical_tests,
            segments,
            contract_segments,
            financial_impact,
            insufficient,
        })
    }
}

fn absorb<T>(result: ChurnResult<T>, insufficient: &mut Vec<InsufficientResult>) -> ChurnResult<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(ChurnError::InsufficientData { subject, required, actual }) => {
            insufficient.push(InsufficientResult { subject, required, actual });
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Category → churn percentage among customers in that category.
pub fn churn_by_category(population: &Population, variable: CategoricalVariable) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for c in population.customers() {
        let e = counts.entry(variable.category(&c.record).to_string()).or_insert((0, 0));
        e.0 += 1;
        e.1 += usize::from(c.churned);
    }
    counts
        .into_iter()
        .map(|(k, (n, churned))| (k, churned as f64 / n as f64 * 100.0))
        .collect()
}

/// Features by averaged member importance, descending; ties keep
/// declaration order.
pub fn importance_ranking(bundle: &ModelBundle, top_n: usize) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = Feature::ALL
        .iter()
        .map(|&feature| FeatureImportance {
            feature,
            importance: bundle.averaged_importance(feature),
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked.truncate(top_n);
    ranked
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
