//! PredictionService and AnalyticsService: thin composition layers.
//!
//! PredictionService runs, for one record:
//!   1. validate   (RawCustomerRecord → CustomerRecord, FeatureError)
//!   2. derive     (FeatureDeriver)
//!   3. score      (EnsembleScorer)
//!   4. explain    (RiskExplainer)
//!   5. strategize (StrategyGenerator)
//!
//! Both services share the bundle through an `Arc` and never mutate it,
//! so a PredictionService may be cloned into as many threads as needed.

use crate::{
    analyzer::{AggregateStats, Analysis, StatisticalAnalyzer},
    cache::{AnalyticsCache, CachedResult, QueryKey},
    config::ChurnConfig,
    customer::RawCustomerRecord,
    ensemble::EnsembleScorer,
    error::{ChurnError, ChurnResult},
    explainer::RiskExplainer,
    features::FeatureDeriver,
    model::{model_info, ModelBundle, ModelInfo},
    population::Population,
    prediction::{confidence, risk_summary, PredictionResult, RiskLevel, Verdict},
    strategy::StrategyGenerator,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct PredictionService {
    bundle: Arc<ModelBundle>,
    config: ChurnConfig,
}

impl PredictionService {
    pub fn new(bundle: Arc<ModelBundle>, config: ChurnConfig) -> Self {
        Self { bundle, config }
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn predict(&self, raw: &RawCustomerRecord) -> ChurnResult<PredictionResult> {
        let record = raw.validate()?;
        let bundle = &*self.bundle;

        let vector = FeatureDeriver::derive(&record, &bundle.normalization);
        let p = EnsembleScorer::score(&vector, bundle)?;
        if !(0.0..=1.0).contains(&p) {
            return Err(ChurnError::Prediction(format!("ensemble produced {p}")));
        }

        let risk_level = RiskLevel::from_probability(p, &self.config.risk_thresholds);
        let risk_factors = RiskExplainer::explain(&vector, p, bundle, self.config.max_risk_factors);
        let suggestions = StrategyGenerator::generate(
            risk_level,
            &risk_factors,
            &record,
            self.config.max_actions,
            bundle.normalization.high_monthly_charge,
        );

        let prediction = Verdict::from_probability(p, self.config.decision_threshold);
        log::info!(
            "prediction: p={p:.4} verdict={} risk={} factors={} actions={}",
            prediction.as_str(),
            risk_level.as_str(),
            risk_factors.len(),
            suggestions.len()
        );

        Ok(PredictionResult {
            churn_probability: p,
            prediction,
            risk_level,
            summary: risk_summary(p, &self.config.risk_thresholds).to_string(),
            confidence: confidence(p),
            risk_factors,
            suggestions,
            model_version: bundle.metadata.version.clone(),
        })
    }

    pub fn get_model_info(&self) -> ModelInfo {
        model_info(&self.bundle)
    }
}

/// Dashboard queries over a population snapshot, with an explicit cache.
pub struct AnalyticsService {
    bundle:     Arc<ModelBundle>,
    config:     ChurnConfig,
    analyzer:   StatisticalAnalyzer,
    population: Arc<Population>,
    cache:      AnalyticsCache,
}

impl AnalyticsService {
    pub fn new(bundle: Arc<ModelBundle>, config: ChurnConfig, population: Arc<Population>) -> Self {
        let analyzer = StatisticalAnalyzer::from_config(&config);
        Self {
            bundle,
            config,
            analyzer,
            population,
            cache: AnalyticsCache::new(),
        }
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Replace the population snapshot. Drops every cached result.
    pub fn set_population(&mut self, population: Arc<Population>) {
        log::info!("population snapshot replaced ({} customers)", population.len());
        self.population = population;
        self.cache.invalidate();
    }

    /// Aggregate stats for the current snapshot, cached until the next
    /// `set_population`.
    pub fn get_aggregate_stats(&mut self) -> ChurnResult<AggregateStats> {
        if let Some(stats) = self.cache.aggregate_stats() {
            return Ok(stats.clone());
        }
        let stats = self.aggregate_stats_for(&self.population)?;
        self.cache.insert(CachedResult::AggregateStats(stats.clone()));
        Ok(stats)
    }

    /// Full analysis for the current snapshot, cached until the next
    /// `set_population`.
    pub fn get_analysis(&mut self) -> ChurnResult<Analysis> {
        if let Some(analysis) = self.cache.analysis() {
            return Ok(analysis.clone());
        }
        let analysis = self.analysis_for(&self.population)?;
        self.cache.insert(CachedResult::Analysis(analysis.clone()));
        Ok(analysis)
    }

    /// Uncached aggregate stats for an arbitrary population.
    pub fn aggregate_stats_for(&self, population: &Population) -> ChurnResult<AggregateStats> {
        self.analyzer
            .aggregate_stats(population, &self.bundle, self.config.feature_importance_top_n)
    }

    /// Uncached analysis for an arbitrary population.
    pub fn analysis_for(&self, population: &Population) -> ChurnResult<Analysis> {
        self.analyzer.analyze(population, &self.config.financial)
    }

    pub fn get_model_info(&self) -> ModelInfo {
        model_info(&self.bundle)
    }

    pub fn computed_at(&self, key: QueryKey) -> Option<DateTime<Utc>> {
        self.cache.computed_at(key)
    }
}
