use churnguard_core::{
    config::ChurnConfig,
    model::ModelBundle,
    service::{AnalyticsService, PredictionService},
    synthetic::SyntheticPopulation,
};
use std::sync::Arc;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn bundle() -> Arc<ModelBundle> {
    Arc::new(ModelBundle::reference().unwrap())
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// The same seed produces an identical population.
#[test]
fn same_seed_same_population() {
    let b = bundle();
    let a = SyntheticPopulation::generate(500, 42, &b).unwrap();
    let c = SyntheticPopulation::generate(500, 42, &b).unwrap();
    assert_eq!(a, c);
}

/// Different seeds produce different populations.
#[test]
fn different_seed_different_population() {
    let b = bundle();
    let a = SyntheticPopulation::generate(200, 1, &b).unwrap();
    let c = SyntheticPopulation::generate(200, 2, &b).unwrap();
    assert_ne!(a, c);
}

/// A generated population has a plausible churn rate and every
/// contract type.
#[test]
fn synthetic_population_is_plausible() {
    let pop = SyntheticPopulation::generate(2_000, 42, &bundle()).unwrap();
    let rate = pop.churn_rate();
    assert!((0.05..0.6).contains(&rate), "churn rate {rate}");

    let mut contracts: Vec<_> = pop.customers().iter().map(|c| c.record.contract).collect();
    contracts.sort();
    contracts.dedup();
    assert_eq!(contracts.len(), 3);
}

/// Analysis of the same population is identical across service instances.
#[test]
fn analysis_is_reproducible() {
    let b = bundle();
    let pop = Arc::new(SyntheticPopulation::generate(800, 9, &b).unwrap());

    let mut first = AnalyticsService::new(Arc::clone(&b), ChurnConfig::default_test(), Arc::clone(&pop));
    let mut second = AnalyticsService::new(Arc::clone(&b), ChurnConfig::default_test(), pop);
    assert_eq!(first.get_analysis().unwrap(), second.get_analysis().unwrap());
    assert_eq!(first.get_aggregate_stats().unwrap(), second.get_aggregate_stats().unwrap());
}

/// Predicting every synthetic customer twice yields bit-identical output.
#[test]
fn batch_predictions_are_reproducible() {
    let b = bundle();
    let svc = PredictionService::new(Arc::clone(&b), ChurnConfig::default_test());
    let pop = SyntheticPopulation::generate(200, 3, &b).unwrap();

    for c in pop.customers() {
        let raw = c.record.to_raw();
        assert_eq!(svc.predict(&raw).unwrap(), svc.predict(&raw).unwrap());
    }
}
