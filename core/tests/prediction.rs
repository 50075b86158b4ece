use churnguard_core::{
    config::{ChurnConfig, RiskThresholds},
    customer::{ChargeField, RawCustomerRecord},
    error::ChurnError,
    features::Feature,
    model::ModelBundle,
    prediction::{risk_summary, RiskLevel, Verdict},
    service::PredictionService,
    strategy::ActionKind,
    synthetic::SyntheticPopulation,
};
use std::sync::Arc;
use std::thread;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn service() -> PredictionService {
    service_with(ChurnConfig::default_test())
}

fn service_with(config: ChurnConfig) -> PredictionService {
    let _ = env_logger::builder().is_test(true).try_init();
    let bundle = ModelBundle::reference().unwrap();
    PredictionService::new(Arc::new(bundle), config)
}

/// Month-to-month, electronic check, two months in, fiber without add-ons.
fn high_risk() -> RawCustomerRecord {
    RawCustomerRecord {
        gender:            "Male".into(),
        senior_citizen:    0,
        partner:           "No".into(),
        dependents:        "No".into(),
        tenure:            2,
        phone_service:     "Yes".into(),
        multiple_lines:    "No".into(),
        internet_service:  "Fiber optic".into(),
        online_security:   "No".into(),
        online_backup:     "No".into(),
        device_protection: "No".into(),
        tech_support:      "No".into(),
        streaming_tv:      "No".into(),
        streaming_movies:  "No".into(),
        contract:          "Month-to-month".into(),
        paperless_billing: "Yes".into(),
        payment_method:    "Electronic check".into(),
        monthly_charges:   85.0,
        total_charges:     Some(ChargeField::Number(170.0)),
    }
}

/// Two-year contract, credit card auto-pay, three years in, full DSL bundle.
fn low_risk() -> RawCustomerRecord {
    RawCustomerRecord {
        gender:            "Female".into(),
        senior_citizen:    0,
        partner:           "Yes".into(),
        dependents:        "Yes".into(),
        tenure:            36,
        phone_service:     "Yes".into(),
        multiple_lines:    "Yes".into(),
        internet_service:  "DSL".into(),
        online_security:   "Yes".into(),
        online_backup:     "Yes".into(),
        device_protection: "Yes".into(),
        tech_support:      "Yes".into(),
        streaming_tv:      "Yes".into(),
        streaming_movies:  "Yes".into(),
        contract:          "Two year".into(),
        paperless_billing: "No".into(),
        payment_method:    "Credit card (automatic)".into(),
        monthly_charges:   65.0,
        total_charges:     Some(ChargeField::Number(2340.0)),
    }
}

// ── Golden scenarios ─────────────────────────────────────────────────────────

/// Month-to-month + electronic check + tenure 2 is a High-risk churner.
#[test]
fn month_to_month_echeck_new_customer_is_high_risk() {
    let result = service().predict(&high_risk()).unwrap();

    assert!(result.churn_probability > 0.7, "p = {}", result.churn_probability);
    assert_eq!(result.risk_level, RiskLevel::High);
    assert_eq!(result.prediction, Verdict::Yes);
    assert_eq!(result.summary, "Critical Risk");
    assert_eq!(result.model_version, "2.0");
}

/// Two-year + credit card + tenure 36 is a Low-risk stayer.
#[test]
fn two_year_card_customer_is_low_risk() {
    let result = service().predict(&low_risk()).unwrap();

    assert!(result.churn_probability < 0.3, "p = {}", result.churn_probability);
    assert_eq!(result.risk_level, RiskLevel::Low);
    assert_eq!(result.prediction, Verdict::No);
    assert!(result.confidence > 0.8);
}

/// An unknown contract label is a FeatureError, never a scored result.
#[test]
fn out_of_vocabulary_contract_is_feature_error() {
    let mut raw = high_risk();
    raw.contract = "Three year".into();

    match service().predict(&raw) {
        Err(ChurnError::Feature { field, value, .. }) => {
            assert_eq!(field, "Contract");
            assert_eq!(value, "Three year");
        }
        other => panic!("expected FeatureError, got {other:?}"),
    }
}

/// Negative charges are rejected with a client-fault code.
#[test]
fn negative_monthly_charge_is_client_fault() {
    let mut raw = low_risk();
    raw.monthly_charges = -1.0;

    let err = service().predict(&raw).unwrap_err();
    assert_eq!(err.code(), "feature_error");
    assert!(err.is_client_fault());
}

// ── Threshold boundaries ─────────────────────────────────────────────────────

/// Exactly 0.5 and exactly 0.7 fall into the lower band for verdict,
/// level and summary alike.
#[test]
fn default_boundaries_are_strict_for_every_label() {
    let t = ChurnConfig::default_test().risk_thresholds;

    assert_eq!(Verdict::from_probability(0.5, 0.5), Verdict::No);
    assert_eq!(RiskLevel::from_probability(0.5, &t), RiskLevel::Low);
    assert_eq!(risk_summary(0.5, &t), "Moderate Risk");

    assert_eq!(Verdict::from_probability(0.7, 0.5), Verdict::Yes);
    assert_eq!(RiskLevel::from_probability(0.7, &t), RiskLevel::Medium);
    assert_eq!(risk_summary(0.7, &t), "High Risk");

    assert_eq!(RiskLevel::from_probability(0.7001, &t), RiskLevel::High);
    assert_eq!(risk_summary(0.7001, &t), "Critical Risk");
}

/// Moving the configured thresholds moves the summary bands with them.
#[test]
fn summary_follows_configured_thresholds() {
    let t = RiskThresholds { high: 0.8, medium: 0.6 };
    assert_eq!(RiskLevel::from_probability(0.75, &t), RiskLevel::Medium);
    assert_eq!(risk_summary(0.75, &t), "High Risk");
    assert_eq!(RiskLevel::from_probability(0.55, &t), RiskLevel::Low);
    assert_eq!(risk_summary(0.55, &t), "Moderate Risk");
}

/// A score sitting exactly on every configured cut-off gets No, Medium
/// and "High Risk" from the service.
#[test]
fn service_labels_agree_when_score_hits_threshold() {
    let p = service().predict(&high_risk()).unwrap().churn_probability;

    let mut config = ChurnConfig::default_test();
    config.decision_threshold = p;
    config.risk_thresholds = RiskThresholds { high: p, medium: p / 2.0 };
    let result = service_with(config).predict(&high_risk()).unwrap();

    assert_eq!(result.churn_probability, p);
    assert_eq!(result.prediction, Verdict::No);
    assert_eq!(result.risk_level, RiskLevel::Medium);
    assert_eq!(result.summary, "High Risk");
}

// ── Explanation and strategy ─────────────────────────────────────────────────

/// The high-risk customer's top factors are contract, tenure and payment,
/// and at most five are reported.
#[test]
fn high_risk_factors_are_ranked() {
    let result = service().predict(&high_risk()).unwrap();

    assert_eq!(result.risk_factors.len(), 5);
    let top: Vec<Feature> = result.risk_factors.iter().take(3).map(|f| f.feature).collect();
    assert_eq!(top, vec![Feature::ContractStability, Feature::Tenure, Feature::PaymentRisk]);

    for pair in result.risk_factors.windows(2) {
        assert!(pair[0].contribution >= pair[1].contribution);
    }
    assert!(result.risk_factors.iter().all(|f| f.contribution > 0.0));
}

/// Factor-driven rules fire first and the list is capped at three.
#[test]
fn high_risk_gets_three_factor_driven_actions() {
    let result = service().predict(&high_risk()).unwrap();
    let kinds: Vec<ActionKind> = result.suggestions.iter().map(|a| a.kind).collect();

    assert_eq!(
        kinds,
        vec![ActionKind::AutoPayIncentive, ActionKind::ContractUpgrade, ActionKind::Onboarding]
    );
    assert_eq!(result.suggestions[0].action, "Promote Auto-Pay");
}

/// With the cap lifted, the table continues in order and ends with the
/// risk-level rule.
#[test]
fn uncapped_strategy_follows_table_order() {
    let mut config = ChurnConfig::default_test();
    config.max_actions = 10;
    let result = service_with(config).predict(&high_risk()).unwrap();
    let kinds: Vec<ActionKind> = result.suggestions.iter().map(|a| a.kind).collect();

    assert_eq!(
        kinds,
        vec![
            ActionKind::AutoPayIncentive,
            ActionKind::ContractUpgrade,
            ActionKind::Onboarding,
            ActionKind::SecurityUpsell,
            ActionKind::RetentionOutreach,
        ]
    );
}

/// A low-risk customer always gets a loyalty action.
#[test]
fn low_risk_gets_loyalty_recognition() {
    let result = service().predict(&low_risk()).unwrap();
    assert!(result.suggestions.iter().any(|a| a.kind == ActionKind::LoyaltyRecognition));
    assert!(result.suggestions.len() <= 3);
}

// ── Properties ───────────────────────────────────────────────────────────────

/// Every synthetic customer scores inside [0, 1] with a consistent verdict.
#[test]
fn probability_is_bounded_for_valid_records() {
    let svc = service();
    let population = SyntheticPopulation::generate(300, 11, svc.bundle()).unwrap();

    for c in population.customers() {
        let r = svc.predict(&c.record.to_raw()).unwrap();
        assert!((0.0..=1.0).contains(&r.churn_probability));
        assert_eq!(r.prediction == Verdict::Yes, r.churn_probability > 0.5);
        assert!(r.risk_factors.len() <= 5);
        assert!(!r.suggestions.is_empty() && r.suggestions.len() <= 3);
    }
}

/// Two calls with the same record give identical results.
#[test]
fn predict_is_deterministic() {
    let svc = service();
    let a = svc.predict(&high_risk()).unwrap();
    let b = svc.predict(&high_risk()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.churn_probability.to_bits(), b.churn_probability.to_bits());
}

/// Many threads share one bundle without locking and agree bit for bit.
#[test]
fn shared_bundle_scores_identically_across_threads() {
    let svc = service();
    let expected = svc.predict(&high_risk()).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let svc = svc.clone();
            thread::spawn(move || svc.predict(&high_risk()).unwrap())
        })
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap(), expected);
    }
}

/// Model info exposes the bundle metadata.
#[test]
fn model_info_reports_members() {
    let info = service().get_model_info();
    assert_eq!(info.version, "2.0");
    assert_eq!(info.feature_count, 18);
    assert_eq!(info.members.len(), 3);
    assert_eq!(info.members[0].weight, 2.0);
    assert_eq!(info.members[1].kind, "random_forest");
}
