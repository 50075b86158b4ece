//! RiskExplainer: ranks the features that push a customer toward churn.
//!
//! contribution(f) = importance(f) × deviation(f)
//!
//!   importance(f)  unweighted mean of the members' global importances
//!   deviation(f)   (value − reference) / scale, signed so that a positive
//!                  number always means "more churn-like than the
//!                  population". Features with a neutral direction are
//!                  never reported.
//!
//! RULE: Only strictly positive contributions are reported. Ordering is a
//! stable sort on contribution, descending, over `Feature::ALL`, so equal
//! contributions keep declaration order.

use crate::{
    features::{Feature, FeatureVector},
    model::{ChurnDirection, ModelBundle},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_FACTORS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub feature:      Feature,
    pub label:        String,
    pub description:  String,
    pub contribution: f64,
}

/// Static label and description per feature.
pub fn describe(feature: Feature) -> (&'static str, &'static str) {
    match feature {
        Feature::SeniorCitizen        => ("Senior Citizen", "Senior citizens show higher churn tendency"),
        Feature::Tenure               => ("New Customer", "Customers in their first months churn the most"),
        Feature::MonthlyCharges       => ("High Monthly Charges", "Higher bills correlate with increased churn"),
        Feature::TotalCharges         => ("Low Lifetime Spend", "Little accumulated spend means weak attachment"),
        Feature::CustomerValueScore   => ("Low Customer Value", "Value score sits below the customer base"),
        Feature::ServiceCount         => ("Few Services", "Customers with fewer services are easier to lose"),
        Feature::PremiumServiceCount  => ("No Premium Services", "Security and support add-ons increase stickiness"),
        Feature::ContractStability    => ("Month-to-month Contract", "3.7x higher churn rate than 2-year contracts"),
        Feature::PaymentRisk          => ("Electronic Check Payment", "45% churn rate vs 15-19% for automatic payments"),
        Feature::TenureGroup          => ("Early-stage Customer", "First year is the critical retention period"),
        Feature::ChargeRatio          => ("Irregular Billing", "Total charges diverge from the monthly plan"),
        Feature::AvgMonthlySpend      => ("High Average Spend", "Average bill over tenure is above the base"),
        Feature::SeniorAndHighMonthly => ("Senior With High Bill", "Senior customer paying above the high-bill line"),
        Feature::FiberWithoutSecurity => ("Fiber Without Security", "Fiber customers without online security churn more"),
        Feature::PaperlessBilling     => ("Paperless Billing", "Paperless billing customers churn more often"),
        Feature::FiberOptic           => ("Fiber Optic Service", "41.9% churn rate, 2.2x higher than DSL"),
        Feature::HasPartner           => ("No Partner", "Single-person households churn more"),
        Feature::HasDependents        => ("No Dependents", "Households without dependents churn more"),
    }
}

pub struct RiskExplainer;

impl RiskExplainer {
    /// Top `max_factors` churn-pushing features for `vector`.
    ///
    /// `probability` only gates the degenerate case: a zero probability
    /// has nothing to explain.
    pub fn explain(
        vector: &FeatureVector,
        probability: f64,
        bundle: &ModelBundle,
        max_factors: usize,
    ) -> Vec<RiskFactor> {
        if probability <= 0.0 || max_factors == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(Feature, f64)> = Feature::ALL
            .iter()
            .filter_map(|&f| {
                let c = Self::contribution(vector, bundle, f);
                (c > 0.0).then_some((f, c))
            })
            .collect();

        // sort_by is stable: ties keep Feature::ALL order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(max_factors);

        scored
            .into_iter()
            .map(|(feature, contribution)| {
                let (label, description) = describe(feature);
                RiskFactor {
                    feature,
                    label: label.to_string(),
                    description: description.to_string(),
                    contribution,
                }
            })
            .collect()
    }

    pub fn contribution(vector: &FeatureVector, bundle: &ModelBundle, feature: Feature) -> f64 {
        let reference = bundle.reference_for(feature);
        let raw = (vector.get(feature) - reference.reference) / reference.scale;
        let deviation = match reference.direction {
            ChurnDirection::Higher  => raw,
            ChurnDirection::Lower   => -raw,
            ChurnDirection::Neutral => return 0.0,
        };
        bundle.averaged_importance(feature) * deviation
    }
}

/// True when `feature` is among `factors`.
pub fn has_factor(factors: &[RiskFactor], feature: Feature) -> bool {
    factors.iter().any(|f| f.feature == feature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_COUNT;

    fn at_reference(bundle: &ModelBundle) -> [f64; FEATURE_COUNT] {
        let mut values = [0.0; FEATURE_COUNT];
        for (i, r) in bundle.population_reference.iter().enumerate() {
            values[i] = r.reference;
        }
        values
    }

    #[test]
    fn customer_at_reference_has_no_factors() {
        let bundle = ModelBundle::reference().unwrap();
        let v = FeatureVector::from_values(at_reference(&bundle));
        assert!(RiskExplainer::explain(&v, 0.4, &bundle, 5).is_empty());
    }

    #[test]
    fn lower_direction_reports_values_below_reference() {
        let bundle = ModelBundle::reference().unwrap();
        let mut values = at_reference(&bundle);
        values[Feature::ContractStability.index()] = 1.0;
        let v = FeatureVector::from_values(values);

        let factors = RiskExplainer::explain(&v, 0.8, &bundle, 5);
        assert_eq!(factors.len(), 1);
        assert_eq!(factors[0].feature, Feature::ContractStability);
        assert_eq!(factors[0].label, "Month-to-month Contract");
        assert!(has_factor(&factors, Feature::ContractStability));
    }

    #[test]
    fn zero_probability_or_cap_explains_nothing() {
        let bundle = ModelBundle::reference().unwrap();
        let mut values = at_reference(&bundle);
        values[Feature::ContractStability.index()] = 1.0;
        let v = FeatureVector::from_values(values);

        assert!(RiskExplainer::explain(&v, 0.0, &bundle, 5).is_empty());
        assert!(RiskExplainer::explain(&v, 0.9, &bundle, 0).is_empty());
    }
}
