//! Feature derivation: CustomerRecord → fixed-order FeatureVector.
//!
//! RULE: The order of `Feature::ALL` is the order the ensemble was fit
//! with. NEVER reorder or remove entries. The model bundle carries its
//! own copy of the names and is rejected at load time if the two differ.
//!
//! Derivation is a pure function of the record plus the normalization
//! constants shipped with the bundle. No other state is read.

use crate::{
    customer::{Contract, CustomerRecord, InternetService, MultipleLines, PaymentMethod, RawCustomerRecord, AddOn},
    error::ChurnResult,
};
use serde::{Deserialize, Serialize};

pub const FEATURE_COUNT: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    SeniorCitizen,
    Tenure,
    MonthlyCharges,
    TotalCharges,
    CustomerValueScore,
    ServiceCount,
    PremiumServiceCount,
    ContractStability,
    PaymentRisk,
    TenureGroup,
    ChargeRatio,
    AvgMonthlySpend,
    SeniorAndHighMonthly,
    FiberWithoutSecurity,
    PaperlessBilling,
    FiberOptic,
    HasPartner,
    HasDependents,
}

impl Feature {
    /// Declaration order. Also the tie-break order for explanations.
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::SeniorCitizen,
        Feature::Tenure,
        Feature::MonthlyCharges,
        Feature::TotalCharges,
        Feature::CustomerValueScore,
        Feature::ServiceCount,
        Feature::PremiumServiceCount,
        Feature::ContractStability,
        Feature::PaymentRisk,
        Feature::TenureGroup,
        Feature::ChargeRatio,
        Feature::AvgMonthlySpend,
        Feature::SeniorAndHighMonthly,
        Feature::FiberWithoutSecurity,
        Feature::PaperlessBilling,
        Feature::FiberOptic,
        Feature::HasPartner,
        Feature::HasDependents,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SeniorCitizen        => "senior_citizen",
            Self::Tenure               => "tenure",
            Self::MonthlyCharges       => "monthly_charges",
            Self::TotalCharges         => "total_charges",
            Self::CustomerValueScore   => "customer_value_score",
            Self::ServiceCount         => "service_count",
            Self::PremiumServiceCount  => "premium_service_count",
            Self::ContractStability    => "contract_stability",
            Self::PaymentRisk          => "payment_risk",
            Self::TenureGroup          => "tenure_group",
            Self::ChargeRatio          => "charge_ratio",
            Self::AvgMonthlySpend      => "avg_monthly_spend",
            Self::SeniorAndHighMonthly => "senior_and_high_monthly",
            Self::FiberWithoutSecurity => "fiber_without_security",
            Self::PaperlessBilling     => "paperless_billing",
            Self::FiberOptic           => "fiber_optic",
            Self::HasPartner           => "has_partner",
            Self::HasDependents        => "has_dependents",
        }
    }

    pub fn from_name(name: &str) -> Option<Feature> {
        Feature::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// The ordered feature-name list a bundle must match.
    pub fn names() -> Vec<&'static str> {
        Feature::ALL.iter().map(|f| f.name()).collect()
    }
}

/// Normalization constants fit at training time. Part of the model
/// bundle metadata, reproduced exactly at inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationConstants {
    /// Largest monthly charge in the training population.
    pub max_monthly_charges: f64,
    /// Largest total charge in the training population.
    pub max_total_charges:   f64,
    /// Monthly charge above which a bill counts as high.
    pub high_monthly_charge: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// (feature, value) pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.iter().map(move |f| (*f, self.values[f.index()]))
    }
}

// ── Ordinal encodings ────────────────────────────────────────────────────────

pub fn contract_stability(contract: Contract) -> f64 {
    match contract {
        Contract::MonthToMonth => 1.0,
        Contract::OneYear      => 2.0,
        Contract::TwoYear      => 3.0,
    }
}

pub fn payment_risk(method: PaymentMethod) -> f64 {
    match method {
        PaymentMethod::ElectronicCheck => 3.0,
        PaymentMethod::MailedCheck     => 2.0,
        PaymentMethod::BankTransfer    => 1.0,
        PaymentMethod::CreditCard      => 1.0,
    }
}

/// New (≤12) = 1, Growing (≤24) = 2, Mature (≤48) = 3, Loyal = 4.
pub fn tenure_group(tenure: u32) -> f64 {
    match tenure {
        0..=12  => 1.0,
        13..=24 => 2.0,
        25..=48 => 3.0,
        _       => 4.0,
    }
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

// ── Derivation ───────────────────────────────────────────────────────────────

pub struct FeatureDeriver;

impl FeatureDeriver {
    /// Validate a raw record and derive its features.
    /// Out-of-vocabulary input surfaces as `ChurnError::Feature`.
    pub fn derive_raw(
        raw: &RawCustomerRecord,
        norm: &NormalizationConstants,
    ) -> ChurnResult<FeatureVector> {
        let record = raw.validate()?;
        Ok(Self::derive(&record, norm))
    }

    pub fn derive(record: &CustomerRecord, norm: &NormalizationConstants) -> FeatureVector {
        let tenure  = f64::from(record.tenure);
        let monthly = record.monthly_charges;
        let total   = record.total_charges;

        let customer_value_score = tenure * 0.3
            + ratio(monthly, norm.max_monthly_charges) * 100.0 * 0.4
            + ratio(total, norm.max_total_charges) * 100.0 * 0.3;

        let add_ons = record.add_ons();
        let service_count = [
            record.phone_service.is_yes(),
            record.multiple_lines == MultipleLines::Yes,
            record.internet_service != InternetService::No,
        ]
        .iter()
        .filter(|b| **b)
        .count()
            + add_ons.iter().filter(|a| a.is_yes()).count();

        // First four add-ons are the premium (protection/support) tier.
        let premium_service_count = add_ons[..4].iter().filter(|a| a.is_yes()).count();

        let charge_ratio = if monthly > 0.0 {
            total / (monthly * tenure.max(1.0))
        } else {
            0.0
        };

        let avg_monthly_spend = if record.tenure > 0 { total / tenure } else { monthly };

        let fiber = record.internet_service == InternetService::FiberOptic;

        let mut values = [0.0; FEATURE_COUNT];
        values[Feature::SeniorCitizen.index()]        = flag(record.senior_citizen);
        values[Feature::Tenure.index()]               = tenure;
        values[Feature::MonthlyCharges.index()]       = monthly;
        values[Feature::TotalCharges.index()]         = total;
        values[Feature::CustomerValueScore.index()]   = customer_value_score;
        values[Feature::ServiceCount.index()]         = service_count as f64;
        values[Feature::PremiumServiceCount.index()]  = premium_service_count as f64;
        values[Feature::ContractStability.index()]    = contract_stability(record.contract);
        values[Feature::PaymentRisk.index()]          = payment_risk(record.payment_method);
        values[Feature::TenureGroup.index()]          = tenure_group(record.tenure);
        values[Feature::ChargeRatio.index()]          = charge_ratio;
        values[Feature::AvgMonthlySpend.index()]      = avg_monthly_spend;
        values[Feature::SeniorAndHighMonthly.index()] =
            flag(record.senior_citizen && monthly > norm.high_monthly_charge);
        values[Feature::FiberWithoutSecurity.index()] =
            flag(fiber && record.online_security == AddOn::No);
        values[Feature::PaperlessBilling.index()]     = flag(record.paperless_billing.is_yes());
        values[Feature::FiberOptic.index()]           = flag(fiber);
        values[Feature::HasPartner.index()]           = flag(record.partner.is_yes());
        values[Feature::HasDependents.index()]        = flag(record.dependents.is_yes());

        FeatureVector { values }
    }
}

fn ratio(value: f64, max: f64) -> f64 {
    if max > 0.0 { value / max } else { 0.0 }
}
