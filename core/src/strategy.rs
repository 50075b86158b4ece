//! StrategyGenerator: ordered (predicate, action) rule table.
//!
//! RULE: Rules are evaluated top to bottom. The first `max_actions`
//! matches are returned, at most one per ActionKind. Factor-driven rules
//! come first and only fire when the explainer reported the matching
//! factor AND the raw attribute confirms it. The three risk-level rules
//! at the bottom guarantee at least one action for any customer.

use crate::{
    customer::{Contract, CustomerRecord, InternetService, PaymentMethod},
    explainer::{has_factor, RiskFactor},
    features::Feature,
    prediction::RiskLevel,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ACTIONS: usize = 3;

/// Dedup key for actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AutoPayIncentive,
    ContractUpgrade,
    Onboarding,
    SecurityUpsell,
    ServiceQualityCheck,
    BundleOptimization,
    RetentionOutreach,
    ProactiveCheckIn,
    LoyaltyRecognition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAction {
    pub kind:            ActionKind,
    pub action:          String,
    pub priority:        Priority,
    pub details:         String,
    pub expected_impact: String,
}

/// Everything a rule predicate may look at.
pub struct RuleContext<'a> {
    pub risk_level:   RiskLevel,
    pub factors:      &'a [RiskFactor],
    pub record:       &'a CustomerRecord,
    pub high_monthly: f64,
}

impl RuleContext<'_> {
    fn any_factor(&self, features: &[Feature]) -> bool {
        features.iter().any(|f| has_factor(self.factors, *f))
    }
}

pub struct Rule {
    pub kind:            ActionKind,
    pub priority:        Priority,
    pub action:          &'static str,
    pub details:         &'static str,
    pub expected_impact: &'static str,
    pub applies:         fn(&RuleContext) -> bool,
}

impl Rule {
    fn to_action(&self) -> StrategyAction {
        StrategyAction {
            kind:            self.kind,
            action:          self.action.to_string(),
            priority:        self.priority,
            details:         self.details.to_string(),
            expected_impact: self.expected_impact.to_string(),
        }
    }
}

pub static RULES: [Rule; 9] = [
    Rule {
        kind:            ActionKind::AutoPayIncentive,
        priority:        Priority::High,
        action:          "Promote Auto-Pay",
        details:         "$5/month credit for switching to automatic payment",
        expected_impact: "Reduce churn risk by 60%",
        applies:         |c| {
            c.any_factor(&[Feature::PaymentRisk])
                && c.record.payment_method == PaymentMethod::ElectronicCheck
        },
    },
    Rule {
        kind:            ActionKind::ContractUpgrade,
        priority:        Priority::High,
        action:          "Offer Contract Upgrade",
        details:         "Provide 15-20% discount for 1-year contract commitment",
        expected_impact: "Reduce churn risk by 70%",
        applies:         |c| {
            c.any_factor(&[Feature::ContractStability])
                && c.record.contract == Contract::MonthToMonth
        },
    },
    Rule {
        kind:            ActionKind::Onboarding,
        priority:        Priority::High,
        action:          "New Customer Onboarding",
        details:         "Personal check-in call and welcome package",
        expected_impact: "Build relationship in critical early period",
        applies:         |c| {
            c.any_factor(&[Feature::Tenure, Feature::TenureGroup]) && c.record.tenure <= 6
        },
    },
    Rule {
        kind:            ActionKind::SecurityUpsell,
        priority:        Priority::Medium,
        action:          "Upsell Security Package",
        details:         "Offer 3-month free trial of online security",
        expected_impact: "Increase stickiness with additional services",
        applies:         |c| c.any_factor(&[Feature::FiberWithoutSecurity]),
    },
    Rule {
        kind:            ActionKind::ServiceQualityCheck,
        priority:        Priority::Medium,
        action:          "Service Quality Check",
        details:         "Proactive call to ensure satisfaction with fiber service",
        expected_impact: "Address service issues early",
        applies:         |c| {
            c.any_factor(&[Feature::FiberOptic])
                && c.record.internet_service == InternetService::FiberOptic
        },
    },
    Rule {
        kind:            ActionKind::BundleOptimization,
        priority:        Priority::Medium,
        action:          "Bundle Optimization",
        details:         "Review services and offer optimized bundle pricing",
        expected_impact: "Improve perceived value",
        applies:         |c| {
            c.any_factor(&[
                Feature::MonthlyCharges,
                Feature::AvgMonthlySpend,
                Feature::SeniorAndHighMonthly,
            ]) && c.record.monthly_charges > c.high_monthly
        },
    },
    Rule {
        kind:            ActionKind::RetentionOutreach,
        priority:        Priority::High,
        action:          "Retention Specialist Outreach",
        details:         "Assign a retention specialist to contact the customer this week",
        expected_impact: "Personal contact recovers a share of at-risk accounts",
        applies:         |c| c.risk_level == RiskLevel::High,
    },
    Rule {
        kind:            ActionKind::ProactiveCheckIn,
        priority:        Priority::Medium,
        action:          "Proactive Check-in",
        details:         "Schedule a satisfaction call within the next billing cycle",
        expected_impact: "Surface issues before they become cancellation reasons",
        applies:         |c| c.risk_level == RiskLevel::Medium,
    },
    Rule {
        kind:            ActionKind::LoyaltyRecognition,
        priority:        Priority::Low,
        action:          "Loyalty Recognition",
        details:         "Send appreciation message and loyalty rewards",
        expected_impact: "Maintain positive relationship",
        applies:         |c| c.risk_level == RiskLevel::Low,
    },
];

pub struct StrategyGenerator;

impl StrategyGenerator {
    pub fn generate(
        risk_level: RiskLevel,
        factors: &[RiskFactor],
        record: &CustomerRecord,
        max_actions: usize,
        high_monthly: f64,
    ) -> Vec<StrategyAction> {
        let ctx = RuleContext { risk_level, factors, record, high_monthly };
        Self::evaluate(&RULES, &ctx, max_actions)
    }

    /// Run an arbitrary rule table. Exposed so tables can be tested as data.
    pub fn evaluate(rules: &[Rule], ctx: &RuleContext, max_actions: usize) -> Vec<StrategyAction> {
        let mut out: Vec<StrategyAction> = Vec::with_capacity(max_actions);
        for rule in rules {
            if out.len() >= max_actions {
                break;
            }
            if out.iter().any(|a| a.kind == rule.kind) {
                continue;
            }
            if (rule.applies)(ctx) {
                out.push(rule.to_action());
            }
        }
        out
    }
}
