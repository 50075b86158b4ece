//! The model bundle: immutable, process-lifetime inference artifact.
//!
//! RULE: A bundle is built once during initialization and then only
//! ever borrowed (or shared through `Arc`). Nothing mutates it after
//! `validate()` passes, so concurrent requests read it without locks.
//!
//! Any inconsistency found while loading is a `ModelLoad` error. That is
//! fatal: the service must not start, and it never falls back to an
//! unscored response.

use crate::{
    classifier::Classifier,
    error::{ChurnError, ChurnResult},
    features::{Feature, NormalizationConstants, FEATURE_COUNT},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The bundle shipped with the repository, embedded at compile time.
const REFERENCE_BUNDLE: &str = include_str!("../../data/model/churn_model.json");

pub const ENSEMBLE_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy:  f64,
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
    pub roc_auc:   f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version:          String,
    pub trained_at:       DateTime<Utc>,
    pub model_type:       String,
    pub training_samples: u64,
    pub metrics:          ModelMetrics,
}

/// Which direction of deviation from the reference pushes toward churn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChurnDirection {
    Higher,
    Lower,
    Neutral,
}

/// Population reference for one feature: the mean (or mode for flags),
/// the spread used to normalize a deviation, and its churn direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureReference {
    pub feature:   String,
    pub reference: f64,
    pub scale:     f64,
    pub direction: ChurnDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleMember {
    pub name:               String,
    pub weight:             f64,
    pub classifier:         Classifier,
    /// Global importance per feature, in feature order.
    pub feature_importance: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub metadata:             ModelMetadata,
    pub feature_names:        Vec<String>,
    pub normalization:        NormalizationConstants,
    pub members:              [EnsembleMember; ENSEMBLE_SIZE],
    pub population_reference: Vec<FeatureReference>,
}

impl ModelBundle {
    /// Load `{data_dir}/model/churn_model.json`.
    pub fn load(data_dir: &str) -> ChurnResult<Self> {
        let path = format!("{data_dir}/model/churn_model.json");
        Self::load_path(Path::new(&path))
    }

    pub fn load_path(path: &Path) -> ChurnResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChurnError::ModelLoad(format!("cannot read {}: {e}", path.display()))
        })?;
        let bundle = Self::from_json(&content)?;
        log::info!(
            "model bundle {} loaded from {} ({} features)",
            bundle.metadata.version,
            path.display(),
            bundle.feature_names.len(),
        );
        Ok(bundle)
    }

    pub fn from_json(json: &str) -> ChurnResult<Self> {
        let bundle: ModelBundle = serde_json::from_str(json)
            .map_err(|e| ChurnError::ModelLoad(format!("corrupt bundle: {e}")))?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// The bundle shipped in `data/model/`, parsed from the copy embedded
    /// in the binary.
    pub fn reference() -> ChurnResult<Self> {
        Self::from_json(REFERENCE_BUNDLE)
    }

    /// Check the bundle against the feature deriver and its own shape.
    pub fn validate(&self) -> ChurnResult<()> {
        let expected = Feature::names();
        if self.feature_names.len() != expected.len()
            || self.feature_names.iter().zip(&expected).any(|(a, b)| a != b)
        {
            return Err(ChurnError::ModelLoad(format!(
                "feature order mismatch: bundle has {:?}, deriver produces {:?}",
                self.feature_names, expected
            )));
        }

        let n = &self.normalization;
        if !(n.max_monthly_charges > 0.0 && n.max_total_charges > 0.0)
            || !n.high_monthly_charge.is_finite()
        {
            return Err(ChurnError::ModelLoad("normalization constants must be positive".into()));
        }

        let mut weight_sum = 0.0;
        for member in &self.members {
            if !member.weight.is_finite() || member.weight < 0.0 {
                return Err(ChurnError::ModelLoad(format!(
                    "member '{}' has invalid weight {}",
                    member.name, member.weight
                )));
            }
            weight_sum += member.weight;

            if member.feature_importance.len() != FEATURE_COUNT {
                return Err(ChurnError::ModelLoad(format!(
                    "member '{}' has {} importances, expected {FEATURE_COUNT}",
                    member.name,
                    member.feature_importance.len()
                )));
            }
            if member.feature_importance.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(ChurnError::ModelLoad(format!(
                    "member '{}' has a negative or non-finite importance",
                    member.name
                )));
            }

            member
                .classifier
                .validate(FEATURE_COUNT)
                .map_err(|e| ChurnError::ModelLoad(format!("member '{}': {e}", member.name)))?;
        }
        if weight_sum <= 0.0 {
            return Err(ChurnError::ModelLoad("member weights sum to zero".into()));
        }

        if self.population_reference.len() != FEATURE_COUNT {
            return Err(ChurnError::ModelLoad(format!(
                "population reference covers {} features, expected {FEATURE_COUNT}",
                self.population_reference.len()
            )));
        }
        for (r, name) in self.population_reference.iter().zip(&expected) {
            if r.feature != *name {
                return Err(ChurnError::ModelLoad(format!(
                    "population reference out of order: found '{}' where '{name}' belongs",
                    r.feature
                )));
            }
            if !(r.scale > 0.0) || !r.reference.is_finite() {
                return Err(ChurnError::ModelLoad(format!(
                    "population reference for '{}' needs a finite reference and positive scale",
                    r.feature
                )));
            }
        }

        Ok(())
    }

    /// Mean of the members' importances for `feature`. Unweighted: the
    /// combination weights apply to probabilities, not to explanations.
    pub fn averaged_importance(&self, feature: Feature) -> f64 {
        let i = feature.index();
        self.members.iter().map(|m| m.feature_importance[i]).sum::<f64>()
            / self.members.len() as f64
    }

    pub fn reference_for(&self, feature: Feature) -> &FeatureReference {
        &self.population_reference[feature.index()]
    }

    pub fn weights(&self) -> [f64; ENSEMBLE_SIZE] {
        [self.members[0].weight, self.members[1].weight, self.members[2].weight]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub version:          String,
    pub trained_at:       DateTime<Utc>,
    pub model_type:       String,
    pub members:          Vec<MemberInfo>,
    pub feature_count:    usize,
    pub training_samples: u64,
    pub metrics:          ModelMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub name:   String,
    pub kind:   String,
    pub weight: f64,
    pub trees:  usize,
}

/// Read-only metadata accessor.
pub fn model_info(bundle: &ModelBundle) -> ModelInfo {
    ModelInfo {
        version:          bundle.metadata.version.clone(),
        trained_at:       bundle.metadata.trained_at,
        model_type:       bundle.metadata.model_type.clone(),
        members:          bundle
            .members
            .iter()
            .map(|m| MemberInfo {
                name:   m.name.clone(),
                kind:   m.classifier.kind().to_string(),
                weight: m.weight,
                trees:  m.classifier.trees().len(),
            })
            .collect(),
        feature_count:    bundle.feature_names.len(),
        training_samples: bundle.metadata.training_samples,
        metrics:          bundle.metadata.metrics.clone(),
    }
}
