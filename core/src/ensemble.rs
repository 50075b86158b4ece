//! EnsembleScorer: weighted average of the bundle's member probabilities.
//!
//! RULE: Members are evaluated in bundle order and combined with the
//! weights the bundle carries. Nothing here is random, so the same
//! vector and bundle always give a bit-identical probability.
//!
//! A member that cannot evaluate the vector is an error. The scorer
//! never substitutes 0.0 or drops the member from the average.

use crate::{
    classifier::ChurnClassifier,
    error::{ChurnError, ChurnResult},
    features::{FeatureVector, FEATURE_COUNT},
    model::{ModelBundle, ENSEMBLE_SIZE},
};
use serde::{Deserialize, Serialize};

/// One member's contribution to a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberScore {
    pub name:        String,
    pub weight:      f64,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub probability: f64,
    pub members:     Vec<MemberScore>,
}

pub struct EnsembleScorer;

impl EnsembleScorer {
    pub fn score(vector: &FeatureVector, bundle: &ModelBundle) -> ChurnResult<f64> {
        let probabilities = Self::member_probabilities(vector, bundle)?;
        Ok(Self::combine(&probabilities, &bundle.weights()))
    }

    /// Score plus each member's probability, for diagnostics.
    pub fn score_breakdown(vector: &FeatureVector, bundle: &ModelBundle) -> ChurnResult<ScoreBreakdown> {
        let probabilities = Self::member_probabilities(vector, bundle)?;
        let probability = Self::combine(&probabilities, &bundle.weights());
        let members = bundle
            .members
            .iter()
            .zip(probabilities)
            .map(|(m, p)| MemberScore {
                name:        m.name.clone(),
                weight:      m.weight,
                probability: p,
            })
            .collect();
        Ok(ScoreBreakdown { probability, members })
    }

    /// `Σ wᵢ·pᵢ / Σ wᵢ`. Weight positivity is checked at bundle load.
    pub fn combine(probabilities: &[f64; ENSEMBLE_SIZE], weights: &[f64; ENSEMBLE_SIZE]) -> f64 {
        let mut num = 0.0;
        let mut den = 0.0;
        for (p, w) in probabilities.iter().zip(weights) {
            num += w * p;
            den += w;
        }
        (num / den).clamp(0.0, 1.0)
    }

    fn member_probabilities(
        vector: &FeatureVector,
        bundle: &ModelBundle,
    ) -> ChurnResult<[f64; ENSEMBLE_SIZE]> {
        if vector.len() != FEATURE_COUNT {
            return Err(ChurnError::Prediction(format!(
                "feature vector has {} values, expected {FEATURE_COUNT}",
                vector.len()
            )));
        }
        let mut out = [0.0; ENSEMBLE_SIZE];
        for (slot, member) in out.iter_mut().zip(&bundle.members) {
            let p = member.classifier.probability(vector.as_slice()).ok_or_else(|| {
                ChurnError::Prediction(format!("member '{}' could not evaluate the vector", member.name))
            })?;
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(ChurnError::Prediction(format!(
                    "member '{}' returned out-of-range probability {p}",
                    member.name
                )));
            }
            *slot = p;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_one_one_weights_match_literal_formula() {
        let p = [0.9, 0.3, 0.6];
        let got = EnsembleScorer::combine(&p, &[2.0, 1.0, 1.0]);
        let want = (2.0 * 0.9 + 0.3 + 0.6) / 4.0;
        assert!((got - want).abs() < 1e-12);
    }

    #[test]
    fn zero_weight_member_is_ignored() {
        let got = EnsembleScorer::combine(&[0.2, 0.9, 0.4], &[1.0, 0.0, 1.0]);
        assert!((got - 0.3).abs() < 1e-12);
    }
}
