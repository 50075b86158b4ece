//! Base classifiers of the ensemble.
//!
//! Every member exposes one capability: given a feature vector, return
//! the class-1 (churn) probability. Members are a tagged enum rather
//! than trait objects so the bundle can be deserialized as plain data.
//!
//! Trees are flat node arrays, node 0 is the root. Traversal goes left
//! when `value <= threshold`. Structure is checked once by `validate()`
//! at bundle load; traversal still refuses to index out of bounds and
//! reports `None` rather than inventing a number.

use serde::{Deserialize, Serialize};

pub trait ChurnClassifier {
    /// Class-1 probability for `features`, or None if the model cannot
    /// evaluate this input.
    fn probability(&self, features: &[f64]) -> Option<f64>;
}

// ── Trees ────────────────────────────────────────────────────────────────────

/// A decision-tree node. A node with `leaf: Some(_)` is terminal and its
/// other fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub feature:   usize,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub left:      usize,
    #[serde(default)]
    pub right:     usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf:      Option<f64>,
}

impl TreeNode {
    pub fn split(feature: usize, threshold: f64, left: usize, right: usize) -> Self {
        Self { feature, threshold, left, right, leaf: None }
    }

    pub fn leaf(value: f64) -> Self {
        Self { feature: 0, threshold: 0.0, left: 0, right: 0, leaf: Some(value) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    /// Walk from the root to a leaf. Bounded by the node count so a
    /// malformed cycle cannot loop forever.
    pub fn evaluate(&self, features: &[f64]) -> Option<f64> {
        let mut idx = 0usize;
        for _ in 0..=self.nodes.len() {
            let node = self.nodes.get(idx)?;
            if let Some(value) = node.leaf {
                return Some(value);
            }
            let value = *features.get(node.feature)?;
            idx = if value <= node.threshold { node.left } else { node.right };
        }
        None
    }

    /// Check that every split points at existing children and features,
    /// that children come after their parent (so the tree is acyclic),
    /// and that every leaf value satisfies `leaf_ok`.
    pub fn validate(
        &self,
        feature_count: usize,
        leaf_ok: impl Fn(f64) -> bool,
    ) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node.leaf {
                Some(v) => {
                    if !v.is_finite() || !leaf_ok(v) {
                        return Err(format!("node {i} has invalid leaf value {v}"));
                    }
                }
                None => {
                    if node.feature >= feature_count {
                        return Err(format!("node {i} splits on unknown feature {}", node.feature));
                    }
                    if !node.threshold.is_finite() {
                        return Err(format!("node {i} has non-finite threshold"));
                    }
                    for child in [node.left, node.right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {i} has invalid child {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

// ── Members ──────────────────────────────────────────────────────────────────

/// Additive tree ensemble on the log-odds scale (XGBoost / sklearn
/// gradient boosting). Learning rate is folded into the leaf margins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTrees {
    /// Initial log-odds before any tree contributes.
    pub base_score: f64,
    pub trees:      Vec<DecisionTree>,
}

impl ChurnClassifier for BoostedTrees {
    fn probability(&self, features: &[f64]) -> Option<f64> {
        let mut margin = self.base_score;
        for tree in &self.trees {
            margin += tree.evaluate(features)?;
        }
        Some(sigmoid(margin))
    }
}

/// Bagged trees whose leaves hold class-1 probabilities; the forest
/// averages them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<DecisionTree>,
}

impl ChurnClassifier for RandomForest {
    fn probability(&self, features: &[f64]) -> Option<f64> {
        if self.trees.is_empty() {
            return None;
        }
        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.evaluate(features)?;
        }
        Some(sum / self.trees.len() as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    GradientBoosted(BoostedTrees),
    RandomForest(RandomForest),
}

impl Classifier {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GradientBoosted(_) => "gradient_boosted",
            Self::RandomForest(_)    => "random_forest",
        }
    }

    pub fn trees(&self) -> &[DecisionTree] {
        match self {
            Self::GradientBoosted(m) => &m.trees,
            Self::RandomForest(m)    => &m.trees,
        }
    }

    pub fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.trees().is_empty() {
            return Err(format!("{} member has no trees", self.kind()));
        }
        match self {
            Self::GradientBoosted(m) => {
                if !m.base_score.is_finite() {
                    return Err("non-finite base score".into());
                }
                for (t, tree) in m.trees.iter().enumerate() {
                    tree.validate(feature_count, |_| true)
                        .map_err(|e| format!("tree {t}: {e}"))?;
                }
            }
            Self::RandomForest(m) => {
                for (t, tree) in m.trees.iter().enumerate() {
                    tree.validate(feature_count, |v| (0.0..=1.0).contains(&v))
                        .map_err(|e| format!("tree {t}: {e}"))?;
                }
            }
        }
        Ok(())
    }
}

impl ChurnClassifier for Classifier {
    fn probability(&self, features: &[f64]) -> Option<f64> {
        match self {
            Self::GradientBoosted(m) => m.probability(features),
            Self::RandomForest(m)    => m.probability(features),
        }
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
