use serde::{Deserialize, Serialize};

use super::{Classifier, DecisionTree, softmax};

/// One regression tree contributing to the margin of `class`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostedTree {
    pub class: usize,
    pub tree: DecisionTree,
}

/// Gradient-boosted trees with a softmax objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    pub n_features: usize,
    pub n_classes: usize,
    #[serde(default = "default_base_score")]
    pub base_score: f64,
    pub trees: Vec<BoostedTree>,
}

fn default_base_score() -> f64 {
    0.5
}

impl GradientBoostedTrees {
    pub fn margins(&self, features: &[f64]) -> Vec<f64> {
        let mut margins = vec![self.base_score; self.n_classes];
        for boosted in &self.trees {
            if let Some(margin) = margins.get_mut(boosted.class) {
                *margin += boosted.tree.leaf_value(features)[0];
            }
        }
        margins
    }
}

impl Classifier for GradientBoostedTrees {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        softmax(&self.margins(features))
    }

    fn check(&self) -> Result<(), String> {
        if self.n_classes == 0 {
            return Err("no classes".into());
        }
        if !self.base_score.is_finite() {
            return Err("base_score must be finite".into());
        }
        for (index, boosted) in self.trees.iter().enumerate() {
            if boosted.class >= self.n_classes {
                return Err(format!("tree {index} targets unknown class {}", boosted.class));
            }
            boosted
                .tree
                .check(self.n_features, 1)
                .map_err(|e| format!("tree {index}: {e}"))?;
        }
        Ok(())
    }
}
