use serde::{Deserialize, Serialize};

use super::{Classifier, DecisionTree};

/// Random forest classifier: the mean of each tree's normalized leaf class distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_features: usize,
    pub n_classes: usize,
    pub trees: Vec<DecisionTree>,
}

impl Classifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        if self.trees.is_empty() {
            return proba;
        }

        for tree in &self.trees {
            let counts = tree.leaf_value(features);
            let total: f64 = counts.iter().sum();
            if total <= 0.0 {
                continue;
            }
            for (slot, count) in proba.iter_mut().zip(counts) {
                *slot += count / total;
            }
        }

        let n_trees = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n_trees);
        proba
    }

    fn check(&self) -> Result<(), String> {
        if self.n_classes == 0 {
            return Err("forest has no classes".into());
        }
        if self.trees.is_empty() {
            return Err("empty forest".into());
        }
        for (index, tree) in self.trees.iter().enumerate() {
            tree.check(self.n_features, self.n_classes)
                .map_err(|e| format!("tree {index}: {e}"))?;
        }
        Ok(())
    }
}
