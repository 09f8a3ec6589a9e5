use serde::{Deserialize, Serialize};

use super::{Classifier, NamedEstimator, check_estimators};

/// Soft voting: weighted average of the base models' probability vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftVotingEnsemble {
    pub n_features: usize,
    pub n_classes: usize,
    pub estimators: Vec<NamedEstimator>,
    /// One weight per estimator; uniform when absent.
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
}

impl SoftVotingEnsemble {
    fn weight(&self, index: usize) -> f64 {
        self.weights
            .as_ref()
            .and_then(|w| w.get(index).copied())
            .unwrap_or(1.0)
    }
}

impl Classifier for SoftVotingEnsemble {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        let mut total_weight = 0.0;
        for (index, estimator) in self.estimators.iter().enumerate() {
            let weight = self.weight(index);
            total_weight += weight;
            for (slot, p) in proba.iter_mut().zip(estimator.model.predict_proba(features)) {
                *slot += weight * p;
            }
        }
        if total_weight > 0.0 {
            proba.iter_mut().for_each(|p| *p /= total_weight);
        }
        proba
    }

    fn check(&self) -> Result<(), String> {
        check_estimators(&self.estimators, self.n_features, self.n_classes)?;
        if let Some(weights) = &self.weights {
            if weights.len() != self.estimators.len() {
                return Err(format!(
                    "{} weights for {} estimators",
                    weights.len(),
                    self.estimators.len()
                ));
            }
            if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
                return Err("weights must be finite and non-negative".into());
            }
            if weights.iter().sum::<f64>() <= 0.0 {
                return Err("weights sum to zero".into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DecisionTree, ModelArtifact, RandomForest};

    fn constant_forest(counts: Vec<f64>) -> NamedEstimator {
        NamedEstimator {
            name: "rf".into(),
            model: ModelArtifact::RandomForest(RandomForest {
                n_features: 1,
                n_classes: 2,
                trees: vec![DecisionTree::leaf(counts)],
            }),
        }
    }

    #[test]
    fn test_weights_shift_the_vote() {
        let mut voting = SoftVotingEnsemble {
            n_features: 1,
            n_classes: 2,
            estimators: vec![
                constant_forest(vec![1.0, 0.0]),
                constant_forest(vec![0.0, 1.0]),
            ],
            weights: Some(vec![2.0, 1.0]),
        };
        assert!(voting.check().is_ok());
        let proba = voting.predict_proba(&[0.0]);
        assert!((proba[0] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(voting.predict(&[0.0]), 0);

        voting.weights = None;
        // tie resolves to the lower class index
        assert_eq!(voting.predict(&[0.0]), 0);
        voting.weights = Some(vec![1.0, 3.0]);
        assert_eq!(voting.predict(&[0.0]), 1);
    }

    #[test]
    fn test_weight_count_must_match() {
        let voting = SoftVotingEnsemble {
            n_features: 1,
            n_classes: 2,
            estimators: vec![constant_forest(vec![1.0, 0.0])],
            weights: Some(vec![1.0, 1.0]),
        };
        assert!(voting.check().is_err());
    }
}
