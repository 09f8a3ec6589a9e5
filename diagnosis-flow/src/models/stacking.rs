use serde::{Deserialize, Serialize};

use super::{Classifier, NamedEstimator, check_estimators, softmax};

/// Multinomial logistic regression used as the stacking meta learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// `[class][meta_feature]`
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl LogisticRegression {
    pub fn predict_proba(&self, z: &[f64]) -> Vec<f64> {
        let scores: Vec<f64> = self
            .coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, bias)| row.iter().zip(z).map(|(w, x)| w * x).sum::<f64>() + bias)
            .collect();
        softmax(&scores)
    }
}

/// Stacked generalization: base-model probability vectors, concatenated in estimator order,
/// are the input of a logistic-regression meta learner.
///
/// Binary problems must be exported with the full two-column meta layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackingEnsemble {
    pub n_features: usize,
    pub n_classes: usize,
    pub estimators: Vec<NamedEstimator>,
    pub final_estimator: LogisticRegression,
}

impl StackingEnsemble {
    fn meta_features(&self, features: &[f64]) -> Vec<f64> {
        self.estimators
            .iter()
            .flat_map(|estimator| estimator.model.predict_proba(features))
            .collect()
    }
}

impl Classifier for StackingEnsemble {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        self.final_estimator
            .predict_proba(&self.meta_features(features))
    }

    fn check(&self) -> Result<(), String> {
        check_estimators(&self.estimators, self.n_features, self.n_classes)?;
        let meta_width = self.estimators.len() * self.n_classes;
        let meta = &self.final_estimator;
        if meta.coef.len() != self.n_classes || meta.intercept.len() != self.n_classes {
            return Err("meta learner class count differs from ensemble".into());
        }
        if meta.coef.iter().any(|row| row.len() != meta_width) {
            return Err(format!("meta learner rows must have {meta_width} coefficients"));
        }
        Ok(())
    }
}
