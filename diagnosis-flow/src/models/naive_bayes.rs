use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::{Classifier, log_sum_exp};

/// Gaussian naive Bayes. `var` already includes the training-time variance smoothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    pub class_prior: Vec<f64>,
    /// Per-class feature means, `[class][feature]`.
    pub theta: Vec<Vec<f64>>,
    /// Per-class feature variances, `[class][feature]`.
    pub var: Vec<Vec<f64>>,
}

impl GaussianNaiveBayes {
    fn joint_log_likelihood(&self, features: &[f64]) -> Vec<f64> {
        self.class_prior
            .iter()
            .zip(self.theta.iter().zip(&self.var))
            .map(|(prior, (means, vars))| {
                let mut log_density = 0.0;
                for ((mean, var), x) in means.iter().zip(vars).zip(features) {
                    log_density -= 0.5 * (2.0 * PI * var).ln();
                    log_density -= 0.5 * (x - mean).powi(2) / var;
                }
                prior.ln() + log_density
            })
            .collect()
    }
}

impl Classifier for GaussianNaiveBayes {
    fn n_features(&self) -> usize {
        self.theta.first().map(Vec::len).unwrap_or(0)
    }

    fn n_classes(&self) -> usize {
        self.class_prior.len()
    }

    fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let jll = self.joint_log_likelihood(features);
        let norm = log_sum_exp(&jll);
        if !norm.is_finite() {
            let n = jll.len().max(1) as f64;
            return vec![1.0 / n; jll.len()];
        }
        jll.iter().map(|l| (l - norm).exp()).collect()
    }

    fn check(&self) -> Result<(), String> {
        let n_classes = self.class_prior.len();
        if n_classes == 0 {
            return Err("no classes".into());
        }
        if self.theta.len() != n_classes || self.var.len() != n_classes {
            return Err("theta/var rows do not match class count".into());
        }
        let n_features = self.n_features();
        if self.theta.iter().chain(&self.var).any(|row| row.len() != n_features) {
            return Err("ragged theta/var rows".into());
        }
        if self.var.iter().flatten().any(|v| !(*v > 0.0)) {
            return Err("variances must be positive".into());
        }
        if self.class_prior.iter().any(|p| *p < 0.0 || !p.is_finite()) {
            return Err("class priors must be finite and non-negative".into());
        }
        Ok(())
    }
}
