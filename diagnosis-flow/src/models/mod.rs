//! Inference-only classifier artifacts.
//!
//! Each classifier kind is trained offline and exported as JSON. This module only evaluates
//! them; nothing here mutates a model after it is loaded, so a single instance can be shared
//! by any number of concurrent requests.

pub mod naive_bayes;
pub mod random_forest;
pub mod stacking;
pub mod svm;
pub mod tree;
pub mod voting;
pub mod xgboost;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use naive_bayes::GaussianNaiveBayes;
pub use random_forest::RandomForest;
pub use stacking::{LogisticRegression, StackingEnsemble};
pub use svm::{Kernel, PairwiseMachine, SupportVectorClassifier};
pub use tree::{DecisionTree, SplitRule};
pub use voting::SoftVotingEnsemble;
pub use xgboost::{BoostedTree, GradientBoostedTrees};

/// Common inference surface of every classifier kind.
pub trait Classifier: Send + Sync {
    /// Width of the feature vector the model was fitted on.
    fn n_features(&self) -> usize;

    /// Number of classes in the model's output distribution.
    fn n_classes(&self) -> usize;

    /// Probability distribution over encoded class indices.
    fn predict_proba(&self, features: &[f64]) -> Vec<f64>;

    /// Hard label. Defaults to the arg-max of [`Classifier::predict_proba`].
    fn predict(&self, features: &[f64]) -> usize {
        argmax(&self.predict_proba(features))
    }

    /// Structural validation run once at load time.
    fn check(&self) -> Result<(), String>;
}

/// The six classifier kinds produced by the training job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Svm,
    NaiveBayes,
    RandomForest,
    Xgboost,
    Stacking,
    Voting,
}

impl ModelKind {
    pub const ALL: [ModelKind; 6] = [
        ModelKind::Svm,
        ModelKind::NaiveBayes,
        ModelKind::RandomForest,
        ModelKind::Xgboost,
        ModelKind::Stacking,
        ModelKind::Voting,
    ];

    /// Artifact file name inside the models directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            ModelKind::Svm => "svm_model.json",
            ModelKind::NaiveBayes => "nb_model.json",
            ModelKind::RandomForest => "rf_model.json",
            ModelKind::Xgboost => "xgb_model.json",
            ModelKind::Stacking => "stacking_model.json",
            ModelKind::Voting => "voting_model.json",
        }
    }

    /// Key used in response payloads (`rf`, `nb`, `svm`, ...).
    pub fn short_name(&self) -> &'static str {
        match self {
            ModelKind::Svm => "svm",
            ModelKind::NaiveBayes => "nb",
            ModelKind::RandomForest => "rf",
            ModelKind::Xgboost => "xgb",
            ModelKind::Stacking => "stacking",
            ModelKind::Voting => "voting",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// A base model embedded inside a meta-ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedEstimator {
    pub name: String,
    pub model: ModelArtifact,
}

/// Any trained classifier, tagged by kind in its JSON form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Svm(SupportVectorClassifier),
    NaiveBayes(GaussianNaiveBayes),
    RandomForest(RandomForest),
    Xgboost(GradientBoostedTrees),
    Stacking(StackingEnsemble),
    Voting(SoftVotingEnsemble),
}

impl ModelArtifact {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelArtifact::Svm(_) => ModelKind::Svm,
            ModelArtifact::NaiveBayes(_) => ModelKind::NaiveBayes,
            ModelArtifact::RandomForest(_) => ModelKind::RandomForest,
            ModelArtifact::Xgboost(_) => ModelKind::Xgboost,
            ModelArtifact::Stacking(_) => ModelKind::Stacking,
            ModelArtifact::Voting(_) => ModelKind::Voting,
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            ModelArtifact::Svm(m) => m,
            ModelArtifact::NaiveBayes(m) => m,
            ModelArtifact::RandomForest(m) => m,
            ModelArtifact::Xgboost(m) => m,
            ModelArtifact::Stacking(m) => m,
            ModelArtifact::Voting(m) => m,
        }
    }
}

impl Classifier for ModelArtifact {
    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn n_classes(&self) -> usize {
        self.inner().n_classes()
    }

    fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        self.inner().predict_proba(features)
    }

    fn predict(&self, features: &[f64]) -> usize {
        self.inner().predict(features)
    }

    fn check(&self) -> Result<(), String> {
        self.inner().check()
    }
}

/// Index of the largest value; ties go to the lowest index and NaN never wins.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (index, value) in values.iter().enumerate() {
        if *value > best_value {
            best = index;
            best_value = *value;
        }
    }
    best
}

/// Largest value of a distribution, 0 for an empty one.
pub fn max_probability(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(0.0, f64::max)
}

pub(crate) fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

pub(crate) fn softmax(values: &[f64]) -> Vec<f64> {
    let lse = log_sum_exp(values);
    if !lse.is_finite() {
        let n = values.len().max(1) as f64;
        return vec![1.0 / n; values.len()];
    }
    values.iter().map(|v| (v - lse).exp()).collect()
}

pub(crate) fn check_estimators(
    estimators: &[NamedEstimator],
    n_features: usize,
    n_classes: usize,
) -> Result<(), String> {
    if estimators.is_empty() {
        return Err("no base estimators".into());
    }
    for estimator in estimators {
        estimator
            .model
            .check()
            .map_err(|e| format!("estimator '{}': {e}", estimator.name))?;
        if estimator.model.n_features() != n_features {
            return Err(format!(
                "estimator '{}' expects {} features, ensemble has {n_features}",
                estimator.name,
                estimator.model.n_features()
            ));
        }
        if estimator.model.n_classes() != n_classes {
            return Err(format!(
                "estimator '{}' predicts {} classes, ensemble has {n_classes}",
                estimator.name,
                estimator.model.n_classes()
            ));
        }
    }
    Ok(())
}
