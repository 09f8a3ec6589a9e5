//! Multi-model ensemble over the shared symptom feature vector.
//!
//! The random-forest, naive-Bayes and support-vector models each report their own hard label
//! and their own max-probability confidence. The final label comes from the arbitration
//! chain: voting model, then stacking model, then a weighted sum of the rf, nb, svm and xgb
//! distributions.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FlowError, Result};
use crate::labels::{DiseaseLabel, LabelEncoder};
use crate::models::{Classifier, ModelArtifact, ModelKind, argmax, max_probability};
use crate::vocabulary::{FeatureVector, SymptomVocabulary};

/// Models whose distributions feed the weighted fallback, in weight order.
pub const WEIGHTED_MODELS: [ModelKind; 4] = [
    ModelKind::RandomForest,
    ModelKind::NaiveBayes,
    ModelKind::Svm,
    ModelKind::Xgboost,
];

/// Models that report per-model labels and confidences.
pub const REPORTING_MODELS: [ModelKind; 3] =
    [ModelKind::RandomForest, ModelKind::NaiveBayes, ModelKind::Svm];

/// Non-negative weights normalized to sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct EnsembleWeights(Vec<f64>);

impl EnsembleWeights {
    /// Normalizes `raw`. All-zero weights become uniform.
    pub fn new(raw: Vec<f64>) -> Result<Self> {
        if raw.is_empty() {
            return Err(FlowError::invalid("ensemble_weights", "no weights"));
        }
        if raw.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(FlowError::invalid(
                "ensemble_weights",
                "weights must be finite and non-negative",
            ));
        }
        let total: f64 = raw.iter().sum();
        if total == 0.0 {
            return Ok(Self::uniform(raw.len()));
        }
        Ok(Self(raw.into_iter().map(|w| w / total).collect()))
    }

    pub fn uniform(n: usize) -> Self {
        Self(vec![1.0 / n.max(1) as f64; n])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<f64>> for EnsembleWeights {
    type Error = FlowError;

    fn try_from(raw: Vec<f64>) -> Result<Self> {
        Self::new(raw)
    }
}

impl From<EnsembleWeights> for Vec<f64> {
    fn from(weights: EnsembleWeights) -> Self {
        weights.0
    }
}

/// Which rule produced the final label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arbiter {
    Voting,
    Stacking,
    WeightedSum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsemblePrediction {
    pub per_model_labels: BTreeMap<ModelKind, DiseaseLabel>,
    /// Each model's own max probability. Not comparable across model kinds.
    pub confidence_per_model: BTreeMap<ModelKind, f64>,
    pub final_label: DiseaseLabel,
    pub arbiter: Arbiter,
}

/// A label and its probability in a ranked list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDisease {
    pub label: DiseaseLabel,
    pub probability: f64,
}

/// Read-only after construction; share it behind an `Arc`.
#[derive(Debug)]
pub struct EnsemblePredictor {
    vocabulary: SymptomVocabulary,
    labels: LabelEncoder,
    models: BTreeMap<ModelKind, ModelArtifact>,
    weights: EnsembleWeights,
}

impl EnsemblePredictor {
    /// Builds a predictor. The four weighted models are mandatory; voting and stacking are
    /// optional arbiters.
    pub fn new(
        vocabulary: SymptomVocabulary,
        labels: LabelEncoder,
        models: Vec<ModelArtifact>,
        weights: EnsembleWeights,
    ) -> Result<Self> {
        let mut by_kind = BTreeMap::new();
        for model in models {
            let kind = model.kind();
            model
                .check()
                .map_err(|reason| FlowError::invalid(kind.file_name(), reason))?;
            if model.n_features() != vocabulary.len() {
                return Err(FlowError::invalid(
                    kind.file_name(),
                    format!(
                        "expects {} features, vocabulary has {}",
                        model.n_features(),
                        vocabulary.len()
                    ),
                ));
            }
            if model.n_classes() != labels.len() {
                return Err(FlowError::invalid(
                    kind.file_name(),
                    format!(
                        "predicts {} classes, label encoder has {}",
                        model.n_classes(),
                        labels.len()
                    ),
                ));
            }
            if by_kind.insert(kind, model).is_some() {
                return Err(FlowError::invalid(kind.file_name(), "supplied twice"));
            }
        }

        for kind in WEIGHTED_MODELS {
            if !by_kind.contains_key(&kind) {
                return Err(FlowError::invalid(kind.file_name(), "required model missing"));
            }
        }
        if weights.len() != WEIGHTED_MODELS.len() {
            return Err(FlowError::invalid(
                "ensemble_weights",
                format!("expected {} weights, found {}", WEIGHTED_MODELS.len(), weights.len()),
            ));
        }

        Ok(Self {
            vocabulary,
            labels,
            models: by_kind,
            weights,
        })
    }

    pub fn vocabulary(&self) -> &SymptomVocabulary {
        &self.vocabulary
    }

    pub fn labels(&self) -> &LabelEncoder {
        &self.labels
    }

    pub fn weights(&self) -> &EnsembleWeights {
        &self.weights
    }

    pub fn has_model(&self, kind: ModelKind) -> bool {
        self.models.contains_key(&kind)
    }

    pub fn encode<I, S>(&self, symptoms: I) -> FeatureVector
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.vocabulary.encode(symptoms)
    }

    fn label(&self, index: usize) -> DiseaseLabel {
        let index = index.min(self.labels.len() - 1);
        DiseaseLabel {
            index,
            name: self.labels.classes()[index].clone(),
        }
    }

    fn proba(&self, kind: ModelKind, features: &[f64]) -> Vec<f64> {
        self.models
            .get(&kind)
            .map(|model| model.predict_proba(features))
            .unwrap_or_else(|| vec![0.0; self.labels.len()])
    }

    /// Weighted elementwise sum of the rf, nb, svm and xgb distributions.
    pub fn weighted_distribution(&self, vector: &FeatureVector) -> Vec<f64> {
        let features = vector.as_slice();
        let mut combined = vec![0.0; self.labels.len()];
        for (kind, weight) in WEIGHTED_MODELS.iter().zip(self.weights.as_slice()) {
            for (slot, p) in combined.iter_mut().zip(self.proba(*kind, features)) {
                *slot += weight * p;
            }
        }
        combined
    }

    /// Always returns a label; malformed vectors are treated as all-zero.
    pub fn predict(&self, vector: FeatureVector) -> EnsemblePrediction {
        let vector = vector.conformed(self.vocabulary.len());
        let features = vector.as_slice();

        let mut per_model_labels = BTreeMap::new();
        let mut confidence_per_model = BTreeMap::new();
        for kind in REPORTING_MODELS {
            if let Some(model) = self.models.get(&kind) {
                per_model_labels.insert(kind, self.label(model.predict(features)));
                confidence_per_model.insert(kind, max_probability(&model.predict_proba(features)));
            }
        }

        let (index, arbiter) = if let Some(voting) = self.models.get(&ModelKind::Voting) {
            (voting.predict(features), Arbiter::Voting)
        } else if let Some(stacking) = self.models.get(&ModelKind::Stacking) {
            (stacking.predict(features), Arbiter::Stacking)
        } else {
            (argmax(&self.weighted_distribution(&vector)), Arbiter::WeightedSum)
        };
        let final_label = self.label(index);

        debug!(
            active_symptoms = vector.active_count(),
            final_label = %final_label,
            arbiter = ?arbiter,
            "Ensemble prediction complete"
        );

        EnsemblePrediction {
            per_model_labels,
            confidence_per_model,
            final_label,
            arbiter,
        }
    }

    /// All labels ranked by the mean rf/nb/svm probability, highest first, ties by index.
    pub fn rank(&self, vector: FeatureVector, limit: usize) -> Vec<RankedDisease> {
        let vector = vector.conformed(self.vocabulary.len());
        let features = vector.as_slice();

        let mut mean = vec![0.0; self.labels.len()];
        for kind in REPORTING_MODELS {
            for (slot, p) in mean.iter_mut().zip(self.proba(kind, features)) {
                *slot += p / REPORTING_MODELS.len() as f64;
            }
        }

        let mut order: Vec<usize> = (0..mean.len()).collect();
        order.sort_by(|a, b| {
            mean[*b]
                .partial_cmp(&mean[*a])
                .unwrap_or(Ordering::Equal)
                .then(a.cmp(b))
        });
        order
            .into_iter()
            .take(limit)
            .map(|index| RankedDisease {
                label: self.label(index),
                probability: mean[index],
            })
            .collect()
    }
}
