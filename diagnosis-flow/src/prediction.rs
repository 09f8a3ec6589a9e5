//! Direct prediction from a flat symptom list.
//!
//! The rule table answers when it covers every symptom. Otherwise the ensemble decides and
//! the rule matches are discarded. Predictions for a known user are written to the
//! prediction history on a best-effort basis.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::ensemble::{EnsemblePrediction, EnsemblePredictor};
use crate::error::{FlowError, Result};
use crate::history::{PredictionHistory, PredictionRecord};
use crate::models::ModelKind;
use crate::prefilter::{RULE_CONFIDENCE, RuleTable};

/// Anything that turns a symptom list into an ensemble decision.
pub trait SymptomModel: Send + Sync {
    fn predict_symptoms(&self, symptoms: &[String]) -> EnsemblePrediction;
}

impl SymptomModel for EnsemblePredictor {
    fn predict_symptoms(&self, symptoms: &[String]) -> EnsemblePrediction {
        self.predict(self.encode(symptoms))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionRequest {
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// One label from the ensemble, or every candidate from the rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FinalPrediction {
    Single(String),
    Multiple(Vec<String>),
}

impl FinalPrediction {
    pub fn names(&self) -> Vec<&str> {
        match self {
            FinalPrediction::Single(name) => vec![name.as_str()],
            FinalPrediction::Multiple(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionType {
    #[serde(rename = "rule-based")]
    RuleBased,
    #[serde(rename = "ml")]
    Ml,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub final_prediction: FinalPrediction,
    pub prediction_type: PredictionType,
    pub confidence_scores: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rf_prediction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nb_prediction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svm_prediction: Option<String>,
    pub unmatched_symptoms: Vec<String>,
    /// Present only when a user id was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_to_history: Option<bool>,
}

pub struct DiagnosisPredictor {
    rules: RuleTable,
    model: Arc<dyn SymptomModel>,
    history: Arc<dyn PredictionHistory>,
}

impl DiagnosisPredictor {
    pub fn new(model: Arc<dyn SymptomModel>, history: Arc<dyn PredictionHistory>) -> Self {
        Self {
            rules: RuleTable::default(),
            model,
            history,
        }
    }

    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    #[instrument(skip(self, request), fields(symptoms = request.symptoms.len()))]
    pub async fn predict(&self, request: PredictionRequest) -> Result<PredictionResult> {
        // Blank entries stay in the list and count as unmatched.
        let symptoms = request.symptoms;
        if symptoms.iter().all(|s| s.trim().is_empty()) {
            return Err(FlowError::EmptySymptoms);
        }

        let rule_match = self.rules.match_symptoms(&symptoms);
        let mut result = if rule_match.is_conclusive() {
            PredictionResult {
                final_prediction: FinalPrediction::Multiple(rule_match.matched_diseases),
                prediction_type: PredictionType::RuleBased,
                confidence_scores: BTreeMap::from([("rule_based".to_string(), RULE_CONFIDENCE)]),
                rf_prediction: None,
                nb_prediction: None,
                svm_prediction: None,
                unmatched_symptoms: rule_match.unmatched_symptoms,
                saved_to_history: None,
            }
        } else {
            let prediction = self.model.predict_symptoms(&symptoms);
            let label = |kind: ModelKind| {
                prediction
                    .per_model_labels
                    .get(&kind)
                    .map(|label| label.name.clone())
            };
            PredictionResult {
                final_prediction: FinalPrediction::Single(prediction.final_label.name.clone()),
                prediction_type: PredictionType::Ml,
                confidence_scores: prediction
                    .confidence_per_model
                    .iter()
                    .map(|(kind, confidence)| (kind.short_name().to_string(), *confidence))
                    .collect(),
                rf_prediction: label(ModelKind::RandomForest),
                nb_prediction: label(ModelKind::NaiveBayes),
                svm_prediction: label(ModelKind::Svm),
                unmatched_symptoms: rule_match.unmatched_symptoms,
                saved_to_history: None,
            }
        };

        info!(
            prediction_type = ?result.prediction_type,
            final_prediction = ?result.final_prediction.names(),
            "Prediction complete"
        );

        if let Some(user_id) = request.user_id.filter(|id| !id.trim().is_empty()) {
            let record = PredictionRecord {
                id: Uuid::new_v4(),
                user_id,
                symptoms,
                final_prediction: result.final_prediction.clone(),
                prediction_type: result.prediction_type,
                confidence_scores: result.confidence_scores.clone(),
                unmatched_symptoms: result.unmatched_symptoms.clone(),
                created_at: Utc::now(),
            };
            let saved = match self.history.record(record).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Failed to save prediction history");
                    false
                }
            };
            result.saved_to_history = Some(saved);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::history::InMemoryPredictionHistory;
    use crate::testing;

    struct CountingModel {
        inner: EnsemblePredictor,
        calls: AtomicUsize,
    }

    impl SymptomModel for CountingModel {
        fn predict_symptoms(&self, symptoms: &[String]) -> EnsemblePrediction {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.predict_symptoms(symptoms)
        }
    }

    struct FailingHistory;

    #[async_trait]
    impl PredictionHistory for FailingHistory {
        async fn record(&self, _record: PredictionRecord) -> Result<()> {
            Err(FlowError::StorageError("database unavailable".into()))
        }

        async fn for_user(&self, _user_id: &str) -> Result<Vec<PredictionRecord>> {
            Ok(vec![])
        }

        async fn delete(&self, _user_id: &str, _id: Uuid) -> Result<bool> {
            Ok(false)
        }
    }

    fn predictor() -> (DiagnosisPredictor, Arc<CountingModel>, InMemoryPredictionHistory) {
        let model = Arc::new(CountingModel {
            inner: testing::predictor(),
            calls: AtomicUsize::new(0),
        });
        let history = InMemoryPredictionHistory::new();
        let predictor = DiagnosisPredictor::new(model.clone(), Arc::new(history.clone()));
        (predictor, model, history)
    }

    fn request(symptoms: &[&str]) -> PredictionRequest {
        PredictionRequest {
            symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
            user_id: None,
        }
    }

    #[tokio::test]
    async fn test_cough_is_rule_based() {
        let (predictor, model, _) = predictor();
        let result = predictor.predict(request(&["Cough"])).await.unwrap();

        assert_eq!(result.prediction_type, PredictionType::RuleBased);
        assert_eq!(result.confidence_scores["rule_based"], 0.7);
        let names = result.final_prediction.names();
        for disease in ["Common Cold", "Flu", "Bronchitis"] {
            assert!(names.contains(&disease));
        }
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_symptom_uses_ml() {
        let (predictor, model, _) = predictor();
        let result = predictor
            .predict(request(&["Cough", "Unrecognized Symptom XYZ"]))
            .await
            .unwrap();

        assert_eq!(result.prediction_type, PredictionType::Ml);
        assert!(matches!(result.final_prediction, FinalPrediction::Single(_)));
        assert_eq!(result.unmatched_symptoms, ["Unrecognized Symptom XYZ"]);
        assert!(result.rf_prediction.is_some());
        assert!(result.nb_prediction.is_some());
        assert!(result.svm_prediction.is_some());
        assert_eq!(
            result.confidence_scores.keys().collect::<Vec<_>>(),
            ["nb", "rf", "svm"]
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cough_and_high_fever_never_reach_the_models() {
        let (predictor, model, _) = predictor();
        let result = predictor
            .predict(request(&["Cough", "High Fever"]))
            .await
            .unwrap();

        assert_eq!(result.prediction_type, PredictionType::RuleBased);
        assert!(result.unmatched_symptoms.is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ml_path_uses_vocabulary_names() {
        let (predictor, _, _) = predictor();
        let result = predictor
            .predict(request(&["Skin rash", "itching", "Sore Elbow"]))
            .await
            .unwrap();
        assert_eq!(result.final_prediction, FinalPrediction::Single("Allergy".into()));
    }

    #[tokio::test]
    async fn test_empty_symptoms_are_rejected() {
        let (predictor, _, _) = predictor();
        let err = predictor.predict(request(&[])).await.unwrap_err();
        assert!(matches!(err, FlowError::EmptySymptoms));
        let err = predictor.predict(request(&["  "])).await.unwrap_err();
        assert!(matches!(err, FlowError::EmptySymptoms));
    }

    #[tokio::test]
    async fn test_blank_entry_is_unmatched_and_uses_ml() {
        let (predictor, model, _) = predictor();
        let result = predictor.predict(request(&["Cough", ""])).await.unwrap();

        assert_eq!(result.prediction_type, PredictionType::Ml);
        assert_eq!(result.unmatched_symptoms, [""]);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_history_is_written_for_known_users() {
        let (predictor, _, history) = predictor();
        let mut anonymous = request(&["Cough"]);
        let result = predictor.predict(anonymous.clone()).await.unwrap();
        assert_eq!(result.saved_to_history, None);

        anonymous.user_id = Some("u1".into());
        let result = predictor.predict(anonymous).await.unwrap();
        assert_eq!(result.saved_to_history, Some(true));

        let records = history.for_user("u1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].prediction_type, PredictionType::RuleBased);
    }

    #[tokio::test]
    async fn test_history_failure_does_not_fail_prediction() {
        let predictor = DiagnosisPredictor::new(
            Arc::new(testing::predictor()),
            Arc::new(FailingHistory),
        );
        let result = predictor
            .predict(PredictionRequest {
                symptoms: vec!["Headache".into()],
                user_id: Some("u1".into()),
            })
            .await
            .unwrap();
        assert_eq!(result.saved_to_history, Some(false));
        assert_eq!(result.prediction_type, PredictionType::RuleBased);
    }

    #[test]
    fn test_result_serialization_shape() {
        let result = PredictionResult {
            final_prediction: FinalPrediction::Multiple(vec!["Flu".into()]),
            prediction_type: PredictionType::RuleBased,
            confidence_scores: BTreeMap::from([("rule_based".to_string(), 0.7)]),
            rf_prediction: None,
            nb_prediction: None,
            svm_prediction: None,
            unmatched_symptoms: vec![],
            saved_to_history: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["final_prediction"], serde_json::json!(["Flu"]));
        assert_eq!(json["prediction_type"], "rule-based");
        assert!(json.get("rf_prediction").is_none());
        assert!(json.get("saved_to_history").is_none());
    }
}
