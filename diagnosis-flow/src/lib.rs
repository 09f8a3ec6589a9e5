//! Symptom-based disease prediction.
//!
//! Two entry points share one read-only [`EnsemblePredictor`]:
//!
//! * [`DiagnosisPredictor`] answers a flat symptom list, via the rule table when it covers
//!   every symptom and via the ensemble otherwise.
//! * [`ConversationRunner`] drives a multi-turn dialogue that collects symptoms from free
//!   text and finishes with a ranked diagnosis.
//!
//! The predictor is built once at startup from an artifact directory with
//! [`load_predictor`], which fails on any missing or inconsistent file.

pub mod artifacts;
pub mod conversation;
pub mod ensemble;
pub mod error;
pub mod extractor;
pub mod history;
pub mod labels;
pub mod models;
pub mod prediction;
pub mod prefilter;
pub mod runner;
pub mod storage;
pub mod vocabulary;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use artifacts::{ArtifactMetadata, ArtifactSet, load_predictor};
pub use conversation::{
    ChatReply, ConversationConfig, ConversationEngine, ConversationSession, ConversationState,
    DiagnosisEntry, Phrasing, RandomPhrasing, SummaryResult, TranscriptEntry,
};
pub use ensemble::{Arbiter, EnsemblePrediction, EnsemblePredictor, EnsembleWeights, RankedDisease};
pub use error::{FlowError, Result};
pub use extractor::SymptomExtractor;
pub use history::{InMemoryPredictionHistory, PredictionHistory, PredictionRecord};
pub use labels::{DiseaseLabel, LabelEncoder};
pub use models::{Classifier, ModelArtifact, ModelKind};
pub use prediction::{
    DiagnosisPredictor, FinalPrediction, PredictionRequest, PredictionResult, PredictionType,
    SymptomModel,
};
pub use prefilter::{RULE_CONFIDENCE, RuleMatch, RuleTable};
pub use runner::{ConversationRunner, validate_session_id};
pub use storage::{InMemorySessionStore, SessionStore, spawn_eviction};
pub use vocabulary::{FeatureVector, SymptomVocabulary};
