//! Loading and validating the offline-trained artifact set.
//!
//! Every file is required. Any missing, unreadable, malformed or mismatched file is a fatal
//! error, so callers surface it before accepting the first request.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ensemble::{EnsemblePredictor, EnsembleWeights};
use crate::error::{FlowError, Result};
use crate::labels::LabelEncoder;
use crate::models::{ModelArtifact, ModelKind};
use crate::vocabulary::{SymptomVocabulary, display_name, schema_hash};

pub const SCHEMA_VERSION: u32 = 1;
pub const METADATA_FILE: &str = "metadata.json";
pub const LABEL_ENCODER_FILE: &str = "label_encoder.json";
pub const WEIGHTS_FILE: &str = "ensemble_weights.json";

/// Vocabulary, label space and weights shared by every model in the set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub schema_version: u32,
    /// Training columns in feature order.
    pub symptoms: Vec<String>,
    /// Display name to feature index.
    pub symptom_index: BTreeMap<String, usize>,
    pub prediction_classes: Vec<String>,
    #[serde(default)]
    pub model_weights: Vec<f64>,
    pub schema_hash: String,
}

impl ArtifactMetadata {
    pub fn new(symptoms: Vec<String>, prediction_classes: Vec<String>, model_weights: Vec<f64>) -> Self {
        let symptom_index = symptoms
            .iter()
            .enumerate()
            .map(|(index, symptom)| (display_name(symptom), index))
            .collect();
        let schema_hash = schema_hash(&symptoms, &prediction_classes);
        Self {
            schema_version: SCHEMA_VERSION,
            symptoms,
            symptom_index,
            prediction_classes,
            model_weights,
            schema_hash,
        }
    }
}

/// On-disk form of a single model file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEnvelope {
    pub schema_hash: String,
    pub model: ModelArtifact,
}

#[derive(Debug, Deserialize)]
struct LabelEncoderFile {
    classes: Vec<String>,
}

#[derive(Debug)]
pub struct ArtifactSet {
    pub metadata: ArtifactMetadata,
    pub vocabulary: SymptomVocabulary,
    pub labels: LabelEncoder,
    pub weights: EnsembleWeights,
    pub models: Vec<ModelArtifact>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => FlowError::ArtifactMissing {
            path: path.to_path_buf(),
        },
        _ => FlowError::ArtifactUnreadable {
            path: path.to_path_buf(),
            source,
        },
    })?;
    serde_json::from_slice(&bytes).map_err(|source| FlowError::ArtifactMalformed {
        path: path.to_path_buf(),
        source,
    })
}

fn mismatch(artifact: &str, expected: impl ToString, found: impl ToString) -> FlowError {
    FlowError::SchemaMismatch {
        artifact: artifact.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

impl ArtifactSet {
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let path = |name: &str| -> PathBuf { dir.join(name) };

        let metadata: ArtifactMetadata = read_json(&path(METADATA_FILE))?;
        if metadata.schema_version != SCHEMA_VERSION {
            return Err(mismatch(METADATA_FILE, SCHEMA_VERSION, metadata.schema_version));
        }
        let vocabulary = SymptomVocabulary::new(metadata.symptoms.clone())?;

        let encoder: LabelEncoderFile = read_json(&path(LABEL_ENCODER_FILE))?;
        if encoder.classes != metadata.prediction_classes {
            return Err(mismatch(
                LABEL_ENCODER_FILE,
                metadata.prediction_classes.join(","),
                encoder.classes.join(","),
            ));
        }
        let labels = LabelEncoder::new(encoder.classes)?;

        let expected_hash = schema_hash(vocabulary.symptoms(), labels.classes());
        if metadata.schema_hash != expected_hash {
            return Err(mismatch(METADATA_FILE, &expected_hash, &metadata.schema_hash));
        }

        if metadata.symptom_index.len() != vocabulary.len() {
            return Err(mismatch(
                METADATA_FILE,
                format!("{} indexed symptoms", vocabulary.len()),
                format!("{} indexed symptoms", metadata.symptom_index.len()),
            ));
        }
        for (name, index) in &metadata.symptom_index {
            let resolved = vocabulary.index_of(name);
            if resolved != Some(*index) {
                return Err(mismatch(
                    METADATA_FILE,
                    format!("'{name}' at index {index}"),
                    format!("{resolved:?}"),
                ));
            }
        }

        let raw_weights: Vec<f64> = read_json(&path(WEIGHTS_FILE))?;
        let weights = EnsembleWeights::new(raw_weights)?;
        if !metadata.model_weights.is_empty() {
            let declared = EnsembleWeights::new(metadata.model_weights.clone())?;
            let agrees = declared.len() == weights.len()
                && declared
                    .as_slice()
                    .iter()
                    .zip(weights.as_slice())
                    .all(|(a, b)| (a - b).abs() < 1e-9);
            if !agrees {
                return Err(mismatch(
                    WEIGHTS_FILE,
                    format!("{:?}", declared.as_slice()),
                    format!("{:?}", weights.as_slice()),
                ));
            }
        }

        let mut models = Vec::with_capacity(ModelKind::ALL.len());
        for kind in ModelKind::ALL {
            let envelope: ModelEnvelope = read_json(&path(kind.file_name()))?;
            if envelope.schema_hash != expected_hash {
                return Err(mismatch(kind.file_name(), &expected_hash, &envelope.schema_hash));
            }
            if envelope.model.kind() != kind {
                return Err(FlowError::invalid(
                    kind.file_name(),
                    format!("contains a {} model", envelope.model.kind()),
                ));
            }
            models.push(envelope.model);
        }

        info!(
            models_dir = %dir.display(),
            symptoms = vocabulary.len(),
            classes = labels.len(),
            models = models.len(),
            schema_hash = %expected_hash,
            "Loaded artifact set"
        );

        Ok(Self {
            metadata,
            vocabulary,
            labels,
            weights,
            models,
        })
    }

    pub fn into_predictor(self) -> Result<EnsemblePredictor> {
        EnsemblePredictor::new(self.vocabulary, self.labels, self.models, self.weights)
    }
}

/// Loads every artifact from `dir` and builds the ensemble, failing fast on any problem.
pub fn load_predictor(dir: impl AsRef<Path>) -> Result<EnsemblePredictor> {
    ArtifactSet::load(dir)?.into_predictor()
}
