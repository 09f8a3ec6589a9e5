//! Symptom vocabulary and the fixed-width feature encoder.
//!
//! The vocabulary order is the training-time column order. Every classifier artifact was
//! fitted against exactly this order, so the encoder never reorders or deduplicates it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FlowError, Result};

/// Canonical comparison key for a symptom token: trimmed, lower-cased, with underscores and
/// hyphens read as spaces and runs of whitespace collapsed.
pub fn normalize_symptom(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Human-facing name of a training column, `skin_rash` -> `Skin rash`.
pub fn display_name(column: &str) -> String {
    let spaced = column.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Digest tying a vocabulary order and label order together.
///
/// Artifacts carry this value so a reordered or retrained metadata bundle is rejected at load
/// time instead of silently producing wrong predictions.
pub fn schema_hash(symptoms: &[String], classes: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    for symptom in symptoms {
        hasher.update(symptom.as_bytes());
        hasher.update(b"\n");
    }
    hasher.update(b"\x1e");
    for class in classes {
        hasher.update(class.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

/// Binary symptom-presence vector, one slot per vocabulary entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn zeros(width: usize) -> Self {
        Self(vec![0.0; width])
    }

    /// Wraps raw values without validation; see [`FeatureVector::conformed`].
    pub fn from_values(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of slots set to 1.
    pub fn active_count(&self) -> usize {
        self.0.iter().filter(|v| **v == 1.0).count()
    }

    /// The vector itself when it has `width` slots of 0/1 flags, otherwise the all-zero
    /// vector of that width.
    pub fn conformed(self, width: usize) -> Self {
        let well_formed =
            self.0.len() == width && self.0.iter().all(|v| *v == 0.0 || *v == 1.0);
        if well_formed {
            self
        } else {
            debug!(
                expected = width,
                found = self.0.len(),
                "Malformed feature vector, treating as all-zero"
            );
            Self::zeros(width)
        }
    }
}

/// Ordered training-time symptom columns.
#[derive(Debug, Clone)]
pub struct SymptomVocabulary {
    symptoms: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl SymptomVocabulary {
    pub fn new(symptoms: Vec<String>) -> Result<Self> {
        if symptoms.is_empty() {
            return Err(FlowError::invalid("vocabulary", "no symptoms"));
        }

        let mut lookup = HashMap::with_capacity(symptoms.len());
        for (index, symptom) in symptoms.iter().enumerate() {
            let key = normalize_symptom(symptom);
            if key.is_empty() {
                return Err(FlowError::invalid(
                    "vocabulary",
                    format!("blank symptom at index {index}"),
                ));
            }
            if let Some(previous) = lookup.insert(key, index) {
                return Err(FlowError::invalid(
                    "vocabulary",
                    format!("'{symptom}' collides with column {previous}"),
                ));
            }
        }

        Ok(Self { symptoms, lookup })
    }

    pub fn len(&self) -> usize {
        self.symptoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symptoms.is_empty()
    }

    pub fn symptoms(&self) -> &[String] {
        &self.symptoms
    }

    pub fn index_of(&self, symptom: &str) -> Option<usize> {
        self.lookup.get(&normalize_symptom(symptom)).copied()
    }

    pub fn contains(&self, symptom: &str) -> bool {
        self.index_of(symptom).is_some()
    }

    /// Sets the slot of every recognised symptom. Unknown names are dropped; the encoder
    /// never fails.
    pub fn encode<I, S>(&self, reported: I) -> FeatureVector
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vector = vec![0.0; self.symptoms.len()];
        for symptom in reported {
            let symptom = symptom.as_ref();
            match self.index_of(symptom) {
                Some(index) => vector[index] = 1.0,
                None => debug!(symptom = %symptom, "Ignoring symptom outside vocabulary"),
            }
        }
        FeatureVector(vector)
    }
}
