//! Rule-based fast path for common everyday symptoms.
//!
//! A request whose every symptom is in the table is answered straight from it. A single
//! unknown symptom sends the whole request to the ensemble.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fixed confidence reported for rule-based answers.
pub const RULE_CONFIDENCE: f64 = 0.7;

const COMMON_SYMPTOM_RULES: &[(&str, &[&str])] = &[
    ("Cough", &["Common Cold", "Flu", "Bronchitis"]),
    ("High Fever", &["Flu", "Common Cold", "Viral Infection"]),
    ("Headache", &["Tension Headache", "Migraine", "Stress"]),
    ("Stomach Pain", &["Gastritis", "Food Poisoning", "Indigestion"]),
    ("Nausea", &["Gastritis", "Food Poisoning", "Viral Infection"]),
    ("Vomiting", &["Gastroenteritis", "Food Poisoning"]),
    ("Diarrhea", &["Food Poisoning", "Viral Gastroenteritis"]),
    ("Skin Rash", &["Allergic Reaction", "Eczema", "Dermatitis"]),
    ("Itching", &["Allergic Reaction", "Dry Skin"]),
    ("Fatigue", &["Stress", "Common Cold", "Viral Infection"]),
    ("Sore Throat", &["Viral Infection", "Strep Throat"]),
    ("Runny Nose", &["Common Cold", "Allergic Rhinitis"]),
    ("Joint Pain", &["Muscle Strain", "Mild Arthritis"]),
    ("Back Pain", &["Muscle Strain", "Poor Posture"]),
    ("Anxiety", &["Stress", "Generalized Anxiety"]),
    ("Mild Fever", &["Viral Infection", "Common Cold"]),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch {
    /// Candidate diseases in first-seen order, without duplicates.
    pub matched_diseases: Vec<String>,
    /// Input symptoms with no table entry, in input order.
    pub unmatched_symptoms: Vec<String>,
}

impl RuleMatch {
    /// True when the ensemble can be skipped: every symptom matched and at least one
    /// disease was found.
    pub fn is_conclusive(&self) -> bool {
        self.unmatched_symptoms.is_empty() && !self.matched_diseases.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<(String, Vec<String>)>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new(
            COMMON_SYMPTOM_RULES
                .iter()
                .map(|(symptom, diseases)| {
                    (
                        symptom.to_string(),
                        diseases.iter().map(|d| d.to_string()).collect(),
                    )
                })
                .collect(),
        )
    }
}

impl RuleTable {
    pub fn new(rules: Vec<(String, Vec<String>)>) -> Self {
        let rules = rules
            .into_iter()
            .map(|(symptom, diseases)| (symptom.trim().to_lowercase(), diseases))
            .collect();
        Self { rules }
    }

    fn lookup(&self, symptom: &str) -> Option<&[String]> {
        let key = symptom.trim().to_lowercase();
        self.rules
            .iter()
            .find(|(phrase, _)| *phrase == key)
            .map(|(_, diseases)| diseases.as_slice())
    }

    /// Exact, case-insensitive lookup of every symptom.
    pub fn match_symptoms<S: AsRef<str>>(&self, symptoms: &[S]) -> RuleMatch {
        let mut result = RuleMatch::default();
        for symptom in symptoms {
            let symptom = symptom.as_ref();
            match self.lookup(symptom) {
                Some(diseases) => {
                    for disease in diseases {
                        if !result.matched_diseases.contains(disease) {
                            result.matched_diseases.push(disease.clone());
                        }
                    }
                }
                None => result.unmatched_symptoms.push(symptom.to_string()),
            }
        }

        debug!(
            matched = ?result.matched_diseases,
            unmatched = ?result.unmatched_symptoms,
            "Rule-based pre-filter evaluated"
        );
        result
    }
}
