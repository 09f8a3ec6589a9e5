use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{FlowError, Result};

const DEFAULT_CONVERSATION: &str = include_str!("default_conversation.yaml");

/// A named bucket of related symptoms and the questions that probe it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomGroup {
    pub name: String,
    pub symptoms: Vec<String>,
    pub questions: Vec<String>,
}

/// Cosmetic filler phrases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBank {
    pub acknowledgment: Vec<String>,
    pub next_question: Vec<String>,
    /// Opens a re-run prediction after new symptoms. Falls back to `acknowledgment`.
    #[serde(default)]
    pub empathy: Vec<String>,
}

/// Static configuration of the symptom-elicitation dialogue.
///
/// Groups are asked in list order. `keywords` feeds the [`SymptomExtractor`] and `followups`
/// holds the per-symptom clarifying questions.
///
/// [`SymptomExtractor`]: crate::extractor::SymptomExtractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationConfig {
    pub greeting: String,
    pub groups: Vec<SymptomGroup>,
    pub keywords: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub followups: BTreeMap<String, Vec<String>>,
    pub responses: ResponseBank,
}

impl ConversationConfig {
    /// The configuration shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(DEFAULT_CONVERSATION)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| FlowError::InvalidConfig(format!("failed to parse YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|e| {
            FlowError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_yaml_str(&yaml)?;
        info!(
            path = %path.display(),
            groups = config.groups.len(),
            "Loaded conversation config"
        );
        Ok(config)
    }

    pub fn followups_for(&self, symptom: &str) -> Option<&[String]> {
        self.followups
            .get(symptom)
            .map(Vec::as_slice)
            .filter(|bank| !bank.is_empty())
    }

    fn validate(&self) -> Result<()> {
        if self.greeting.trim().is_empty() {
            return Err(FlowError::InvalidConfig("greeting is empty".into()));
        }
        if self.groups.is_empty() {
            return Err(FlowError::InvalidConfig("no symptom groups".into()));
        }
        let mut names = HashSet::new();
        for group in &self.groups {
            if !names.insert(group.name.as_str()) {
                return Err(FlowError::InvalidConfig(format!(
                    "duplicate symptom group '{}'",
                    group.name
                )));
            }
            if group.symptoms.is_empty() {
                return Err(FlowError::InvalidConfig(format!(
                    "symptom group '{}' lists no symptoms",
                    group.name
                )));
            }
            let mut seen = HashSet::new();
            for symptom in &group.symptoms {
                if !seen.insert(symptom.as_str()) {
                    return Err(FlowError::InvalidConfig(format!(
                        "symptom '{symptom}' listed twice in group '{}'",
                        group.name
                    )));
                }
            }
            if group.questions.is_empty() {
                return Err(FlowError::InvalidConfig(format!(
                    "symptom group '{}' has no questions",
                    group.name
                )));
            }
        }
        for (symptom, bank) in &self.followups {
            if bank.is_empty() {
                return Err(FlowError::InvalidConfig(format!(
                    "follow-up bank for '{symptom}' is empty"
                )));
            }
        }
        if self.responses.acknowledgment.is_empty() || self.responses.next_question.is_empty() {
            return Err(FlowError::InvalidConfig(
                "acknowledgment and next_question phrases are required".into(),
            ));
        }
        Ok(())
    }
}
