use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the dialogue is. Each reply records the state that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Greeting,
    Followup,
    GroupQuestion,
    Prediction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub message: String,
}

/// A disease name and its confidence in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisEntry {
    pub disease: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPrediction {
    pub main: DiagnosisEntry,
    pub alternatives: Vec<DiagnosisEntry>,
    /// Value of [`ConversationSession::symptoms_revision`] this was computed from.
    pub symptoms_revision: u64,
}

/// Per-session dialogue state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: ConversationState,
    pub asked_groups: Vec<String>,
    pub followup_queue: VecDeque<String>,
    pub reported_symptoms: BTreeSet<String>,
    /// Append-only.
    pub transcript: Vec<TranscriptEntry>,
    pub prediction: Option<SessionPrediction>,
    /// Bumped whenever `reported_symptoms` grows.
    pub symptoms_revision: u64,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            state: ConversationState::Greeting,
            asked_groups: Vec::new(),
            followup_queue: VecDeque::new(),
            reported_symptoms: BTreeSet::new(),
            transcript: Vec::new(),
            prediction: None,
            symptoms_revision: 0,
        }
    }

    pub fn push(&mut self, role: Role, message: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            role,
            message: message.into(),
        });
        self.updated_at = Utc::now();
    }

    /// Adds `found` to the reported set and returns the symptoms that were not there before.
    pub fn merge_symptoms(&mut self, found: impl IntoIterator<Item = String>) -> Vec<String> {
        let added: Vec<String> = found
            .into_iter()
            .filter(|symptom| self.reported_symptoms.insert(symptom.clone()))
            .collect();
        if !added.is_empty() {
            self.symptoms_revision += 1;
        }
        added
    }

    pub fn has_asked(&self, group: &str) -> bool {
        self.asked_groups.iter().any(|g| g == group)
    }

    /// True when there is no prediction or symptoms were added since it was computed.
    pub fn prediction_is_stale(&self) -> bool {
        self.prediction
            .as_ref()
            .is_none_or(|p| p.symptoms_revision != self.symptoms_revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_collapses_duplicates() {
        let mut session = ConversationSession::new("s1");
        let added = session.merge_symptoms(["headache".to_string(), "fever".to_string()]);
        assert_eq!(added.len(), 2);
        assert_eq!(session.symptoms_revision, 1);

        let added = session.merge_symptoms(["headache".to_string()]);
        assert!(added.is_empty());
        assert_eq!(session.symptoms_revision, 1);
        assert_eq!(session.reported_symptoms.len(), 2);
    }

    #[test]
    fn test_prediction_staleness() {
        let mut session = ConversationSession::new("s1");
        assert!(session.prediction_is_stale());

        session.prediction = Some(SessionPrediction {
            main: DiagnosisEntry {
                disease: "Flu".into(),
                confidence: 50.0,
            },
            alternatives: vec![],
            symptoms_revision: session.symptoms_revision,
        });
        assert!(!session.prediction_is_stale());

        session.merge_symptoms(["cough".to_string()]);
        assert!(session.prediction_is_stale());
    }

    #[test]
    fn test_transcript_roles_serialize_lowercase() {
        let mut session = ConversationSession::new("s1");
        session.push(Role::Assistant, "hello");
        let json = serde_json::to_value(&session.transcript).unwrap();
        assert_eq!(json[0]["role"], "assistant");
        assert_eq!(json[0]["message"], "hello");
    }
}
