use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::config::ConversationConfig;
use super::phrasing::{Phrasing, RandomPhrasing};
use super::session::{
    ConversationSession, ConversationState, DiagnosisEntry, Role, SessionPrediction,
    TranscriptEntry,
};
use crate::ensemble::EnsemblePredictor;
use crate::extractor::SymptomExtractor;

/// Main diagnosis plus this many alternatives.
const ALTERNATIVES: usize = 2;

/// The assistant's reply to one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub symptoms_reported: Vec<String>,
    pub diagnosis: DiagnosisEntry,
    pub alternatives: Vec<DiagnosisEntry>,
    pub conversation: Vec<TranscriptEntry>,
}

/// Drives the question/answer loop over a [`ConversationSession`].
///
/// Each inbound message is merged into the session and answered by the first applicable
/// step: a queued follow-up (FIFO), the next unasked symptom group (config order), or a fresh
/// prediction over everything reported so far. Once predicting, every message re-runs the
/// prediction and no further questions are asked.
pub struct ConversationEngine {
    config: Arc<ConversationConfig>,
    extractor: SymptomExtractor,
    predictor: Arc<EnsemblePredictor>,
    phrasing: Arc<dyn Phrasing>,
}

impl ConversationEngine {
    pub fn new(config: Arc<ConversationConfig>, predictor: Arc<EnsemblePredictor>) -> Self {
        let extractor = SymptomExtractor::new(config.keywords.clone());
        Self {
            config,
            extractor,
            predictor,
            phrasing: Arc::new(RandomPhrasing),
        }
    }

    pub fn with_phrasing(mut self, phrasing: Arc<dyn Phrasing>) -> Self {
        self.phrasing = phrasing;
        self
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// Creates a session and its greeting.
    pub fn start(&self, session_id: &str) -> (ConversationSession, ChatReply) {
        let mut session = ConversationSession::new(session_id);
        let greeting = self.config.greeting.clone();
        session.push(Role::Assistant, greeting.clone());
        info!(session_id = %session_id, "Conversation started");
        (session, ChatReply { message: greeting })
    }

    pub fn step(&self, session: &mut ConversationSession, user_message: &str) -> ChatReply {
        session.push(Role::User, user_message);

        // Once predicting, symptoms are still merged but nothing more is asked.
        let gathering = session.state != ConversationState::Prediction;
        let added = session.merge_symptoms(self.extractor.extract(user_message));
        if gathering {
            for symptom in &added {
                if self.config.followups_for(symptom).is_some()
                    && !session.followup_queue.contains(symptom)
                {
                    session.followup_queue.push_back(symptom.clone());
                }
            }
        }

        let responses = &self.config.responses;
        let next_followup = if gathering {
            session.followup_queue.pop_front()
        } else {
            None
        };
        let next_group = if gathering && next_followup.is_none() {
            self.config
                .groups
                .iter()
                .find(|group| !session.has_asked(&group.name))
        } else {
            None
        };

        let message = if let Some(symptom) = next_followup {
            session.state = ConversationState::Followup;
            let bank = self.config.followups_for(&symptom).unwrap_or_default();
            format!(
                "{} {}",
                self.phrasing.pick(&responses.acknowledgment),
                self.phrasing.pick(bank)
            )
        } else if let Some(group) = next_group {
            session.state = ConversationState::GroupQuestion;
            session.asked_groups.push(group.name.clone());
            format!(
                "{} {} {}",
                self.phrasing.pick(&responses.acknowledgment),
                self.phrasing.pick(&responses.next_question),
                self.phrasing.pick(&group.questions)
            )
        } else {
            let opener = if !gathering && !added.is_empty() && !responses.empathy.is_empty() {
                self.phrasing.pick(&responses.empathy)
            } else {
                self.phrasing.pick(&responses.acknowledgment)
            };
            session.state = ConversationState::Prediction;
            let prediction = self.predict(session);
            format!(
                "{opener} Based on what you've told me, your symptoms are consistent with {} \
                 (confidence: {:.1}%). Remember that this is not a definitive diagnosis - please \
                 consult with a healthcare professional for proper evaluation and treatment.",
                prediction.main.disease, prediction.main.confidence
            )
        };

        debug!(
            session_id = %session.id,
            state = ?session.state,
            new_symptoms = ?added,
            queued_followups = session.followup_queue.len(),
            asked_groups = session.asked_groups.len(),
            "Conversation step complete"
        );

        session.push(Role::Assistant, message.clone());
        ChatReply { message }
    }

    /// Ranks diseases over the accumulated symptoms and stores the result on the session.
    pub fn predict(&self, session: &mut ConversationSession) -> SessionPrediction {
        let vector = self.predictor.encode(&session.reported_symptoms);
        let mut ranked = self
            .predictor
            .rank(vector, ALTERNATIVES + 1)
            .into_iter()
            .map(|r| DiagnosisEntry {
                disease: r.label.name,
                confidence: r.probability * 100.0,
            });

        // rank never returns fewer than one entry for a non-empty label set
        let main = ranked.next().unwrap_or_else(|| DiagnosisEntry {
            disease: String::new(),
            confidence: 0.0,
        });
        let prediction = SessionPrediction {
            main,
            alternatives: ranked.collect(),
            symptoms_revision: session.symptoms_revision,
        };

        info!(
            session_id = %session.id,
            disease = %prediction.main.disease,
            confidence = prediction.main.confidence,
            symptoms = session.reported_symptoms.len(),
            "Conversation prediction computed"
        );
        session.prediction = Some(prediction.clone());
        prediction
    }

    /// Summary of the session. Predicts only when the stored prediction is missing or stale;
    /// the transcript is never touched.
    pub fn summarize(&self, session: &mut ConversationSession) -> SummaryResult {
        let prediction = match &session.prediction {
            Some(prediction) if !session.prediction_is_stale() => prediction.clone(),
            _ => self.predict(session),
        };
        SummaryResult {
            symptoms_reported: session.reported_symptoms.iter().cloned().collect(),
            diagnosis: prediction.main,
            alternatives: prediction.alternatives,
            conversation: session.transcript.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::conversation::phrasing::FirstPhrasing;
    use crate::testing;

    /// Walks through the options so consecutive picks differ.
    #[derive(Default)]
    struct RotatingPhrasing(AtomicUsize);

    impl Phrasing for RotatingPhrasing {
        fn pick<'a>(&self, options: &'a [String]) -> &'a str {
            if options.is_empty() {
                return "";
            }
            let n = self.0.fetch_add(1, Ordering::Relaxed);
            &options[(n * 7 + 3) % options.len()]
        }
    }

    fn engine(phrasing: Arc<dyn Phrasing>) -> ConversationEngine {
        let config = Arc::new(ConversationConfig::builtin().unwrap());
        ConversationEngine::new(config, Arc::new(testing::predictor())).with_phrasing(phrasing)
    }

    #[test]
    fn test_greeting() {
        let engine = engine(Arc::new(FirstPhrasing));
        let (session, reply) = engine.start("s1");
        assert!(reply.message.starts_with("Hi there!"));
        assert_eq!(session.state, ConversationState::Greeting);
        assert_eq!(session.transcript.len(), 1);
        assert_eq!(session.transcript[0].role, Role::Assistant);
    }

    #[test]
    fn test_followups_come_before_groups() {
        let engine = engine(Arc::new(FirstPhrasing));
        let (mut session, _) = engine.start("s1");

        let reply = engine.step(&mut session, "I have a headache and a fever");
        assert_eq!(session.state, ConversationState::Followup);
        // fever sorts before headache, both are queued
        assert_eq!(reply.message, "I understand. How high is your fever?");
        assert_eq!(session.followup_queue, ["headache"]);

        let reply = engine.step(&mut session, "about 39 degrees");
        assert_eq!(session.state, ConversationState::Followup);
        assert_eq!(reply.message, "I understand. Where exactly is the pain?");

        let reply = engine.step(&mut session, "behind my eyes");
        assert_eq!(session.state, ConversationState::GroupQuestion);
        assert_eq!(session.asked_groups, ["general"]);
        assert_eq!(
            reply.message,
            "I understand. Let me ask you something else. How are you feeling overall? \
             Any fever, fatigue, or general discomfort?"
        );
    }

    #[test]
    fn test_repeated_symptom_is_merged_and_queued_once() {
        let engine = engine(Arc::new(FirstPhrasing));
        let (mut session, _) = engine.start("s1");

        engine.step(&mut session, "I have a headache");
        assert_eq!(session.state, ConversationState::Followup);
        engine.step(&mut session, "the headache is still there");

        let count = session
            .reported_symptoms
            .iter()
            .filter(|s| *s == "headache")
            .count();
        assert_eq!(count, 1);
        assert!(session.followup_queue.is_empty());
        assert_eq!(session.state, ConversationState::GroupQuestion);
    }

    #[test]
    fn test_prediction_after_all_groups_and_reentry() {
        let engine = engine(Arc::new(FirstPhrasing));
        let (mut session, _) = engine.start("s1");
        let groups = engine.config().groups.len();

        for _ in 0..groups {
            engine.step(&mut session, "nothing else");
            assert_eq!(session.state, ConversationState::GroupQuestion);
        }

        let reply = engine.step(&mut session, "I keep throwing up and feel queasy");
        // nausea has a follow-up bank, so it is asked before predicting
        assert_eq!(session.state, ConversationState::Followup);
        assert!(reply.message.ends_with("Are you also vomiting?"));

        let reply = engine.step(&mut session, "yes");
        assert_eq!(session.state, ConversationState::Prediction);
        assert!(reply.message.contains("consistent with Gastroenteritis"));
        assert!(reply.message.contains("(confidence: "));
        let first = session.prediction.clone().unwrap();
        assert_eq!(first.alternatives.len(), ALTERNATIVES);

        engine.step(&mut session, "also a rash");
        assert_eq!(session.state, ConversationState::Prediction);
        let second = session.prediction.clone().unwrap();
        assert_ne!(first.symptoms_revision, second.symptoms_revision);
    }

    #[test]
    fn test_new_symptom_after_prediction_is_not_asked_about() {
        let engine = engine(Arc::new(FirstPhrasing));
        let (mut session, _) = engine.start("s1");
        for _ in 0..=engine.config().groups.len() {
            engine.step(&mut session, "nothing");
        }
        assert_eq!(session.state, ConversationState::Prediction);
        let first = session.prediction.clone().unwrap();

        let reply = engine.step(&mut session, "now I have a headache");
        assert_eq!(session.state, ConversationState::Prediction);
        assert!(session.followup_queue.is_empty());
        assert!(session.reported_symptoms.contains("headache"));
        assert!(reply.message.starts_with("That must be difficult for you. Based on"));
        let second = session.prediction.clone().unwrap();
        assert!(second.symptoms_revision > first.symptoms_revision);
        assert!(!session.prediction_is_stale());

        let reply = engine.step(&mut session, "that's all");
        assert_eq!(session.state, ConversationState::Prediction);
        assert!(reply.message.starts_with("I understand. Based on"));
        assert_eq!(session.prediction.as_ref().unwrap().main, second.main);
    }

    #[test]
    fn test_transitions_do_not_depend_on_phrasing() {
        let messages = [
            "I have a headache and a cough",
            "it is dry",
            "it hurts on the left",
            "I'm exhausted",
            "no pain",
            "some rash and itching",
            "my stomach pain is bad",
            "I feel queasy",
            "nothing",
            "nothing",
            "nothing",
            "nothing",
            "nothing",
        ];

        let fixed = engine(Arc::new(FirstPhrasing));
        let rotating = engine(Arc::new(RotatingPhrasing::default()));
        let random = engine(Arc::new(RandomPhrasing));
        let (mut a, _) = fixed.start("a");
        let (mut b, _) = rotating.start("b");
        let (mut c, _) = random.start("c");

        for message in messages {
            fixed.step(&mut a, message);
            rotating.step(&mut b, message);
            random.step(&mut c, message);
            for other in [&b, &c] {
                assert_eq!(a.state, other.state);
                assert_eq!(a.asked_groups, other.asked_groups);
                assert_eq!(a.followup_queue, other.followup_queue);
                assert_eq!(a.reported_symptoms, other.reported_symptoms);
                assert_eq!(a.transcript.len(), other.transcript.len());
            }
        }
        assert_eq!(a.state, ConversationState::Prediction);
        assert_eq!(
            a.prediction.as_ref().map(|p| &p.main),
            b.prediction.as_ref().map(|p| &p.main)
        );
    }

    #[test]
    fn test_summary_without_symptoms() {
        let engine = engine(Arc::new(FirstPhrasing));
        let (mut session, _) = engine.start("s1");

        let summary = engine.summarize(&mut session);
        assert!(summary.symptoms_reported.is_empty());
        assert!(!summary.diagnosis.disease.is_empty());
        assert_eq!(summary.conversation.len(), 1);
    }

    #[test]
    fn test_summary_is_idempotent() {
        let engine = engine(Arc::new(FirstPhrasing));
        let (mut session, _) = engine.start("s1");
        engine.step(&mut session, "I have a rash and itching");

        let first = engine.summarize(&mut session);
        let second = engine.summarize(&mut session);
        assert_eq!(first, second);
        assert_eq!(first.diagnosis.disease, "Allergy");

        engine.step(&mut session, "my head hurts");
        let third = engine.summarize(&mut session);
        assert_eq!(third.conversation.len(), first.conversation.len() + 2);
        assert!(third.symptoms_reported.contains(&"headache".to_string()));
    }

    #[test]
    fn test_confidences_are_percentages() {
        let engine = engine(Arc::new(FirstPhrasing));
        let (mut session, _) = engine.start("s1");
        engine.step(&mut session, "throwing up and queasy");
        let summary = engine.summarize(&mut session);
        assert!(summary.diagnosis.confidence > 1.0 && summary.diagnosis.confidence <= 100.0);
        for alternative in &summary.alternatives {
            assert!(alternative.confidence <= summary.diagnosis.confidence);
        }
    }
}
