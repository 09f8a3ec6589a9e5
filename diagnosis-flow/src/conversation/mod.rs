//! Multi-turn symptom elicitation.
//!
//! States run `GREETING → {FOLLOWUP, GROUP_QUESTION}* → PREDICTION`, with the summary
//! available out of band at any point.

mod config;
mod engine;
mod phrasing;
mod session;

pub use config::{ConversationConfig, ResponseBank, SymptomGroup};
pub use engine::{ChatReply, ConversationEngine, SummaryResult};
pub use phrasing::{FirstPhrasing, Phrasing, RandomPhrasing};
pub use session::{
    ConversationSession, ConversationState, DiagnosisEntry, Role, SessionPrediction,
    TranscriptEntry,
};
