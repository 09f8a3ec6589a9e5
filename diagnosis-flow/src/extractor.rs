//! Keyword-based symptom extraction from free text.
//!
//! Matching is plain substring containment on the lower-cased utterance. Negation ("no
//! fever") is not understood: any keyword hit counts as a report.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct SymptomExtractor {
    keywords: BTreeMap<String, Vec<String>>,
}

impl SymptomExtractor {
    /// `keywords` maps each canonical symptom to its synonym phrases.
    pub fn new(keywords: BTreeMap<String, Vec<String>>) -> Self {
        let keywords = keywords
            .into_iter()
            .map(|(symptom, phrases)| {
                let phrases = phrases
                    .into_iter()
                    .map(|p| p.trim().to_lowercase())
                    .filter(|p| !p.is_empty())
                    .collect();
                (symptom, phrases)
            })
            .collect();
        Self { keywords }
    }

    pub fn symptoms(&self) -> impl Iterator<Item = &str> {
        self.keywords.keys().map(String::as_str)
    }

    pub fn extract(&self, utterance: &str) -> BTreeSet<String> {
        let text = utterance.to_lowercase();
        let found: BTreeSet<String> = self
            .keywords
            .iter()
            .filter(|(_, phrases)| phrases.iter().any(|p| text.contains(p.as_str())))
            .map(|(symptom, _)| symptom.clone())
            .collect();
        trace!(found = ?found, "Extracted symptoms");
        found
    }
}
