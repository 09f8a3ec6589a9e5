use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::prediction::{FinalPrediction, PredictionType};

/// A direct prediction made on behalf of a known user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub user_id: String,
    pub symptoms: Vec<String>,
    pub final_prediction: FinalPrediction,
    pub prediction_type: PredictionType,
    pub confidence_scores: BTreeMap<String, f64>,
    pub unmatched_symptoms: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Trait for persisting per-user prediction history
#[async_trait]
pub trait PredictionHistory: Send + Sync {
    async fn record(&self, record: PredictionRecord) -> Result<()>;
    /// Records for `user_id`, oldest first.
    async fn for_user(&self, user_id: &str) -> Result<Vec<PredictionRecord>>;
    /// Removes one of `user_id`'s records. `false` when no such record exists.
    async fn delete(&self, user_id: &str, id: Uuid) -> Result<bool>;
}

/// In-memory implementation of PredictionHistory
#[derive(Clone, Default)]
pub struct InMemoryPredictionHistory {
    records: Arc<DashMap<String, Vec<PredictionRecord>>>,
}

impl InMemoryPredictionHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PredictionHistory for InMemoryPredictionHistory {
    async fn record(&self, record: PredictionRecord) -> Result<()> {
        self.records
            .entry(record.user_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn for_user(&self, user_id: &str) -> Result<Vec<PredictionRecord>> {
        Ok(self
            .records
            .get(user_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn delete(&self, user_id: &str, id: Uuid) -> Result<bool> {
        let Some(mut records) = self.records.get_mut(user_id) else {
            return Ok(false);
        };
        let before = records.len();
        records.retain(|record| record.id != id);
        Ok(records.len() < before)
    }
}
