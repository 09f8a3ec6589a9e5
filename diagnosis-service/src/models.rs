use diagnosis_flow::{PredictionRecord, PredictionResult};
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogLookup;

#[derive(Debug, Deserialize)]
pub struct StartChatRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessMessageRequest {
    pub session_id: Option<String>,
    pub user_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    pub session_id: Option<String>,
}

/// A prediction plus the catalog ids of its disease.
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    #[serde(flatten)]
    pub result: PredictionResult,
    #[serde(flatten)]
    pub ids: CatalogLookup,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeletePredictionRequest {
    pub user_id: Option<String>,
    pub prediction_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub user_id: String,
    pub predictions: Vec<PredictionRecord>,
}
