use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{delete, get, post},
};
use diagnosis_flow::{
    ChatReply, ConversationConfig, ConversationEngine, ConversationRunner, DiagnosisPredictor,
    FlowError, InMemoryPredictionHistory, InMemorySessionStore, PredictionHistory,
    PredictionRequest, SessionStore, SummaryResult, load_predictor,
};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::catalog::DiseaseCatalog;
use crate::config::ServiceConfig;
use crate::models::{
    DeletePredictionRequest, HistoryQuery, HistoryResponse, PredictResponse,
    ProcessMessageRequest, StartChatRequest, SummaryRequest,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

const CORRELATION_HEADER: &str = "x-correlation-id";

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn flow_error(e: FlowError) -> ApiError {
    match &e {
        FlowError::EmptySymptoms
        | FlowError::EmptyMessage
        | FlowError::InvalidSessionId(_) => bad_request_error(&e.to_string()),
        FlowError::SessionNotFound(id) => not_found_error("Session not found", id),
        _ => {
            error!(error = %e, "Request failed");
            internal_error("Internal error", &e.to_string())
        }
    }
}

fn required<'a>(value: &'a Option<String>, message: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| bad_request_error(message))
}

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<DiagnosisPredictor>,
    pub runner: ConversationRunner,
    pub sessions: Arc<dyn SessionStore>,
    pub history: Arc<dyn PredictionHistory>,
    pub catalog: Arc<DiseaseCatalog>,
}

/// Loads every startup dependency. Any error here means the service must not start.
pub fn create_app_state(config: &ServiceConfig) -> anyhow::Result<AppState> {
    let ensemble = Arc::new(load_predictor(&config.models_dir).with_context(|| {
        format!("failed to load models from {}", config.models_dir.display())
    })?);

    let conversation = match &config.conversation_config {
        Some(path) => ConversationConfig::from_file(path)?,
        None => ConversationConfig::builtin()?,
    };

    let catalog = match &config.disease_catalog_path {
        Some(path) => DiseaseCatalog::from_file(path)?,
        None => {
            warn!("DISEASE_CATALOG_PATH not set, disease ids will not be resolved");
            DiseaseCatalog::default()
        }
    };

    let sessions: Arc<dyn SessionStore> = match config.session_ttl {
        Some(ttl) => Arc::new(InMemorySessionStore::with_ttl(ttl)),
        None => Arc::new(InMemorySessionStore::new()),
    };
    let history: Arc<dyn PredictionHistory> = Arc::new(InMemoryPredictionHistory::new());

    let engine = ConversationEngine::new(Arc::new(conversation), ensemble.clone());
    let runner = ConversationRunner::new(Arc::new(engine), sessions.clone());
    let predictor = DiagnosisPredictor::new(ensemble, history.clone());

    Ok(AppState {
        predictor: Arc::new(predictor),
        runner,
        sessions,
        history,
        catalog: Arc::new(catalog),
    })
}

/// Middleware to add a correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();
    let header = HeaderValue::from_str(&correlation_id).ok();

    if let Some(value) = &header {
        request.headers_mut().insert(CORRELATION_HEADER, value.clone());
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;

    if let Some(value) = header {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/predict", post(predict))
        .route("/previous-predictions", get(previous_predictions))
        .route("/delete_prediction", delete(delete_prediction))
        .route("/start_chat", post(start_chat))
        .route("/process_message", post(process_message))
        .route("/get_summary", post(get_summary))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Diagnosis Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Symptom-based disease prediction and conversational symptom checker",
        "endpoints": {
            "POST /predict": "Predict diseases from a list of symptoms",
            "GET /previous-predictions?user_id=": "Prediction history of a user",
            "DELETE /delete_prediction": "Delete one prediction from a user's history",
            "POST /start_chat": "Start a symptom checker conversation",
            "POST /process_message": "Send a message in a conversation",
            "POST /get_summary": "Get the diagnosis summary of a conversation",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictionRequest>,
) -> ApiResult<PredictResponse> {
    info!(
        symptoms = request.symptoms.len(),
        has_user = request.user_id.is_some(),
        "Processing predict request"
    );

    let result = state.predictor.predict(request).await.map_err(flow_error)?;
    let ids = state.catalog.resolve(&result.final_prediction.names());
    if let Some(id_error) = &ids.id_error {
        warn!(id_error = %id_error, "Predicted disease not in catalog");
    }

    Ok(Json(PredictResponse { result, ids }))
}

async fn previous_predictions(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let user_id = required(&query.user_id, "User ID is required")?;
    let predictions = state.history.for_user(user_id).await.map_err(flow_error)?;
    Ok(Json(HistoryResponse {
        user_id: user_id.to_string(),
        predictions,
    }))
}

async fn delete_prediction(
    State(state): State<AppState>,
    Json(request): Json<DeletePredictionRequest>,
) -> ApiResult<Value> {
    const REQUIRED: &str = "user_id and prediction_id are required";
    let user_id = required(&request.user_id, REQUIRED)?;
    let prediction_id = required(&request.prediction_id, REQUIRED)?;
    let id = Uuid::parse_str(prediction_id)
        .map_err(|_| bad_request_error("Invalid prediction_id format"))?;

    if !state.history.delete(user_id, id).await.map_err(flow_error)? {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "No matching prediction found",
                "prediction_id": prediction_id
            })),
        ));
    }

    info!(user_id = %user_id, prediction_id = %id, "Prediction deleted");
    Ok(Json(json!({ "message": "Prediction deleted successfully" })))
}

async fn start_chat(
    State(state): State<AppState>,
    Json(request): Json<StartChatRequest>,
) -> ApiResult<ChatReply> {
    let session_id = required(&request.session_id, "No session ID provided")?;
    let reply = state.runner.start_chat(session_id).await.map_err(flow_error)?;
    Ok(Json(reply))
}

async fn process_message(
    State(state): State<AppState>,
    Json(request): Json<ProcessMessageRequest>,
) -> ApiResult<ChatReply> {
    let session_id = required(&request.session_id, "No session ID provided")?;
    let user_message = required(&request.user_message, "No user message provided")?;
    let reply = state
        .runner
        .process_message(session_id, user_message)
        .await
        .map_err(flow_error)?;
    Ok(Json(reply))
}

async fn get_summary(
    State(state): State<AppState>,
    Json(request): Json<SummaryRequest>,
) -> ApiResult<SummaryResult> {
    let session_id = required(&request.session_id, "No session ID provided")?;
    let summary = state.runner.get_summary(session_id).await.map_err(flow_error)?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> Router {
        let dir = tempfile::tempdir().unwrap();
        diagnosis_flow::testing::write_artifacts(dir.path()).unwrap();
        let catalog = dir.path().join("catalog.json");
        std::fs::write(
            &catalog,
            r#"[
                {"disease_name": "Flu", "disease_id": "d-flu", "specialty_id": "s-gp"},
                {"disease_name": "Allergy", "disease_id": "d-allergy", "specialty_id": "s-derm"}
            ]"#,
        )
        .unwrap();

        let config = ServiceConfig {
            models_dir: dir.path().to_path_buf(),
            disease_catalog_path: Some(catalog),
            ..ServiceConfig::default()
        };
        build_router(create_app_state(&config).unwrap())
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health_and_root() {
        let app = app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(&app, "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["endpoints"]["POST /predict"].is_string());
    }

    #[tokio::test]
    async fn test_correlation_id_header() {
        let app = app();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let header = response.headers().get(CORRELATION_HEADER).unwrap();
        assert!(Uuid::parse_str(header.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_rule_based_prediction_with_catalog_ids() {
        let app = app();
        let (status, body) =
            send(&app, "POST", "/predict", Some(json!({ "symptoms": ["Cough"] }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prediction_type"], "rule-based");
        assert_eq!(body["confidence_scores"]["rule_based"], 0.7);
        assert_eq!(
            body["final_prediction"],
            json!(["Common Cold", "Flu", "Bronchitis"])
        );
        assert_eq!(body["disease_id"], "d-flu");
        assert_eq!(body["specialty_id"], "s-gp");
        assert!(body.get("id_error").is_none());
    }

    #[tokio::test]
    async fn test_ml_prediction() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/predict",
            Some(json!({ "symptoms": ["Skin Rash", "Itching", "Unrecognized Symptom XYZ"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prediction_type"], "ml");
        assert_eq!(body["final_prediction"], "Allergy");
        assert_eq!(body["rf_prediction"], "Allergy");
        assert!(body["confidence_scores"]["svm"].is_number());
        assert_eq!(body["unmatched_symptoms"], json!(["Unrecognized Symptom XYZ"]));
        assert_eq!(body["disease_id"], "d-allergy");
    }

    #[tokio::test]
    async fn test_unknown_disease_reports_id_error() {
        let app = app();
        let (_, body) =
            send(&app, "POST", "/predict", Some(json!({ "symptoms": ["Back Pain"] }))).await;
        assert!(body["disease_id"].is_null());
        assert!(body["specialty_id"].is_null());
        assert!(body["id_error"].as_str().unwrap().contains("Muscle Strain"));
    }

    #[tokio::test]
    async fn test_empty_symptoms_is_bad_request() {
        let app = app();
        let (status, body) = send(&app, "POST", "/predict", Some(json!({ "symptoms": [] }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_prediction_history() {
        let app = app();
        let (_, body) = send(
            &app,
            "POST",
            "/predict",
            Some(json!({ "symptoms": ["Headache"], "user_id": "u1" })),
        )
        .await;
        assert_eq!(body["saved_to_history"], true);

        let (status, body) = send(&app, "GET", "/previous-predictions?user_id=u1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["predictions"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "GET", "/previous-predictions", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_prediction() {
        let app = app();
        send(
            &app,
            "POST",
            "/predict",
            Some(json!({ "symptoms": ["Cough"], "user_id": "u1" })),
        )
        .await;
        let (_, body) = send(&app, "GET", "/previous-predictions?user_id=u1", None).await;
        let id = body["predictions"][0]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            "DELETE",
            "/delete_prediction",
            Some(json!({ "user_id": "u1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "DELETE",
            "/delete_prediction",
            Some(json!({ "user_id": "u1", "prediction_id": "not-a-uuid" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "DELETE",
            "/delete_prediction",
            Some(json!({ "user_id": "u2", "prediction_id": id })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app,
            "DELETE",
            "/delete_prediction",
            Some(json!({ "user_id": "u1", "prediction_id": id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Prediction deleted successfully");

        let (_, body) = send(&app, "GET", "/previous-predictions?user_id=u1", None).await;
        assert!(body["predictions"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_flow() {
        let app = app();
        let (status, body) =
            send(&app, "POST", "/start_chat", Some(json!({ "session_id": "s1" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().starts_with("Hi there!"));

        let (status, body) = send(
            &app,
            "POST",
            "/process_message",
            Some(json!({ "session_id": "s1", "user_message": "I have a rash" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].is_string());

        let (status, body) =
            send(&app, "POST", "/get_summary", Some(json!({ "session_id": "s1" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symptoms_reported"], json!(["skin_rash"]));
        assert_eq!(body["diagnosis"]["disease"], "Allergy");
        assert_eq!(body["conversation"].as_array().unwrap().len(), 3);
        assert_eq!(body["conversation"][1]["role"], "user");
    }

    #[tokio::test]
    async fn test_chat_errors() {
        let app = app();
        let (status, _) = send(&app, "POST", "/start_chat", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/process_message",
            Some(json!({ "session_id": "s1", "user_message": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/start_chat",
            Some(json!({ "session_id": "bad\u{7}id" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            send(&app, "POST", "/get_summary", Some(json!({ "session_id": "missing" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["session_id"], "missing");
    }
}
