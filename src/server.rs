use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use log::{error, info};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::{RequestOverrides, ServerConfig};
use crate::error::{ApiError, Result};
use crate::gemini::GeminiClient;
use crate::models::{AnswerPayload, ExamType, GenerateExamResponse, ValidateExamResponse};
use crate::rules;
use crate::store::{self, ExerciseStore};

/// Request bodies may carry base64-encoded audio recordings.
const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<ExerciseStore>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            store: Arc::new(ExerciseStore::new()),
            http: GeminiClient::default_http(),
        }
    }

    /// Build the model client for one request, honouring header overrides.
    fn model_client(&self, headers: &HeaderMap) -> Option<GeminiClient> {
        let overrides = RequestOverrides::from_headers(headers);
        let (key, model) = overrides.resolve(&self.config);
        key.map(|key| GeminiClient::new(self.http.clone(), key, model))
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/health/keepalive", get(keepalive))
        .route("/api/config/check", get(config_check))
        .route("/api/exam/generate/:type", get(generate_exam))
        .route("/api/exam/:id/validate", post(validate_exam))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Run the server until shutdown, sweeping the exercise store hourly.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let port = config.port;
    let state = AppState::new(config);
    store::spawn_sweeper(state.store.clone());

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Server running on port {port}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn keepalive() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now().timestamp_millis() }))
}

async fn config_check(State(state): State<AppState>) -> Json<Value> {
    let has_api_key = state.config.api_key.is_some();
    if has_api_key {
        Json(json!({ "hasApiKey": true, "model": state.config.model }))
    } else {
        Json(json!({ "hasApiKey": false }))
    }
}

async fn generate_exam(
    State(state): State<AppState>,
    Path(exam_type): Path<String>,
    headers: HeaderMap,
) -> Result<Json<GenerateExamResponse>> {
    let exam_type: ExamType = exam_type.parse().map_err(|()| {
        ApiError::InvalidInput(format!(
            "Exam type must be one of: {}",
            valid_exam_types()
        ))
    })?;

    let client = state
        .model_client(&headers)
        .ok_or_else(|| ApiError::GenerationFailed(NO_KEY_MSG.to_string()))?;
    let rule_content = rules::read_generation_rules(&state.config.rules_dir, exam_type).await?;

    let exercises = client.generate(exam_type, &rule_content).await.map_err(|err| {
        error!("Error generating exam exercises: {err}");
        err
    })?;

    let id = Uuid::new_v4();
    state.store.put(id, exam_type, exercises.clone());
    info!("Generated {exam_type} exam {id} with {} question(s)", exercises.questions.len());

    Ok(Json(GenerateExamResponse {
        id,
        exam_type,
        exercises,
    }))
}

async fn validate_exam(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<ValidateExamResponse>> {
    let answers = body
        .get("answers")
        .filter(|value| value.is_array())
        .ok_or_else(|| {
            ApiError::InvalidInput("Answers must be provided as an array".to_string())
        })?;
    let answers: Vec<AnswerPayload> = serde_json::from_value(answers.clone())
        .map_err(|err| ApiError::InvalidInput(format!("Malformed answers array: {err}")))?;

    let entry = Uuid::parse_str(&id)
        .ok()
        .and_then(|uuid| state.store.get(uuid))
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "No exercise found with ID: {id}. The exercise may have expired or the ID is invalid."
            ))
        })?;

    let client = state
        .model_client(&headers)
        .ok_or_else(|| ApiError::ValidationFailed(NO_KEY_MSG.to_string()))?;
    let rule_content =
        rules::read_validation_rules(&state.config.rules_dir, entry.exam_type).await?;

    let validation = client
        .validate(entry.exam_type, &entry.exercises, &answers, &rule_content)
        .await
        .map_err(|err| {
            error!("Error validating exam: {err}");
            err
        })?;

    Ok(Json(ValidateExamResponse {
        id,
        exam_type: entry.exam_type,
        validation,
    }))
}

fn valid_exam_types() -> String {
    ExamType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

const NO_KEY_MSG: &str =
    "GEMINI_API_KEY is not configured and no x-gemini-api-key header was supplied";

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn test_state(api_key: Option<&str>) -> AppState {
        AppState::new(ServerConfig {
            port: 0,
            api_key: api_key.map(str::to_string),
            model: "gemini-2.5-flash".to_string(),
            rules_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("rules"),
        })
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = build_router(test_state(None));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn keepalive_carries_a_timestamp() {
        let app = build_router(test_state(None));
        let response = app
            .oneshot(Request::get("/health/keepalive").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_i64());
    }

    #[tokio::test]
    async fn config_check_never_reveals_the_key() {
        let app = build_router(test_state(Some("secret-key")));
        let response = app
            .oneshot(Request::get("/api/config/check").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["hasApiKey"], true);
        assert_eq!(body["model"], "gemini-2.5-flash");
        assert!(!body.to_string().contains("secret-key"));

        let app = build_router(test_state(None));
        let response = app
            .oneshot(Request::get("/api/config/check").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["hasApiKey"], false);
        assert!(body.get("model").is_none());
    }

    #[tokio::test]
    async fn generate_rejects_invalid_exam_type() {
        let app = build_router(test_state(Some("key")));
        let response = app
            .oneshot(
                Request::get("/api/exam/generate/Rekenen")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("Reading, Listening, Writing, Speaking, KNM"));
    }

    #[tokio::test]
    async fn validate_requires_an_answers_array() {
        let app = build_router(test_state(Some("key")));
        let request = Request::post(format!("/api/exam/{}/validate", Uuid::new_v4()))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"answers": "not-an-array"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let app = build_router(test_state(Some("key")));
        let request = Request::post(format!("/api/exam/{}/validate", Uuid::new_v4()))
            .header("content-type", "application/json")
            .body(Body::from(r#"{}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn validate_unknown_id_is_not_found_and_names_the_id() {
        let id = Uuid::new_v4();
        let app = build_router(test_state(Some("key")));
        let request = Request::post(format!("/api/exam/{id}/validate"))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"answers": []}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains(&id.to_string()));
    }

    #[tokio::test]
    async fn validate_non_uuid_id_is_also_not_found() {
        let app = build_router(test_state(Some("key")));
        let request = Request::post("/api/exam/not-a-uuid/validate")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"answers": []}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains("not-a-uuid"));
    }
}
