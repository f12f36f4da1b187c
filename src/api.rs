// src/api.rs
//! HTTP surface: `POST /api/recommend`, `GET /_health`, JSON error bodies.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::recommend::error::{RecommendError, ValidationError, ValidationIssue};
use crate::recommend::types::{RecommendRequest, RecommendResponse};
use crate::recommend::Recommender;

#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Recommender>,
    /// Empty means any origin is allowed.
    pub allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(recommender: Recommender, allowed_origins: Vec<String>) -> Self {
        Self {
            recommender: Arc::new(recommender),
            allowed_origins,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.allowed_origins);

    Router::new()
        .route("/_health", get(health))
        .route("/api/recommend", post(recommend))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::very_permissive();
    }
    let list: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(list))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Client-facing error, rendered as `{ "error": { code, message, details? } }`.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    Recommend(RecommendError),
    NotFound,
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<RecommendError> for ApiError {
    fn from(e: RecommendError) -> Self {
        ApiError::Recommend(e)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationIssue>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: e.message(),
                    details: Some(e.issues),
                },
            ),
            ApiError::Recommend(e) => {
                let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::BAD_GATEWAY);
                if status.is_server_error() {
                    error!(target: "recommend", code = e.code(), "recommendation failed");
                }
                (
                    status,
                    ErrorBody {
                        code: e.code(),
                        message: e.to_string(),
                        details: None,
                    },
                )
            }
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: "리소스를 찾을 수 없습니다.".to_string(),
                    details: None,
                },
            ),
        };
        (status, Json(json!({ "error": body }))).into_response()
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn recommend(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let Json(raw) = body.map_err(|e| ValidationError::single("body", e.body_text()))?;
    let req: RecommendRequest =
        serde_json::from_value(raw).map_err(|e| ValidationError::single("body", e.to_string()))?;
    let query = req.validate()?;

    let items = state.recommender.recommend(&query).await?;
    Ok(Json(RecommendResponse::from(items)))
}
