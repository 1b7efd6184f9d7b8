//! HTTP surface.
//!
//! All monitoring endpoints live under `/api/monitoring` and sit behind
//! the shared `x-api-key` check when a key is configured. `/health` is
//! always open.

pub mod alerts;
pub mod hosts;
pub mod imports;
pub mod telemetry;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use fleetwatch_common::StoreError;
use fleetwatch_ingest::IngestError;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

/// Error shape returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    Conflict(String),
    Unavailable(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Duplicate(what) => Self::Conflict(what),
            StoreError::Unavailable(what) => Self::Unavailable(what),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Store(err) => err.into(),
            IngestError::UnknownFormat(fmt) => {
                Self::BadRequest(format!("unknown log format: {}", fmt))
            }
            IngestError::Io(err) => Self::Unavailable(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "invalid api key".into()),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, format!("not found: {}", what)),
            Self::Conflict(what) => (StatusCode::CONFLICT, format!("duplicate: {}", what)),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

/// Reject requests without the configured agent key.
async fn require_api_key(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = &state.config.api_key {
        let provided = req
            .headers()
            .get("x-api-key")
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(req).await)
}

async fn health(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let uptime = (chrono::Utc::now() - state.started_at).num_seconds();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime,
    }))
}

/// Assemble the full router.
pub fn build_router(state: SharedState) -> Router {
    let api = Router::new()
        .merge(telemetry::router())
        .merge(imports::router())
        .merge(hosts::router())
        .merge(alerts::router())
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .nest("/api/monitoring", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
