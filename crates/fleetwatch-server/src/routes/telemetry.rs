//! Agent-facing endpoints: registration and telemetry ingestion.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use fleetwatch_common::SettingsProvider;
use fleetwatch_ingest::identity::{register_host, RegisterRequest};
use fleetwatch_ingest::normalize::apply_batch;
use fleetwatch_ingest::TelemetryBatch;
use serde_json::json;
use tracing::info;

use crate::routes::ApiError;
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/events", post(ingest_events))
        .route("/register", post(register))
}

async fn register(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.hostname.is_empty() {
        return Err(ApiError::BadRequest("hostname is required".into()));
    }
    let host = register_host(state.store.as_ref(), req).await?;
    info!(hostname = %host.hostname, "host registered");
    Ok(Json(json!({
        "success": true,
        "host_id": host.id,
        "agent_id": host.agent_id,
        "config": {
            "poll_interval_secs": state.config.agent_poll_secs,
            "events_path": "/api/monitoring/events",
        },
    })))
}

async fn ingest_events(
    State(state): State<SharedState>,
    Json(batch): Json<TelemetryBatch>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if batch.agent_id.is_empty() || batch.hostname.is_empty() {
        return Err(ApiError::BadRequest(
            "agent_id and hostname are required".into(),
        ));
    }
    let settings = state.settings.snapshot().await.unwrap_or_default();
    let (host, summary) =
        apply_batch(state.store.as_ref(), &state.engine, &settings, batch).await?;
    Ok(Json(json!({
        "success": true,
        "host_id": host.id,
        "summary": summary,
    })))
}
