//! Alert listing and lifecycle endpoints.
//!
//! Lifecycle transitions are administrative actions; the rule engine only
//! ever opens alerts.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use fleetwatch_common::{AlertFilter, AlertKind, AlertState, AlertStore, Severity};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::routes::ApiError;
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alerts/:id/acknowledge", post(acknowledge))
        .route("/alerts/:id/resolve", post(resolve))
        .route("/alerts/:id/dismiss", post(dismiss))
}

#[derive(Debug, Deserialize)]
struct AlertListParams {
    host_id: Option<Uuid>,
    kind: Option<AlertKind>,
    severity: Option<Severity>,
    state: Option<AlertState>,
}

#[derive(Debug, Default, Deserialize)]
struct ActionBody {
    #[serde(default)]
    by: Option<Uuid>,
    #[serde(default)]
    note: Option<String>,
}

async fn list_alerts(
    State(state): State<SharedState>,
    Query(params): Query<AlertListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let alerts = state
        .store
        .list_alerts(AlertFilter {
            host_id: params.host_id,
            kind: params.kind,
            severity: params.severity,
            state: params.state,
        })
        .await?;
    Ok(Json(json!({ "success": true, "alerts": alerts })))
}

async fn acknowledge(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ActionBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let alert = state
        .store
        .acknowledge(id, body.by.unwrap_or_else(Uuid::nil))
        .await?;
    Ok(Json(json!({ "success": true, "alert": alert })))
}

async fn resolve(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ActionBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let alert = state
        .store
        .resolve(id, body.by.unwrap_or_else(Uuid::nil), body.note)
        .await?;
    Ok(Json(json!({ "success": true, "alert": alert })))
}

async fn dismiss(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let alert = state.store.dismiss(id).await?;
    Ok(Json(json!({ "success": true, "alert": alert })))
}
