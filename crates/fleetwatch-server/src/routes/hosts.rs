//! Host listing, detail and fleet stats endpoints.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use fleetwatch_common::{AlertStore, FlowStore, Host, HostStatus, HostStore, SessionStore};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::routes::ApiError;
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/hosts", get(list_hosts))
        .route("/hosts/:id", get(get_host))
        .route("/stats", get(stats))
}

#[derive(Debug, Deserialize)]
struct HostListParams {
    status: Option<HostStatus>,
    search: Option<String>,
}

async fn list_hosts(
    State(state): State<SharedState>,
    Query(params): Query<HostListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut hosts: Vec<Host> = state
        .store
        .all_hosts()
        .await?
        .into_iter()
        .filter(|h| params.status.map_or(true, |s| h.status == s))
        .filter(|h| {
            params.search.as_deref().map_or(true, |needle| {
                h.hostname
                    .to_lowercase()
                    .contains(&needle.to_lowercase())
            })
        })
        .collect();
    hosts.sort_by(|a, b| a.hostname.cmp(&b.hostname));

    let mut items = Vec::with_capacity(hosts.len());
    for host in hosts {
        let open_alerts = state.store.open_count_for_host(host.id).await?;
        items.push(json!({ "host": host, "open_alerts": open_alerts }));
    }
    Ok(Json(json!({ "success": true, "hosts": items })))
}

async fn get_host(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let host = state
        .store
        .get_host(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
    let sessions = state.store.sessions_for_host(id).await?;
    let open_alerts = state.store.open_count_for_host(id).await?;
    Ok(Json(json!({
        "success": true,
        "host": host,
        "sessions": sessions,
        "open_alerts": open_alerts,
    })))
}

async fn stats(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, ApiError> {
    let hosts = state.store.all_hosts().await?;
    let count = |status: HostStatus| hosts.iter().filter(|h| h.status == status).count();
    let bytes_last_hour = state
        .store
        .total_bytes_since(Utc::now() - Duration::hours(1))
        .await?;
    let mut unresolved_alerts = 0;
    for host in &hosts {
        unresolved_alerts += state.store.open_count_for_host(host.id).await?;
    }
    Ok(Json(json!({
        "success": true,
        "hosts": {
            "total": hosts.len(),
            "online": count(HostStatus::Online),
            "offline": count(HostStatus::Offline),
            "warning": count(HostStatus::Warning),
            "pending": count(HostStatus::Pending),
        },
        "unresolved_alerts": unresolved_alerts,
        "bytes_last_hour": bytes_last_hour,
        "engine": state.engine.stats(),
    })))
}
