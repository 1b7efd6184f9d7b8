//! Log-file import endpoints.
//!
//! The request body is the raw log text; `?format=` selects the dialect.

use axum::extract::{Query, State};
use axum::routing::post;
use axum::{Json, Router};
use fleetwatch_common::SettingsProvider;
use fleetwatch_ingest::import::{import_dns, import_proxy};
use serde::Deserialize;
use serde_json::json;
use tokio::io::BufReader;

use crate::routes::ApiError;
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/import/dns", post(dns))
        .route("/import/proxy", post(proxy))
}

#[derive(Debug, Deserialize)]
struct ImportParams {
    format: Option<String>,
}

async fn dns(
    State(state): State<SharedState>,
    Query(params): Query<ImportParams>,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let format = params
        .format
        .as_deref()
        .unwrap_or("bind")
        .parse::<fleetwatch_ingest::DnsFormat>()?;
    let report = import_dns(
        state.store.as_ref(),
        BufReader::new(body.as_bytes()),
        format,
    )
    .await?;
    Ok(Json(json!({ "success": true, "report": report })))
}

async fn proxy(
    State(state): State<SharedState>,
    Query(params): Query<ImportParams>,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let format = params
        .format
        .as_deref()
        .unwrap_or("squid")
        .parse::<fleetwatch_ingest::ProxyFormat>()?;
    let settings = state.settings.snapshot().await.unwrap_or_default();
    let report = import_proxy(
        state.store.as_ref(),
        BufReader::new(body.as_bytes()),
        format,
        &settings,
    )
    .await?;
    Ok(Json(json!({ "success": true, "report": report })))
}
