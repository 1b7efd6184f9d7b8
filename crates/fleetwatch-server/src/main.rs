//! FleetWatch server entry point.

use std::sync::Arc;

use fleetwatch_common::SettingsProvider;
use fleetwatch_ingest::NetFlowCollector;
use fleetwatch_server::{build_router, AppState, ServerConfig, SharedState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("FleetWatch server v{}", env!("CARGO_PKG_VERSION"));

    let config = match std::env::var("FLEETWATCH_CONFIG") {
        Ok(path) => ServerConfig::load(&path).unwrap_or_else(|err| {
            tracing::warn!(%err, path, "config not loadable, using defaults");
            ServerConfig::default()
        }),
        Err(_) => ServerConfig::default(),
    };
    if config.api_key.is_none() {
        tracing::warn!("no api_key configured, agent endpoints are unauthenticated");
    }

    let state = AppState::new(config.clone());
    spawn_background_tasks(&state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "http server listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

fn spawn_background_tasks(state: &SharedState) {
    let settings: Arc<dyn SettingsProvider> = state.settings.clone();
    tokio::spawn(fleetwatch_alerts::reconcile::run_sweeper(
        state.store.clone(),
        settings.clone(),
        state.config.sweep_interval_secs,
    ));

    let store = state.store.clone();
    let prune_settings = settings;
    let prune_interval = state.config.prune_interval_secs;
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(prune_interval));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let snapshot = prune_settings.snapshot().await.unwrap_or_default();
            let pruned = store.prune_expired(&snapshot, chrono::Utc::now());
            if pruned > 0 {
                tracing::info!(pruned, "retention prune complete");
            }
        }
    });

    if state.config.netflow_enabled {
        let collector = NetFlowCollector::new(state.store.clone(), state.engine.clone());
        let bind = state.config.netflow_bind.clone();
        tokio::spawn(async move {
            if let Err(err) = collector.run(&bind).await {
                tracing::error!(%err, "netflow collector stopped");
            }
        });
    }
}
