//! Shared server state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleetwatch_alerts::AlertEngine;
use fleetwatch_common::{MemoryStore, StaticSettings};

use crate::config::ServerConfig;

/// Everything the handlers share.
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub engine: Arc<AlertEngine>,
    pub settings: Arc<StaticSettings>,
    pub config: ServerConfig,
    pub started_at: DateTime<Utc>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: ServerConfig) -> SharedState {
        let store = Arc::new(MemoryStore::new());
        let settings = Arc::new(StaticSettings::new(config.monitoring.clone()));
        let engine = Arc::new(AlertEngine::new(store.clone(), settings.clone()));
        Arc::new(Self {
            store,
            engine,
            settings,
            config,
            started_at: Utc::now(),
        })
    }
}
