//! Server configuration.
//!
//! JSON file pointed at by `FLEETWATCH_CONFIG`; every field has a default
//! so a missing file just means defaults.

use std::path::Path;

use fleetwatch_common::MonitoringSettings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub listen_addr: String,
    /// Whether to run the NetFlow collector.
    pub netflow_enabled: bool,
    /// UDP bind address for the NetFlow collector.
    pub netflow_bind: String,
    /// Shared agent key checked against `x-api-key`. `None` disables the
    /// check (development only).
    pub api_key: Option<String>,
    /// Telemetry push cadence handed to agents at registration.
    pub agent_poll_secs: u64,
    /// Reconciliation sweep cadence.
    pub sweep_interval_secs: u64,
    /// Retention prune cadence.
    pub prune_interval_secs: u64,
    /// Monitoring settings overrides (thresholds, retention, lists).
    pub monitoring: MonitoringSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            netflow_enabled: true,
            netflow_bind: "0.0.0.0:2055".into(),
            api_key: None,
            agent_poll_secs: 60,
            sweep_interval_secs: 60,
            prune_interval_secs: 3600,
            monitoring: MonitoringSettings::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
