//! Agent wire format.
//!
//! The shapes the endpoint agent POSTs, kept separate from the canonical
//! model so agent field drift stays at this boundary. Field names match
//! the agent payload; unknown fields are ignored.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One telemetry push from an agent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryBatch {
    pub agent_id: String,
    pub hostname: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metrics: Option<MetricsReport>,
    #[serde(default)]
    pub host_ip: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub vpn: Option<bool>,
    #[serde(default)]
    pub ssid: Option<String>,
    #[serde(default)]
    pub processes: Vec<ProcessReport>,
    #[serde(default)]
    pub network: Vec<FlowReport>,
    #[serde(default)]
    pub file_events: Vec<FileEventReport>,
    #[serde(default)]
    pub domains: Vec<DomainReport>,
    #[serde(default)]
    pub sessions: Vec<SessionReport>,
}

/// Host-level metrics section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsReport {
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default, rename = "osVersion")]
    pub os_version: Option<String>,
    #[serde(default, rename = "agentVersion")]
    pub agent_version: Option<String>,
    #[serde(default, rename = "macAddress")]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub cpu: Option<CpuReport>,
    #[serde(default)]
    pub ram: Option<GaugeReport>,
    #[serde(default)]
    pub disk: Option<GaugeReport>,
    #[serde(default)]
    pub uptime_s: Option<u64>,
    #[serde(default)]
    pub battery_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpuReport {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub cores: Option<u32>,
    #[serde(default)]
    pub usage: Option<f64>,
}

/// Shared shape for RAM (MB) and disk (GB) totals.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GaugeReport {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub used: Option<u64>,
    #[serde(default)]
    pub usage: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessReport {
    pub pid: u32,
    pub name: String,
    #[serde(default)]
    pub exe: Option<String>,
    #[serde(default)]
    pub cmdline: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub cpu_percent: Option<f64>,
    #[serde(default)]
    pub memory_mb: Option<f64>,
    /// Unix seconds.
    #[serde(default)]
    pub create_time: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ProcessReport {
    pub fn started_at(&self) -> DateTime<Utc> {
        self.create_time
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowReport {
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub process: Option<String>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub local_address: String,
    pub local_port: u16,
    pub remote_address: String,
    pub remote_port: u16,
    #[serde(default)]
    pub bytes_recv: u64,
    #[serde(default)]
    pub bytes_sent: u64,
    #[serde(default)]
    pub packets_recv: u64,
    #[serde(default)]
    pub packets_sent: u64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

fn default_protocol() -> String {
    "tcp".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileEventReport {
    pub path: String,
    pub operation: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub process: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainReport {
    pub domain: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub user_id: Option<uuid::Uuid>,
    #[serde(default)]
    pub frequency: Option<u64>,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<uuid::Uuid>,
    #[serde(default)]
    pub session_type: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub client_version: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Per-category outcome of one batch application.
///
/// Categories fail independently; `error` carries the store message for
/// the ones that did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryOutcome {
    pub received: usize,
    pub persisted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CategoryOutcome {
    pub fn ok(received: usize, persisted: usize) -> Self {
        Self {
            received,
            persisted,
            error: None,
        }
    }

    pub fn failed(received: usize, err: impl ToString) -> Self {
        Self {
            received,
            persisted: 0,
            error: Some(err.to_string()),
        }
    }
}

/// What the server reports back to the agent for one batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub flows: CategoryOutcome,
    pub file_events: CategoryOutcome,
    pub visits: CategoryOutcome,
    pub processes: CategoryOutcome,
    pub sessions: CategoryOutcome,
    pub alerts_raised: usize,
}
