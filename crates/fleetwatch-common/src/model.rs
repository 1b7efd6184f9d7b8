//! Canonical event model.
//!
//! Every producer (agent push, log-file import, NetFlow collector) maps its
//! external shape onto these records before anything is persisted or
//! evaluated. Records other than `Host` and `SessionRecord` are append-only
//! and subject to retention-based expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a managed host record.
pub type HostId = Uuid;

/// Identifier of a user account.
pub type UserId = Uuid;

/// Host liveness status.
///
/// `Offline` is only ever set by the reconciliation sweep; any inbound
/// telemetry flips the host back to `Online`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Pending,
    Online,
    Offline,
    Warning,
}

/// CPU identity and utilisation snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuInfo {
    pub model: Option<String>,
    pub cores: Option<u32>,
    /// Current usage percentage.
    pub usage: Option<f64>,
}

/// Memory totals and utilisation, in MB.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RamInfo {
    pub total_mb: Option<u64>,
    pub used_mb: Option<u64>,
    pub usage: Option<f64>,
}

/// Disk totals and utilisation, in GB.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskInfo {
    pub total_gb: Option<u64>,
    pub used_gb: Option<u64>,
    pub usage: Option<f64>,
}

/// A managed endpoint.
///
/// Hostname is unique across the fleet; the agent identifier is assigned at
/// registration and may be absent for hosts discovered through log imports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub agent_id: Option<String>,
    pub hostname: String,
    pub os: String,
    pub os_version: Option<String>,
    pub agent_version: Option<String>,
    pub ip_address: Option<String>,
    pub public_ip: Option<String>,
    pub mac_address: Option<String>,
    pub vpn_active: bool,
    pub ssid: Option<String>,
    pub cpu: CpuInfo,
    pub ram: RamInfo,
    pub disk: DiskInfo,
    pub uptime_secs: Option<u64>,
    pub battery_pct: Option<f64>,
    pub status: HostStatus,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Host {
    /// New host record in `Pending` state, first/last seen now.
    pub fn new(hostname: impl Into<String>, os: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            agent_id: None,
            hostname: hostname.into(),
            os: os.into(),
            os_version: None,
            agent_version: None,
            ip_address: None,
            public_ip: None,
            mac_address: None,
            vpn_active: false,
            ssid: None,
            cpu: CpuInfo::default(),
            ram: RamInfo::default(),
            disk: DiskInfo::default(),
            uptime_secs: None,
            battery_pct: None,
            status: HostStatus::Pending,
            first_seen: now,
            last_seen: now,
        }
    }
}

/// Origin of a network flow record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlowSource {
    /// Reported by the endpoint agent, per-process.
    Agent,
    /// Derived from a NetFlow v5 export datagram.
    NetFlow,
}

/// One observed network conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkFlow {
    pub id: Uuid,
    pub host_id: HostId,
    pub hostname: String,
    pub pid: Option<u32>,
    pub process: Option<String>,
    pub protocol: String,
    pub local_address: String,
    pub local_port: u16,
    pub remote_address: String,
    pub remote_port: u16,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    pub source: FlowSource,
    pub timestamp: DateTime<Utc>,
}

/// Origin of a domain visit record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VisitSource {
    Dns,
    Proxy,
    Agent,
    NetFlow,
}

/// A visit (or aggregated bucket of visits) to a root domain.
///
/// Records produced by the log-file adapters are pre-aggregated into fixed
/// five-minute buckets keyed by (host, domain, bucket, source); `frequency`
/// is incremented on re-observation, never overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainVisit {
    pub id: Uuid,
    pub host_id: HostId,
    pub hostname: String,
    pub user_id: Option<UserId>,
    /// Root domain (last two DNS labels), not the full FQDN.
    pub domain: String,
    /// Full URL, only retained when the privacy settings allow it.
    pub url: Option<String>,
    pub source: VisitSource,
    pub frequency: u64,
    pub bytes_transferred: u64,
    pub timestamp: DateTime<Utc>,
}

/// File-system operation kinds reported by the agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Create,
    Modify,
    Delete,
    Rename,
    Other,
}

/// One file-system event on a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEvent {
    pub id: Uuid,
    pub host_id: HostId,
    pub hostname: String,
    pub path: String,
    pub operation: FileOperation,
    pub file_type: Option<String>,
    pub size_bytes: Option<u64>,
    pub user: Option<String>,
    pub process: Option<String>,
    pub hash: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// One process observed in an agent snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub id: Uuid,
    pub host_id: HostId,
    pub hostname: String,
    pub pid: u32,
    pub name: String,
    pub exe: Option<String>,
    pub cmdline: Option<String>,
    pub user: Option<String>,
    pub cpu_percent: Option<f64>,
    pub memory_mb: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub status: String,
}

/// A user session on a host, upserted by its natural `session_id` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub host_id: HostId,
    pub user_id: Option<UserId>,
    pub session_type: String,
    pub client: Option<String>,
    pub client_version: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub active: bool,
    pub last_seen: DateTime<Utc>,
}

/// Minimal user identity consulted by the proxy-log username resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub name: String,
    pub email: String,
}
