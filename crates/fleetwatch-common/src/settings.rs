//! Monitoring settings snapshot.
//!
//! Owned and mutated by an external administrative collaborator; the
//! ingestion subsystem consumes it read-only through [`SettingsProvider`].
//! Every evaluation call receives a snapshot by value, so there is no
//! global mutable configuration state. When the provider fails, callers
//! fall back to `MonitoringSettings::default()`.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Per-category retention windows, in days.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    pub network_flows_days: u32,
    pub domain_visits_days: u32,
    pub file_events_days: u32,
    pub process_snapshots_days: u32,
    pub sessions_days: u32,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            network_flows_days: 15,
            domain_visits_days: 90,
            file_events_days: 30,
            process_snapshots_days: 30,
            sessions_days: 90,
        }
    }
}

/// Privacy controls applied at normalization time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacySettings {
    /// Persist full URLs; when false only the root domain is kept.
    pub store_full_urls: bool,
    pub store_file_contents: bool,
}

/// Alert rule thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Per-batch upload threshold, MB.
    pub high_upload_mb: f64,
    /// Delete operations per batch.
    pub bulk_deletion_count: usize,
    pub high_cpu_pct: f64,
    pub high_ram_pct: f64,
    pub high_disk_pct: f64,
    /// Minutes without telemetry before a host counts as offline.
    pub offline_minutes: i64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            high_upload_mb: 150.0,
            bulk_deletion_count: 50,
            high_cpu_pct: 90.0,
            high_ram_pct: 90.0,
            high_disk_pct: 85.0,
            offline_minutes: 5,
        }
    }
}

/// Domain allow/deny lists, matched on root domains.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainLists {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

/// Corporate network context for off-network detection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// CIDR ranges, e.g. `203.0.113.0/24`.
    pub corporate_ip_ranges: Vec<String>,
    pub trusted_wifi_ssids: Vec<String>,
}

/// The singleton monitoring configuration snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringSettings {
    pub retention: RetentionSettings,
    pub privacy: PrivacySettings,
    pub thresholds: AlertThresholds,
    pub domains: DomainLists,
    pub network: NetworkSettings,
}

/// Read-only access to the settings singleton.
#[async_trait::async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Current settings snapshot.
    async fn snapshot(&self) -> Result<MonitoringSettings, StoreError>;
}

/// In-process settings provider backed by a lock-guarded snapshot.
pub struct StaticSettings {
    inner: RwLock<MonitoringSettings>,
}

impl StaticSettings {
    pub fn new(settings: MonitoringSettings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    /// Replace the snapshot (administrative settings update).
    pub fn replace(&self, settings: MonitoringSettings) {
        *self.inner.write() = settings;
    }
}

impl Default for StaticSettings {
    fn default() -> Self {
        Self::new(MonitoringSettings::default())
    }
}

#[async_trait::async_trait]
impl SettingsProvider for StaticSettings {
    async fn snapshot(&self) -> Result<MonitoringSettings, StoreError> {
        Ok(self.inner.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_reflects_replacement() {
        let provider = StaticSettings::default();
        let before = provider.snapshot().await.unwrap();
        assert_eq!(before.thresholds.offline_minutes, 5);

        let mut updated = MonitoringSettings::default();
        updated.thresholds.offline_minutes = 15;
        updated.domains.deny.push("exfil.example".into());
        provider.replace(updated);

        let after = provider.snapshot().await.unwrap();
        assert_eq!(after.thresholds.offline_minutes, 15);
        assert_eq!(after.domains.deny, vec!["exfil.example".to_string()]);
    }

    #[test]
    fn defaults_match_rule_table() {
        let t = AlertThresholds::default();
        assert_eq!(t.high_upload_mb, 150.0);
        assert_eq!(t.bulk_deletion_count, 50);
        assert_eq!(t.high_disk_pct, 85.0);
    }
}
