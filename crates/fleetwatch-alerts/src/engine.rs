//! Rule evaluation and dedup against the alert store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use fleetwatch_common::{
    Alert, AlertStore, DomainVisit, FileEvent, Host, MonitoringSettings, NetworkFlow,
    SettingsProvider, StoreError,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::rules::{self, Dedup, Finding};

/// Counters exported by the stats endpoint.
#[derive(Debug, Default, Serialize)]
pub struct EngineStats {
    pub evaluations: u64,
    pub raised: u64,
    pub suppressed: u64,
}

/// Evaluates the rule set for a host and persists surviving findings.
pub struct AlertEngine {
    alerts: Arc<dyn AlertStore>,
    settings: Arc<dyn SettingsProvider>,
    evaluations: AtomicU64,
    raised: AtomicU64,
    suppressed: AtomicU64,
}

impl AlertEngine {
    pub fn new(alerts: Arc<dyn AlertStore>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            alerts,
            settings,
            evaluations: AtomicU64::new(0),
            raised: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            evaluations: self.evaluations.load(Ordering::Relaxed),
            raised: self.raised.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
        }
    }

    /// Fetch the settings snapshot, falling back to defaults when the
    /// provider is unavailable. Rule evaluation never blocks on config.
    async fn settings_snapshot(&self) -> MonitoringSettings {
        match self.settings.snapshot().await {
            Ok(s) => s,
            Err(err) => {
                warn!(%err, "settings provider unavailable, using defaults");
                MonitoringSettings::default()
            }
        }
    }

    /// Run every batch-scoped rule for one host and persist new alerts.
    ///
    /// Returns the alerts actually raised (post-dedup). Store failures on
    /// one finding are logged and do not abort the rest.
    pub async fn evaluate(
        &self,
        host: &Host,
        flows: &[NetworkFlow],
        file_events: &[FileEvent],
        visits: &[DomainVisit],
    ) -> Result<Vec<Alert>, StoreError> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let settings = self.settings_snapshot().await;

        let mut findings = rules::high_network_usage(host, flows);
        findings.extend(rules::high_upload(host, flows, &settings));
        findings.extend(rules::bulk_file_deletion(host, file_events, &settings));
        findings.extend(rules::suspicious_upload(host, visits, &settings));
        findings.extend(rules::off_network(host, &settings));
        findings.extend(rules::resource_pressure(host, &settings));

        self.persist(host, findings).await
    }

    /// Run only the network-volume rules.
    ///
    /// For flow-only producers (the NetFlow collector), where the host
    /// record carries stale state the datagram says nothing about.
    pub async fn evaluate_network(
        &self,
        host: &Host,
        flows: &[NetworkFlow],
    ) -> Result<Vec<Alert>, StoreError> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let settings = self.settings_snapshot().await;

        let mut findings = rules::high_network_usage(host, flows);
        findings.extend(rules::high_upload(host, flows, &settings));

        self.persist(host, findings).await
    }

    /// Dedup-check and persist a set of findings for a host.
    pub async fn persist(
        &self,
        host: &Host,
        findings: Vec<Finding>,
    ) -> Result<Vec<Alert>, StoreError> {
        let mut raised = Vec::new();
        for finding in findings {
            let since = match finding.dedup {
                Dedup::UnresolvedOnly => None,
                Dedup::Window(window) => Some(Utc::now() - window),
            };
            let duplicate = self
                .alerts
                .has_unresolved(host.id, finding.kind, finding.correlated.as_deref(), since)
                .await?;
            if duplicate {
                self.suppressed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    hostname = %host.hostname,
                    kind = ?finding.kind,
                    "suppressed duplicate finding"
                );
                continue;
            }

            let mut alert = Alert::open(
                host.id,
                &host.hostname,
                finding.kind,
                finding.severity,
                finding.title,
                finding.description,
            )
            .with_metadata(finding.metadata);
            if let Some(key) = finding.correlated {
                alert = alert.with_correlated(key);
            }

            match self.alerts.insert_alert(alert.clone()).await {
                Ok(()) => {
                    self.raised.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        hostname = %host.hostname,
                        kind = ?alert.kind,
                        severity = ?alert.severity,
                        "alert raised"
                    );
                    raised.push(alert);
                }
                Err(err) => {
                    warn!(%err, hostname = %host.hostname, "failed to persist alert");
                }
            }
        }
        Ok(raised)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fleetwatch_common::{
        AlertKind, FlowSource, HostStore, MemoryStore, Severity, StaticSettings,
    };
    use uuid::Uuid;

    fn engine_with_store() -> (AlertEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = AlertEngine::new(
            store.clone() as Arc<dyn AlertStore>,
            Arc::new(StaticSettings::default()),
        );
        (engine, store)
    }

    fn big_flow(host: &Host) -> fleetwatch_common::NetworkFlow {
        fleetwatch_common::NetworkFlow {
            id: Uuid::new_v4(),
            host_id: host.id,
            hostname: host.hostname.clone(),
            pid: None,
            process: Some("backup.exe".into()),
            protocol: "tcp".into(),
            local_address: "10.0.0.9".into(),
            local_port: 50001,
            remote_address: "198.51.100.20".into(),
            remote_port: 443,
            bytes_in: 300 * 1024 * 1024,
            bytes_out: 0,
            packets_in: 0,
            packets_out: 0,
            source: FlowSource::Agent,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_findings_are_suppressed() {
        let (engine, store) = engine_with_store();
        let host = store.insert_host(Host::new("wks-050", "Linux")).await.unwrap();

        let first = engine
            .evaluate(&host, &[big_flow(&host)], &[], &[])
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind, AlertKind::HighNetworkUsage);

        // Same process again while the alert is unresolved: suppressed.
        let second = engine
            .evaluate(&host, &[big_flow(&host)], &[], &[])
            .await
            .unwrap();
        assert!(second.is_empty());
        assert_eq!(engine.stats().suppressed, 1);
    }

    #[tokio::test]
    async fn dedup_is_per_correlated_key() {
        let (engine, store) = engine_with_store();
        let host = store.insert_host(Host::new("wks-051", "Linux")).await.unwrap();

        engine
            .evaluate(&host, &[big_flow(&host)], &[], &[])
            .await
            .unwrap();

        let mut other = big_flow(&host);
        other.process = Some("sync.exe".into());
        let raised = engine.evaluate(&host, &[other], &[], &[]).await.unwrap();
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].correlated.as_deref(), Some("sync.exe"));
    }

    #[tokio::test]
    async fn windowed_dedup_expires() {
        let (engine, store) = engine_with_store();
        let host = store.insert_host(Host::new("wks-052", "macOS")).await.unwrap();

        // An unresolved upload alert from ten minutes ago is outside the
        // 60-second window and must not suppress a new one.
        let mut stale = Alert::open(
            host.id,
            &host.hostname,
            AlertKind::HighUpload,
            Severity::High,
            "High Upload Volume",
            "old",
        );
        stale.created_at = Utc::now() - Duration::minutes(10);
        store.insert_alert(stale).await.unwrap();

        let mut upload = big_flow(&host);
        upload.process = None;
        upload.bytes_in = 0;
        upload.bytes_out = 200 * 1024 * 1024;
        let raised = engine.evaluate(&host, &[upload], &[], &[]).await.unwrap();
        assert!(raised.iter().any(|a| a.kind == AlertKind::HighUpload));
    }

    #[tokio::test]
    async fn network_only_evaluation_skips_host_state_rules() {
        let (engine, store) = engine_with_store();
        let mut host = Host::new("wks-054", "Linux");
        // State the off-network rule would fire on.
        host.public_ip = Some("198.51.100.9".into());
        let host = store.insert_host(host).await.unwrap();

        let raised = engine
            .evaluate_network(&host, &[big_flow(&host)])
            .await
            .unwrap();
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].kind, AlertKind::HighNetworkUsage);

        // The full evaluation does raise it, so the split is real.
        let full = engine.evaluate(&host, &[], &[], &[]).await.unwrap();
        assert!(full.iter().any(|a| a.kind == AlertKind::OffNetwork));
    }

    #[tokio::test]
    async fn resolved_alerts_do_not_suppress() {
        let (engine, store) = engine_with_store();
        let host = store.insert_host(Host::new("wks-053", "Linux")).await.unwrap();

        let first = engine
            .evaluate(&host, &[big_flow(&host)], &[], &[])
            .await
            .unwrap();
        store
            .resolve(first[0].id, Uuid::new_v4(), None)
            .await
            .unwrap();

        let second = engine
            .evaluate(&host, &[big_flow(&host)], &[], &[])
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
    }
}
