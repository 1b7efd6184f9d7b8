//! Host reconciliation sweep.
//!
//! The sweep is the only writer of `HostStatus::Offline`. It runs on a
//! timer but is exposed as a run-once function taking an explicit `now`,
//! so the boundary conditions are directly testable.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fleetwatch_common::{
    Alert, AlertKind, AlertStore, HostStatus, HostStore, MonitoringSettings, Severity,
    SettingsProvider, StoreError,
};
use serde_json::json;
use tracing::{info, warn};

/// How long a dismissed alert survives before the sweep deletes it.
const DISMISSED_TTL_HOURS: i64 = 24;

/// Outcome of one sweep pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub hosts_checked: usize,
    pub marked_offline: usize,
    pub alerts_raised: usize,
    pub dismissed_expired: usize,
}

/// One reconciliation pass at the given instant.
///
/// Hosts silent for longer than `offline_minutes` are marked offline and
/// get a `HostOffline` alert, deduplicated while one remains unresolved.
/// Hosts that never reported (still `Pending`) are left alone. Dismissed
/// alerts older than 24 hours are deleted.
pub async fn sweep_once<S>(
    store: &S,
    settings: &MonitoringSettings,
    now: DateTime<Utc>,
) -> Result<SweepReport, StoreError>
where
    S: HostStore + AlertStore + ?Sized,
{
    let cutoff = now - Duration::minutes(settings.thresholds.offline_minutes);
    let mut report = SweepReport::default();

    for mut host in store.all_hosts().await? {
        report.hosts_checked += 1;
        if host.status == HostStatus::Pending || host.last_seen >= cutoff {
            continue;
        }
        let silent_minutes = (now - host.last_seen).num_minutes();

        if host.status != HostStatus::Offline {
            host.status = HostStatus::Offline;
            store.update_host(host.clone()).await?;
            report.marked_offline += 1;
            info!(hostname = %host.hostname, silent_minutes, "host marked offline");
        }

        let duplicate = store
            .has_unresolved(host.id, AlertKind::HostOffline, None, None)
            .await?;
        if duplicate {
            continue;
        }
        let severity = if silent_minutes > 60 {
            Severity::High
        } else {
            Severity::Medium
        };
        let alert = Alert::open(
            host.id,
            &host.hostname,
            AlertKind::HostOffline,
            severity,
            "Host Offline",
            format!("{} has not reported for {} minutes", host.hostname, silent_minutes),
        )
        .with_metadata(json!({ "silentMinutes": silent_minutes }));
        store.insert_alert(alert).await?;
        report.alerts_raised += 1;
    }

    report.dismissed_expired = store
        .expire_dismissed(now - Duration::hours(DISMISSED_TTL_HOURS))
        .await?;

    Ok(report)
}

/// Periodic sweep loop. Never returns; run it on a spawned task.
pub async fn run_sweeper<S>(
    store: Arc<S>,
    settings: Arc<dyn SettingsProvider>,
    interval_secs: u64,
) where
    S: HostStore + AlertStore + Send + Sync + 'static + ?Sized,
{
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let snapshot = match settings.snapshot().await {
            Ok(s) => s,
            Err(err) => {
                warn!(%err, "settings provider unavailable, using defaults");
                MonitoringSettings::default()
            }
        };
        match sweep_once(store.as_ref(), &snapshot, Utc::now()).await {
            Ok(report) if report.marked_offline > 0 || report.dismissed_expired > 0 => {
                info!(?report, "reconciliation sweep complete");
            }
            Ok(_) => {}
            Err(err) => warn!(%err, "reconciliation sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwatch_common::{AlertFilter, Host, MemoryStore};

    async fn seeded_host(store: &MemoryStore, silent_for: Duration) -> Host {
        let mut host = Host::new("wks-060", "Linux");
        host.status = HostStatus::Online;
        host.last_seen = Utc::now() - silent_for;
        store.insert_host(host).await.unwrap()
    }

    #[tokio::test]
    async fn host_silent_four_minutes_stays_online() {
        let store = MemoryStore::new();
        seeded_host(&store, Duration::minutes(4)).await;

        let report = sweep_once(&store, &MonitoringSettings::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(report.marked_offline, 0);
        assert_eq!(report.alerts_raised, 0);
    }

    #[tokio::test]
    async fn host_silent_six_minutes_goes_offline() {
        let store = MemoryStore::new();
        let host = seeded_host(&store, Duration::minutes(6)).await;

        let report = sweep_once(&store, &MonitoringSettings::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(report.marked_offline, 1);
        assert_eq!(report.alerts_raised, 1);

        let updated = store.get_host(host.id).await.unwrap().unwrap();
        assert_eq!(updated.status, HostStatus::Offline);
        let alerts = store.list_alerts(AlertFilter::default()).await.unwrap();
        assert_eq!(alerts[0].kind, AlertKind::HostOffline);
        assert_eq!(alerts[0].severity, Severity::Medium);
    }

    #[tokio::test]
    async fn long_outage_is_high_severity_and_deduped() {
        let store = MemoryStore::new();
        seeded_host(&store, Duration::minutes(90)).await;

        let first = sweep_once(&store, &MonitoringSettings::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(first.alerts_raised, 1);
        let alerts = store.list_alerts(AlertFilter::default()).await.unwrap();
        assert_eq!(alerts[0].severity, Severity::High);

        // Second pass: still offline, alert unresolved, nothing new.
        let second = sweep_once(&store, &MonitoringSettings::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(second.marked_offline, 0);
        assert_eq!(second.alerts_raised, 0);
    }

    #[tokio::test]
    async fn pending_hosts_are_ignored() {
        let store = MemoryStore::new();
        let mut host = Host::new("wks-061", "Windows");
        host.last_seen = Utc::now() - Duration::hours(5);
        store.insert_host(host).await.unwrap();

        let report = sweep_once(&store, &MonitoringSettings::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(report.marked_offline, 0);
        assert_eq!(report.alerts_raised, 0);
    }

    #[tokio::test]
    async fn sweep_expires_old_dismissed_alerts() {
        let store = MemoryStore::new();
        let host = store.insert_host(Host::new("wks-062", "Linux")).await.unwrap();
        let mut alert = Alert::open(
            host.id,
            &host.hostname,
            AlertKind::OffNetwork,
            Severity::Medium,
            "Host Off Corporate Network",
            "test",
        );
        alert.dismiss();
        alert.dismissed_at = Some(Utc::now() - Duration::hours(30));
        store.insert_alert(alert).await.unwrap();

        let report = sweep_once(&store, &MonitoringSettings::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(report.dismissed_expired, 1);
    }
}
