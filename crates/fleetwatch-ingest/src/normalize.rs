//! Agent batch normalization.
//!
//! Takes one `TelemetryBatch` off the wire, resolves the host, maps each
//! category onto canonical records, persists them, and runs the alert
//! engine over the batch. Categories are independent: a store failure in
//! one is reported in the summary and does not abort the others. Only a
//! failure to resolve the host rejects the batch outright.

use chrono::Utc;
use fleetwatch_alerts::AlertEngine;
use fleetwatch_common::{
    DomainVisit, FileEvent, FileOperation, FileEventStore, FlowSource, FlowStore, Host,
    HostStore, MonitoringSettings, NetworkFlow, ProcessSnapshot, ProcessStore, SessionRecord,
    SessionStore, StoreError, VisitSource, VisitStore,
};
use tracing::warn;
use uuid::Uuid;

use crate::batch::{CategoryOutcome, IngestSummary, TelemetryBatch};
use crate::identity::resolve_batch_host;

fn file_operation(raw: &str) -> FileOperation {
    match raw.to_ascii_lowercase().as_str() {
        "create" | "created" => FileOperation::Create,
        "modify" | "modified" | "write" => FileOperation::Modify,
        "delete" | "deleted" => FileOperation::Delete,
        "rename" | "renamed" | "moved" => FileOperation::Rename,
        _ => FileOperation::Other,
    }
}

/// Apply one agent batch: persist per category and evaluate alert rules.
pub async fn apply_batch<S>(
    store: &S,
    engine: &AlertEngine,
    settings: &MonitoringSettings,
    batch: TelemetryBatch,
) -> Result<(Host, IngestSummary), StoreError>
where
    S: HostStore
        + FlowStore
        + VisitStore
        + FileEventStore
        + ProcessStore
        + SessionStore
        + ?Sized,
{
    let host = resolve_batch_host(store, &batch).await?;
    let now = batch.timestamp.unwrap_or_else(Utc::now);
    let mut summary = IngestSummary::default();

    let flows: Vec<NetworkFlow> = batch
        .network
        .iter()
        .map(|f| NetworkFlow {
            id: Uuid::new_v4(),
            host_id: host.id,
            hostname: host.hostname.clone(),
            pid: f.pid,
            process: f.process.clone(),
            protocol: f.protocol.clone(),
            local_address: f.local_address.clone(),
            local_port: f.local_port,
            remote_address: f.remote_address.clone(),
            remote_port: f.remote_port,
            bytes_in: f.bytes_recv,
            bytes_out: f.bytes_sent,
            packets_in: f.packets_recv,
            packets_out: f.packets_sent,
            source: FlowSource::Agent,
            timestamp: f.timestamp.unwrap_or(now),
        })
        .collect();

    let file_events: Vec<FileEvent> = batch
        .file_events
        .iter()
        .map(|e| FileEvent {
            id: Uuid::new_v4(),
            host_id: host.id,
            hostname: host.hostname.clone(),
            path: e.path.clone(),
            operation: file_operation(&e.operation),
            file_type: e.file_type.clone(),
            size_bytes: e.size,
            user: e.user.clone(),
            process: e.process.clone(),
            hash: e.hash.clone(),
            timestamp: e.timestamp.unwrap_or(now),
        })
        .collect();

    let visits: Vec<DomainVisit> = batch
        .domains
        .iter()
        .map(|d| DomainVisit {
            id: Uuid::new_v4(),
            host_id: host.id,
            hostname: host.hostname.clone(),
            user_id: d.user_id,
            domain: d.domain.clone(),
            url: if settings.privacy.store_full_urls {
                d.url.clone()
            } else {
                None
            },
            source: VisitSource::Agent,
            frequency: d.frequency.unwrap_or(1),
            bytes_transferred: d.bytes.unwrap_or(0),
            timestamp: d.timestamp.unwrap_or(now),
        })
        .collect();

    let processes: Vec<ProcessSnapshot> = batch
        .processes
        .iter()
        .map(|p| ProcessSnapshot {
            id: Uuid::new_v4(),
            host_id: host.id,
            hostname: host.hostname.clone(),
            pid: p.pid,
            name: p.name.clone(),
            exe: p.exe.clone(),
            cmdline: p.cmdline.clone(),
            user: p.user.clone(),
            cpu_percent: p.cpu_percent,
            memory_mb: p.memory_mb,
            started_at: p.started_at(),
            status: p.status.clone().unwrap_or_else(|| "running".into()),
        })
        .collect();

    summary.flows = match store.insert_flows(flows.clone()).await {
        Ok(n) => CategoryOutcome::ok(batch.network.len(), n),
        Err(err) => {
            warn!(%err, hostname = %host.hostname, "failed to persist flows");
            CategoryOutcome::failed(batch.network.len(), err)
        }
    };
    summary.file_events = match store.insert_file_events(file_events.clone()).await {
        Ok(n) => CategoryOutcome::ok(batch.file_events.len(), n),
        Err(err) => {
            warn!(%err, hostname = %host.hostname, "failed to persist file events");
            CategoryOutcome::failed(batch.file_events.len(), err)
        }
    };
    summary.visits = match store.insert_visits(visits.clone()).await {
        Ok(n) => CategoryOutcome::ok(batch.domains.len(), n),
        Err(err) => {
            warn!(%err, hostname = %host.hostname, "failed to persist visits");
            CategoryOutcome::failed(batch.domains.len(), err)
        }
    };
    summary.processes = match store.insert_processes(processes).await {
        Ok(n) => CategoryOutcome::ok(batch.processes.len(), n),
        Err(err) => {
            warn!(%err, hostname = %host.hostname, "failed to persist processes");
            CategoryOutcome::failed(batch.processes.len(), err)
        }
    };

    let mut sessions_ok = 0;
    let mut session_err = None;
    for s in &batch.sessions {
        let record = SessionRecord {
            session_id: s.session_id.clone(),
            host_id: host.id,
            user_id: s.user_id,
            session_type: s.session_type.clone().unwrap_or_else(|| "browser".into()),
            client: s.client.clone(),
            client_version: s.client_version.clone(),
            ip_address: s.ip_address.clone().or(host.ip_address.clone()),
            user_agent: s.user_agent.clone(),
            active: s.is_active.unwrap_or(true),
            last_seen: Utc::now(),
        };
        match store.upsert_session(record).await {
            Ok(()) => sessions_ok += 1,
            Err(err) => {
                warn!(%err, hostname = %host.hostname, "failed to upsert session");
                session_err.get_or_insert(err.to_string());
            }
        }
    }
    summary.sessions = CategoryOutcome {
        received: batch.sessions.len(),
        persisted: sessions_ok,
        error: session_err,
    };

    // Rule evaluation is best effort: the batch is already persisted, so
    // an alert-store failure here must not fail the request.
    summary.alerts_raised = match engine.evaluate(&host, &flows, &file_events, &visits).await {
        Ok(raised) => raised.len(),
        Err(err) => {
            warn!(%err, hostname = %host.hostname, "alert evaluation failed");
            0
        }
    };

    Ok((host, summary))
}
