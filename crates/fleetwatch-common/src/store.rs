//! Category-scoped record stores.
//!
//! The persistence layer proper is an external collaborator; this module
//! defines the trait seams the ingestion pipeline depends on, plus the
//! DashMap-backed [`MemoryStore`] used by the server and tests. One type
//! commonly implements several of these traits, so method names are kept
//! distinct per category. There are no cross-category transactions: a
//! batch that fails in one category is reported per category and continues
//! in the others.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::alert::{Alert, AlertId, AlertKind, AlertState, Severity};
use crate::error::StoreError;
use crate::model::{
    DomainVisit, FileEvent, Host, HostId, NetworkFlow, ProcessSnapshot, SessionRecord,
    UserAccount, UserId, VisitSource,
};
use crate::settings::MonitoringSettings;

/// Managed host records, unique by hostname and (when present) agent id.
#[async_trait::async_trait]
pub trait HostStore: Send + Sync {
    async fn get_host(&self, id: HostId) -> Result<Option<Host>, StoreError>;
    async fn find_by_agent_id(&self, agent_id: &str) -> Result<Option<Host>, StoreError>;
    async fn find_by_hostname(&self, hostname: &str) -> Result<Option<Host>, StoreError>;
    async fn find_by_ip(&self, ip: &str) -> Result<Option<Host>, StoreError>;
    /// Insert a new host; fails with [`StoreError::Duplicate`] when the
    /// hostname is already taken (the caller falls back to read-then-update).
    async fn insert_host(&self, host: Host) -> Result<Host, StoreError>;
    async fn update_host(&self, host: Host) -> Result<(), StoreError>;
    async fn all_hosts(&self) -> Result<Vec<Host>, StoreError>;
}

/// Append-only network flow records.
#[async_trait::async_trait]
pub trait FlowStore: Send + Sync {
    async fn insert_flows(&self, flows: Vec<NetworkFlow>) -> Result<usize, StoreError>;
    async fn flows_for_host_since(
        &self,
        host_id: HostId,
        since: DateTime<Utc>,
    ) -> Result<Vec<NetworkFlow>, StoreError>;
    /// Total bytes (in + out) across all hosts since the given instant.
    async fn total_bytes_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Domain visit records, with bucket-keyed upsert for adapter imports.
#[async_trait::async_trait]
pub trait VisitStore: Send + Sync {
    async fn insert_visits(&self, visits: Vec<DomainVisit>) -> Result<usize, StoreError>;
    /// Upsert on (host, domain, bucket timestamp, source): increments
    /// `frequency` and adds `bytes_transferred` when the key exists.
    async fn record_bucketed(&self, visit: DomainVisit) -> Result<(), StoreError>;
    async fn visits_for_host_since(
        &self,
        host_id: HostId,
        since: DateTime<Utc>,
    ) -> Result<Vec<DomainVisit>, StoreError>;
}

/// Append-only file events.
#[async_trait::async_trait]
pub trait FileEventStore: Send + Sync {
    async fn insert_file_events(&self, events: Vec<FileEvent>) -> Result<usize, StoreError>;
    async fn file_events_for_host_since(
        &self,
        host_id: HostId,
        since: DateTime<Utc>,
    ) -> Result<Vec<FileEvent>, StoreError>;
}

/// Append-only process snapshots.
#[async_trait::async_trait]
pub trait ProcessStore: Send + Sync {
    async fn insert_processes(&self, snapshots: Vec<ProcessSnapshot>)
        -> Result<usize, StoreError>;
}

/// User sessions, upserted by session id (idempotent re-application).
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn upsert_session(&self, session: SessionRecord) -> Result<(), StoreError>;
    async fn sessions_for_host(&self, host_id: HostId) -> Result<Vec<SessionRecord>, StoreError>;
}

/// User directory consulted by proxy-log username resolution.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Case-insensitive containment match against name or email.
    async fn find_matching_user(&self, needle: &str)
        -> Result<Option<UserAccount>, StoreError>;
}

/// Query filter for alert listings.
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub host_id: Option<HostId>,
    pub kind: Option<AlertKind>,
    pub severity: Option<Severity>,
    pub state: Option<AlertState>,
}

/// Alert records and the administrative lifecycle operations.
#[async_trait::async_trait]
pub trait AlertStore: Send + Sync {
    async fn insert_alert(&self, alert: Alert) -> Result<(), StoreError>;
    async fn get_alert(&self, id: AlertId) -> Result<Option<Alert>, StoreError>;
    async fn list_alerts(&self, filter: AlertFilter) -> Result<Vec<Alert>, StoreError>;
    /// Dedup probe: is there an unresolved alert of this kind for this host
    /// (and correlated key, when given), created at or after `since`?
    async fn has_unresolved(
        &self,
        host_id: HostId,
        kind: AlertKind,
        correlated: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError>;
    async fn open_count_for_host(&self, host_id: HostId) -> Result<usize, StoreError>;
    async fn acknowledge(&self, id: AlertId, by: UserId) -> Result<Alert, StoreError>;
    async fn resolve(
        &self,
        id: AlertId,
        by: UserId,
        note: Option<String>,
    ) -> Result<Alert, StoreError>;
    async fn dismiss(&self, id: AlertId) -> Result<Alert, StoreError>;
    /// Drop dismissed alerts older than the cutoff; returns how many.
    async fn expire_dismissed(&self, older_than: DateTime<Utc>) -> Result<usize, StoreError>;
}

fn bucket_key(host_id: HostId, domain: &str, ts: DateTime<Utc>, source: VisitSource) -> String {
    format!("{}|{}|{}|{:?}", host_id, domain, ts.timestamp(), source)
}

/// In-memory store backing all category traits.
#[derive(Default)]
pub struct MemoryStore {
    hosts: DashMap<HostId, Host>,
    hostname_idx: DashMap<String, HostId>,
    agent_idx: DashMap<String, HostId>,
    flows: DashMap<Uuid, NetworkFlow>,
    visits: DashMap<Uuid, DomainVisit>,
    visit_buckets: DashMap<String, Uuid>,
    file_events: DashMap<Uuid, FileEvent>,
    processes: DashMap<Uuid, ProcessSnapshot>,
    sessions: DashMap<String, SessionRecord>,
    users: DashMap<UserId, UserAccount>,
    alerts: DashMap<AlertId, Alert>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user account (test and bootstrap convenience).
    pub fn add_user(&self, user: UserAccount) {
        self.users.insert(user.id, user);
    }

    /// Retention sweep: drop append-only records older than their
    /// category's configured window.
    pub fn prune_expired(&self, settings: &MonitoringSettings, now: DateTime<Utc>) -> usize {
        let mut pruned = 0;
        let flow_cutoff = now - Duration::days(settings.retention.network_flows_days as i64);
        let visit_cutoff = now - Duration::days(settings.retention.domain_visits_days as i64);
        let file_cutoff = now - Duration::days(settings.retention.file_events_days as i64);
        let proc_cutoff = now - Duration::days(settings.retention.process_snapshots_days as i64);

        self.flows.retain(|_, f| {
            let keep = f.timestamp >= flow_cutoff;
            if !keep {
                pruned += 1;
            }
            keep
        });
        self.visits.retain(|_, v| {
            let keep = v.timestamp >= visit_cutoff;
            if !keep {
                pruned += 1;
            }
            keep
        });
        self.visit_buckets
            .retain(|_, id| self.visits.contains_key(id));
        self.file_events.retain(|_, e| {
            let keep = e.timestamp >= file_cutoff;
            if !keep {
                pruned += 1;
            }
            keep
        });
        self.processes.retain(|_, p| {
            let keep = p.started_at >= proc_cutoff;
            if !keep {
                pruned += 1;
            }
            keep
        });
        let session_cutoff = now - Duration::days(settings.retention.sessions_days as i64);
        self.sessions.retain(|_, s| {
            let keep = s.last_seen >= session_cutoff;
            if !keep {
                pruned += 1;
            }
            keep
        });
        pruned
    }
}

#[async_trait::async_trait]
impl HostStore for MemoryStore {
    async fn get_host(&self, id: HostId) -> Result<Option<Host>, StoreError> {
        Ok(self.hosts.get(&id).map(|h| h.clone()))
    }

    async fn find_by_agent_id(&self, agent_id: &str) -> Result<Option<Host>, StoreError> {
        match self.agent_idx.get(agent_id) {
            Some(id) => self.get_host(*id).await,
            None => Ok(None),
        }
    }

    async fn find_by_hostname(&self, hostname: &str) -> Result<Option<Host>, StoreError> {
        match self.hostname_idx.get(hostname) {
            Some(id) => self.get_host(*id).await,
            None => Ok(None),
        }
    }

    async fn find_by_ip(&self, ip: &str) -> Result<Option<Host>, StoreError> {
        Ok(self
            .hosts
            .iter()
            .find(|h| h.ip_address.as_deref() == Some(ip))
            .map(|h| h.clone()))
    }

    async fn insert_host(&self, host: Host) -> Result<Host, StoreError> {
        match self.hostname_idx.entry(host.hostname.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StoreError::Duplicate(host.hostname))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(host.id);
                if let Some(agent_id) = &host.agent_id {
                    self.agent_idx.insert(agent_id.clone(), host.id);
                }
                self.hosts.insert(host.id, host.clone());
                Ok(host)
            }
        }
    }

    async fn update_host(&self, host: Host) -> Result<(), StoreError> {
        let prior = self
            .hosts
            .get(&host.id)
            .map(|h| h.clone())
            .ok_or_else(|| StoreError::NotFound(host.id.to_string()))?;

        // Retire index entries the update replaces, so a renamed host's
        // old hostname (or a rotated-out agent id) no longer resolves.
        if prior.hostname != host.hostname {
            self.hostname_idx
                .remove_if(&prior.hostname, |_, id| *id == host.id);
        }
        if prior.agent_id != host.agent_id {
            if let Some(old_agent) = &prior.agent_id {
                self.agent_idx.remove_if(old_agent, |_, id| *id == host.id);
            }
        }

        if let Some(agent_id) = &host.agent_id {
            self.agent_idx.insert(agent_id.clone(), host.id);
        }
        self.hostname_idx.insert(host.hostname.clone(), host.id);
        self.hosts.insert(host.id, host);
        Ok(())
    }

    async fn all_hosts(&self) -> Result<Vec<Host>, StoreError> {
        Ok(self.hosts.iter().map(|h| h.clone()).collect())
    }
}

#[async_trait::async_trait]
impl FlowStore for MemoryStore {
    async fn insert_flows(&self, flows: Vec<NetworkFlow>) -> Result<usize, StoreError> {
        let n = flows.len();
        for flow in flows {
            self.flows.insert(flow.id, flow);
        }
        Ok(n)
    }

    async fn flows_for_host_since(
        &self,
        host_id: HostId,
        since: DateTime<Utc>,
    ) -> Result<Vec<NetworkFlow>, StoreError> {
        Ok(self
            .flows
            .iter()
            .filter(|f| f.host_id == host_id && f.timestamp >= since)
            .map(|f| f.clone())
            .collect())
    }

    async fn total_bytes_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(self
            .flows
            .iter()
            .filter(|f| f.timestamp >= since)
            .map(|f| f.bytes_in + f.bytes_out)
            .sum())
    }
}

#[async_trait::async_trait]
impl VisitStore for MemoryStore {
    async fn insert_visits(&self, visits: Vec<DomainVisit>) -> Result<usize, StoreError> {
        let n = visits.len();
        for visit in visits {
            self.visits.insert(visit.id, visit);
        }
        Ok(n)
    }

    async fn record_bucketed(&self, visit: DomainVisit) -> Result<(), StoreError> {
        let key = bucket_key(visit.host_id, &visit.domain, visit.timestamp, visit.source);
        if let Some(existing_id) = self.visit_buckets.get(&key).map(|id| *id) {
            if let Some(mut existing) = self.visits.get_mut(&existing_id) {
                existing.frequency += visit.frequency;
                existing.bytes_transferred += visit.bytes_transferred;
                return Ok(());
            }
        }
        self.visit_buckets.insert(key, visit.id);
        self.visits.insert(visit.id, visit);
        Ok(())
    }

    async fn visits_for_host_since(
        &self,
        host_id: HostId,
        since: DateTime<Utc>,
    ) -> Result<Vec<DomainVisit>, StoreError> {
        Ok(self
            .visits
            .iter()
            .filter(|v| v.host_id == host_id && v.timestamp >= since)
            .map(|v| v.clone())
            .collect())
    }
}

#[async_trait::async_trait]
impl FileEventStore for MemoryStore {
    async fn insert_file_events(&self, events: Vec<FileEvent>) -> Result<usize, StoreError> {
        let n = events.len();
        for event in events {
            self.file_events.insert(event.id, event);
        }
        Ok(n)
    }

    async fn file_events_for_host_since(
        &self,
        host_id: HostId,
        since: DateTime<Utc>,
    ) -> Result<Vec<FileEvent>, StoreError> {
        Ok(self
            .file_events
            .iter()
            .filter(|e| e.host_id == host_id && e.timestamp >= since)
            .map(|e| e.clone())
            .collect())
    }
}

#[async_trait::async_trait]
impl ProcessStore for MemoryStore {
    async fn insert_processes(
        &self,
        snapshots: Vec<ProcessSnapshot>,
    ) -> Result<usize, StoreError> {
        let n = snapshots.len();
        for snapshot in snapshots {
            self.processes.insert(snapshot.id, snapshot);
        }
        Ok(n)
    }
}

#[async_trait::async_trait]
impl SessionStore for MemoryStore {
    async fn upsert_session(&self, session: SessionRecord) -> Result<(), StoreError> {
        self.sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn sessions_for_host(
        &self,
        host_id: HostId,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.host_id == host_id)
            .map(|s| s.clone())
            .collect())
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryStore {
    async fn find_matching_user(
        &self,
        needle: &str,
    ) -> Result<Option<UserAccount>, StoreError> {
        let needle = needle.to_lowercase();
        Ok(self
            .users
            .iter()
            .find(|u| {
                u.email.to_lowercase().contains(&needle)
                    || u.name.to_lowercase().contains(&needle)
            })
            .map(|u| u.clone()))
    }
}

#[async_trait::async_trait]
impl AlertStore for MemoryStore {
    async fn insert_alert(&self, alert: Alert) -> Result<(), StoreError> {
        self.alerts.insert(alert.id, alert);
        Ok(())
    }

    async fn get_alert(&self, id: AlertId) -> Result<Option<Alert>, StoreError> {
        Ok(self.alerts.get(&id).map(|a| a.clone()))
    }

    async fn list_alerts(&self, filter: AlertFilter) -> Result<Vec<Alert>, StoreError> {
        let mut matches: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| {
                filter.host_id.map_or(true, |h| a.host_id == h)
                    && filter.kind.map_or(true, |k| a.kind == k)
                    && filter.severity.map_or(true, |s| a.severity == s)
                    && filter.state.map_or(true, |s| a.state == s)
            })
            .map(|a| a.clone())
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }

    async fn has_unresolved(
        &self,
        host_id: HostId,
        kind: AlertKind,
        correlated: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        Ok(self.alerts.iter().any(|a| {
            a.host_id == host_id
                && a.kind == kind
                && a.is_unresolved()
                && correlated.map_or(true, |key| a.correlated.as_deref() == Some(key))
                && since.map_or(true, |cutoff| a.created_at >= cutoff)
        }))
    }

    async fn open_count_for_host(&self, host_id: HostId) -> Result<usize, StoreError> {
        Ok(self
            .alerts
            .iter()
            .filter(|a| a.host_id == host_id && a.is_unresolved())
            .count())
    }

    async fn acknowledge(&self, id: AlertId, by: UserId) -> Result<Alert, StoreError> {
        let mut alert = self
            .alerts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        alert.acknowledge(by);
        Ok(alert.clone())
    }

    async fn resolve(
        &self,
        id: AlertId,
        by: UserId,
        note: Option<String>,
    ) -> Result<Alert, StoreError> {
        let mut alert = self
            .alerts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        alert.resolve(by, note);
        Ok(alert.clone())
    }

    async fn dismiss(&self, id: AlertId) -> Result<Alert, StoreError> {
        let mut alert = self
            .alerts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        alert.dismiss();
        Ok(alert.clone())
    }

    async fn expire_dismissed(&self, older_than: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.alerts.len();
        self.alerts.retain(|_, a| {
            !(a.state == AlertState::Dismissed
                && a.dismissed_at.map_or(false, |at| at < older_than))
        });
        Ok(before - self.alerts.len())
    }
}
