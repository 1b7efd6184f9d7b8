//! Host and user identity resolution.
//!
//! Agent pushes identify themselves by agent id and hostname; log imports
//! and NetFlow only carry an IP. Resolution order for agent traffic is
//! agent id, then hostname (adopting hosts first discovered through
//! imports), then registration of a new record. Import traffic never
//! creates hosts: records whose IP matches no host are dropped.

use chrono::Utc;
use fleetwatch_common::{Host, HostStatus, HostStore, StoreError, UserId, UserStore};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::batch::TelemetryBatch;

/// Explicit agent registration request.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub hostname: String,
    pub os: String,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub agent_version: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
}

/// Register a host explicitly, handing out a fresh agent id.
///
/// Re-registration under an existing hostname adopts the record and
/// rotates its agent id.
pub async fn register_host<S>(hosts: &S, req: RegisterRequest) -> Result<Host, StoreError>
where
    S: HostStore + ?Sized,
{
    let agent_id = Uuid::new_v4().to_string();
    if let Some(mut existing) = hosts.find_by_hostname(&req.hostname).await? {
        existing.agent_id = Some(agent_id);
        existing.os = req.os;
        existing.os_version = req.os_version.or(existing.os_version);
        existing.agent_version = req.agent_version.or(existing.agent_version);
        existing.ip_address = req.ip_address.or(existing.ip_address);
        existing.mac_address = req.mac_address.or(existing.mac_address);
        existing.last_seen = Utc::now();
        hosts.update_host(existing.clone()).await?;
        return Ok(existing);
    }

    let mut host = Host::new(req.hostname, req.os);
    host.agent_id = Some(agent_id);
    host.os_version = req.os_version;
    host.agent_version = req.agent_version;
    host.ip_address = req.ip_address;
    host.mac_address = req.mac_address;
    hosts.insert_host(host).await
}

/// Resolve the host a telemetry batch belongs to, creating it on first
/// contact, and fold the batch's host-level facts into the record.
pub async fn resolve_batch_host<S>(
    hosts: &S,
    batch: &TelemetryBatch,
) -> Result<Host, StoreError>
where
    S: HostStore + ?Sized,
{
    let mut host = match hosts.find_by_agent_id(&batch.agent_id).await? {
        Some(host) => host,
        None => match hosts.find_by_hostname(&batch.hostname).await? {
            Some(host) => host,
            None => {
                let os = batch
                    .metrics
                    .as_ref()
                    .and_then(|m| m.os.clone())
                    .unwrap_or_else(|| "Unknown".into());
                let mut fresh = Host::new(&batch.hostname, os);
                fresh.agent_id = Some(batch.agent_id.clone());
                match hosts.insert_host(fresh).await {
                    Ok(host) => host,
                    // Lost a registration race; the record now exists.
                    Err(StoreError::Duplicate(_)) => hosts
                        .find_by_hostname(&batch.hostname)
                        .await?
                        .ok_or_else(|| StoreError::NotFound(batch.hostname.clone()))?,
                    Err(err) => return Err(err),
                }
            }
        },
    };

    host.agent_id = Some(batch.agent_id.clone());
    host.hostname = batch.hostname.clone();
    host.status = HostStatus::Online;
    host.last_seen = Utc::now();
    if let Some(ip) = &batch.host_ip {
        host.ip_address = Some(ip.clone());
    }
    if let Some(public_ip) = &batch.public_ip {
        host.public_ip = Some(public_ip.clone());
    }
    if let Some(vpn) = batch.vpn {
        host.vpn_active = vpn;
    }
    if let Some(ssid) = &batch.ssid {
        host.ssid = Some(ssid.clone());
    }

    if let Some(metrics) = &batch.metrics {
        if let Some(os) = &metrics.os {
            host.os = os.clone();
        }
        if metrics.os_version.is_some() {
            host.os_version = metrics.os_version.clone();
        }
        if metrics.agent_version.is_some() {
            host.agent_version = metrics.agent_version.clone();
        }
        if metrics.mac_address.is_some() {
            host.mac_address = metrics.mac_address.clone();
        }
        if let Some(cpu) = &metrics.cpu {
            host.cpu.model = cpu.model.clone().or(host.cpu.model.take());
            host.cpu.cores = cpu.cores.or(host.cpu.cores);
            host.cpu.usage = cpu.usage;
        }
        if let Some(ram) = &metrics.ram {
            host.ram.total_mb = ram.total.or(host.ram.total_mb);
            host.ram.used_mb = ram.used;
            host.ram.usage = ram.usage;
        }
        if let Some(disk) = &metrics.disk {
            host.disk.total_gb = disk.total.or(host.disk.total_gb);
            host.disk.used_gb = disk.used;
            host.disk.usage = disk.usage;
        }
        if metrics.uptime_s.is_some() {
            host.uptime_secs = metrics.uptime_s;
        }
        if metrics.battery_pct.is_some() {
            host.battery_pct = metrics.battery_pct;
        }
    }

    hosts.update_host(host.clone()).await?;
    Ok(host)
}

/// Resolve the host behind a client IP from a log import. `None` means
/// the record is dropped.
pub async fn resolve_import_host<S>(hosts: &S, ip: &str) -> Result<Option<Host>, StoreError>
where
    S: HostStore + ?Sized,
{
    let host = hosts.find_by_ip(ip).await?;
    if host.is_none() {
        debug!(ip, "no host matches import client ip, dropping record");
    }
    Ok(host)
}

/// Strip the directory decoration from a proxy username.
///
/// `CORP\jdoe` and `jdoe@corp.example` both reduce to `jdoe`.
fn bare_username(raw: &str) -> &str {
    let raw = raw.rsplit('\\').next().unwrap_or(raw);
    raw.split('@').next().unwrap_or(raw)
}

/// Map a proxy-log username onto a user account, trying the raw form
/// first and the bare form second.
pub async fn resolve_user<S>(users: &S, raw: &str) -> Result<Option<UserId>, StoreError>
where
    S: UserStore + ?Sized,
{
    if raw.is_empty() || raw == "-" {
        return Ok(None);
    }
    if let Some(user) = users.find_matching_user(raw).await? {
        return Ok(Some(user.id));
    }
    let bare = bare_username(raw);
    if bare != raw {
        if let Some(user) = users.find_matching_user(bare).await? {
            return Ok(Some(user.id));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwatch_common::{MemoryStore, UserAccount};

    fn batch(agent_id: &str, hostname: &str) -> TelemetryBatch {
        TelemetryBatch {
            agent_id: agent_id.into(),
            hostname: hostname.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn first_contact_creates_host() {
        let store = MemoryStore::new();
        let host = resolve_batch_host(&store, &batch("agent-1", "wks-100"))
            .await
            .unwrap();
        assert_eq!(host.hostname, "wks-100");
        assert_eq!(host.status, HostStatus::Online);
        assert!(store
            .find_by_agent_id("agent-1")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn agent_adopts_import_discovered_host() {
        let store = MemoryStore::new();
        // Host first seen through a log import: no agent id yet.
        let mut seeded = Host::new("wks-101", "Unknown");
        seeded.ip_address = Some("10.1.2.3".into());
        store.insert_host(seeded).await.unwrap();

        let host = resolve_batch_host(&store, &batch("agent-2", "wks-101"))
            .await
            .unwrap();
        assert_eq!(host.agent_id.as_deref(), Some("agent-2"));
        // Still one record, not two.
        assert_eq!(store.all_hosts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn batch_updates_metrics_and_network_context() {
        let store = MemoryStore::new();
        let mut b = batch("agent-3", "wks-102");
        b.public_ip = Some("198.51.100.9".into());
        b.vpn = Some(true);
        b.metrics = Some(crate::batch::MetricsReport {
            os: Some("Windows".into()),
            cpu: Some(crate::batch::CpuReport {
                usage: Some(42.0),
                ..Default::default()
            }),
            ..Default::default()
        });

        let host = resolve_batch_host(&store, &b).await.unwrap();
        assert_eq!(host.os, "Windows");
        assert_eq!(host.cpu.usage, Some(42.0));
        assert!(host.vpn_active);
        assert_eq!(host.public_ip.as_deref(), Some("198.51.100.9"));
    }

    #[tokio::test]
    async fn renamed_host_frees_its_old_hostname() {
        let store = MemoryStore::new();
        let first = resolve_batch_host(&store, &batch("agent-4", "wks-104"))
            .await
            .unwrap();
        // Same agent reports under a new hostname.
        let renamed = resolve_batch_host(&store, &batch("agent-4", "wks-104b"))
            .await
            .unwrap();
        assert_eq!(renamed.id, first.id);

        // A different machine reusing the freed hostname gets its own record.
        let reuse = resolve_batch_host(&store, &batch("agent-5", "wks-104"))
            .await
            .unwrap();
        assert_ne!(reuse.id, first.id);
        assert_eq!(store.all_hosts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn registration_rotates_agent_id_for_known_hostname() {
        let store = MemoryStore::new();
        let first = register_host(
            &store,
            RegisterRequest {
                hostname: "wks-103".into(),
                os: "Linux".into(),
                os_version: None,
                agent_version: None,
                ip_address: None,
                mac_address: None,
            },
        )
        .await
        .unwrap();
        let second = register_host(
            &store,
            RegisterRequest {
                hostname: "wks-103".into(),
                os: "Linux".into(),
                os_version: None,
                agent_version: None,
                ip_address: None,
                mac_address: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(first.id, second.id);
        assert_ne!(first.agent_id, second.agent_id);
    }

    #[tokio::test]
    async fn proxy_usernames_resolve_with_and_without_domain() {
        let store = MemoryStore::new();
        let jane = UserAccount {
            id: Uuid::new_v4(),
            name: "Jane Doe".into(),
            email: "jdoe@corp.example".into(),
        };
        store.add_user(jane.clone());

        assert_eq!(
            resolve_user(&store, "jdoe@corp.example").await.unwrap(),
            Some(jane.id)
        );
        assert_eq!(
            resolve_user(&store, r"CORP\jdoe").await.unwrap(),
            Some(jane.id)
        );
        assert_eq!(resolve_user(&store, "-").await.unwrap(), None);
        assert_eq!(resolve_user(&store, "ghost").await.unwrap(), None);
    }
}
