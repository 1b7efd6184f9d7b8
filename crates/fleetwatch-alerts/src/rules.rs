//! Detection rules.
//!
//! Each rule is a pure function over canonical records plus the settings
//! snapshot, returning zero or more [`Finding`]s. Rules never touch the
//! store; the engine owns dedup and persistence. All thresholds compare
//! strictly greater-than, so a value exactly at a threshold does not fire.

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::Duration;
use fleetwatch_common::{
    AlertKind, DomainVisit, FileEvent, FileOperation, Host, MonitoringSettings, NetworkFlow,
    Severity,
};
use ipnetwork::IpNetwork;
use serde_json::json;

const MB: f64 = 1024.0 * 1024.0;

/// Dedup policy a finding carries into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dedup {
    /// Suppress while any unresolved alert of the same kind (and correlated
    /// key) exists for the host, regardless of age.
    UnresolvedOnly,
    /// Suppress while an unresolved alert of the same kind (and correlated
    /// key) was created within the window.
    Window(Duration),
}

/// One rule hit, not yet deduplicated or persisted.
#[derive(Debug, Clone)]
pub struct Finding {
    pub kind: AlertKind,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub metadata: serde_json::Value,
    pub correlated: Option<String>,
    pub dedup: Dedup,
}

fn bytes_mb(bytes: u64) -> f64 {
    bytes as f64 / MB
}

/// Per-process traffic over 100 MB in one batch.
///
/// Bands: >100 MB medium, >250 MB high, >500 MB critical. Deduplicated per
/// process name for as long as an unresolved alert exists.
pub fn high_network_usage(host: &Host, flows: &[NetworkFlow]) -> Vec<Finding> {
    let mut per_process: HashMap<&str, u64> = HashMap::new();
    for flow in flows {
        let name = flow.process.as_deref().unwrap_or("unknown");
        *per_process.entry(name).or_default() += flow.bytes_in + flow.bytes_out;
    }

    let mut findings = Vec::new();
    for (process, total) in per_process {
        let mb = bytes_mb(total);
        if mb <= 100.0 {
            continue;
        }
        let severity = if mb > 500.0 {
            Severity::Critical
        } else if mb > 250.0 {
            Severity::High
        } else {
            Severity::Medium
        };
        findings.push(Finding {
            kind: AlertKind::HighNetworkUsage,
            severity,
            title: "High Network Usage".into(),
            description: format!(
                "{} transferred {:.1} MB on {}",
                process, mb, host.hostname
            ),
            metadata: json!({ "process": process, "totalBytes": total, "mb": mb }),
            correlated: Some(process.to_string()),
            dedup: Dedup::UnresolvedOnly,
        });
    }
    findings
}

/// Outbound volume over the configured upload threshold in one batch.
pub fn high_upload(
    host: &Host,
    flows: &[NetworkFlow],
    settings: &MonitoringSettings,
) -> Option<Finding> {
    let out: u64 = flows.iter().map(|f| f.bytes_out).sum();
    let mb = bytes_mb(out);
    if mb <= settings.thresholds.high_upload_mb {
        return None;
    }
    let severity = if mb > 500.0 {
        Severity::Critical
    } else {
        Severity::High
    };
    Some(Finding {
        kind: AlertKind::HighUpload,
        severity,
        title: "High Upload Volume".into(),
        description: format!("{} uploaded {:.1} MB in one interval", host.hostname, mb),
        metadata: json!({ "bytesOut": out, "mb": mb }),
        correlated: None,
        dedup: Dedup::Window(Duration::seconds(60)),
    })
}

/// More deletions in one batch than the configured count.
pub fn bulk_file_deletion(
    host: &Host,
    events: &[FileEvent],
    settings: &MonitoringSettings,
) -> Option<Finding> {
    let deletions = events
        .iter()
        .filter(|e| e.operation == FileOperation::Delete)
        .count();
    if deletions <= settings.thresholds.bulk_deletion_count {
        return None;
    }
    let severity = if deletions >= 200 {
        Severity::Critical
    } else if deletions >= 100 {
        Severity::High
    } else {
        Severity::Medium
    };
    Some(Finding {
        kind: AlertKind::BulkFileDeletion,
        severity,
        title: "Bulk File Deletion".into(),
        description: format!("{} files deleted on {}", deletions, host.hostname),
        metadata: json!({ "deletions": deletions }),
        correlated: None,
        dedup: Dedup::Window(Duration::seconds(60)),
    })
}

/// Upload to a deny-listed or unrecognised domain.
///
/// Allow-listed domains are skipped outright. Deny-listed domains fire at
/// any volume as critical; anything else only over 10 MB, as high.
pub fn suspicious_upload(
    host: &Host,
    visits: &[DomainVisit],
    settings: &MonitoringSettings,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    for visit in visits {
        let domain = visit.domain.to_lowercase();
        if settings
            .domains
            .allow
            .iter()
            .any(|d| d.eq_ignore_ascii_case(&domain))
        {
            continue;
        }
        let denied = settings
            .domains
            .deny
            .iter()
            .any(|d| d.eq_ignore_ascii_case(&domain));
        let mb = bytes_mb(visit.bytes_transferred);
        let severity = if denied {
            Severity::Critical
        } else if mb > 10.0 {
            Severity::High
        } else {
            continue;
        };
        findings.push(Finding {
            kind: AlertKind::SuspiciousUpload,
            severity,
            title: "Suspicious Upload".into(),
            description: format!(
                "{} sent {:.1} MB to {}",
                host.hostname, mb, visit.domain
            ),
            metadata: json!({ "domain": visit.domain, "bytes": visit.bytes_transferred, "denyListed": denied }),
            correlated: Some(domain),
            dedup: Dedup::Window(Duration::minutes(5)),
        });
    }
    findings
}

fn ip_in_corporate_ranges(ip: &str, ranges: &[String]) -> bool {
    let Ok(addr) = ip.parse::<IpAddr>() else {
        return false;
    };
    ranges
        .iter()
        .filter_map(|r| r.parse::<IpNetwork>().ok())
        .any(|net| net.contains(addr))
}

/// Host operating outside the corporate network envelope.
///
/// Fires when there is no VPN, the Wi-Fi SSID (if any) is untrusted, and
/// the public IP falls outside every configured corporate CIDR range.
pub fn off_network(host: &Host, settings: &MonitoringSettings) -> Option<Finding> {
    if host.vpn_active {
        return None;
    }
    if let Some(ssid) = &host.ssid {
        if settings
            .network
            .trusted_wifi_ssids
            .iter()
            .any(|s| s.eq_ignore_ascii_case(ssid))
        {
            return None;
        }
    }
    let public_ip = host.public_ip.as_deref()?;
    if ip_in_corporate_ranges(public_ip, &settings.network.corporate_ip_ranges) {
        return None;
    }
    Some(Finding {
        kind: AlertKind::OffNetwork,
        severity: Severity::Medium,
        title: "Host Off Corporate Network".into(),
        description: format!(
            "{} is online from {} without VPN",
            host.hostname, public_ip
        ),
        metadata: json!({ "publicIp": public_ip, "ssid": host.ssid }),
        correlated: None,
        dedup: Dedup::Window(Duration::hours(1)),
    })
}

fn resource_finding(
    kind: AlertKind,
    resource: &str,
    hostname: &str,
    usage: f64,
    threshold: f64,
    critical_at: f64,
    window: Duration,
) -> Option<Finding> {
    if usage <= threshold {
        return None;
    }
    let severity = if usage > critical_at {
        Severity::Critical
    } else if kind == AlertKind::HighDiskUsage {
        if usage > 90.0 {
            Severity::High
        } else {
            Severity::Medium
        }
    } else {
        Severity::High
    };
    Some(Finding {
        kind,
        severity,
        title: format!("High {} Usage", resource),
        description: format!("{} {} usage at {:.1}%", hostname, resource, usage),
        metadata: json!({ "usage": usage, "threshold": threshold }),
        correlated: None,
        dedup: Dedup::Window(window),
    })
}

/// CPU, RAM and disk utilisation checks against the settings thresholds.
pub fn resource_pressure(host: &Host, settings: &MonitoringSettings) -> Vec<Finding> {
    let t = &settings.thresholds;
    let mut findings = Vec::new();
    if let Some(cpu) = host.cpu.usage {
        findings.extend(resource_finding(
            AlertKind::HighCpuUsage,
            "CPU",
            &host.hostname,
            cpu,
            t.high_cpu_pct,
            98.0,
            Duration::minutes(5),
        ));
    }
    if let Some(ram) = host.ram.usage {
        findings.extend(resource_finding(
            AlertKind::HighMemoryUsage,
            "Memory",
            &host.hostname,
            ram,
            t.high_ram_pct,
            98.0,
            Duration::minutes(5),
        ));
    }
    if let Some(disk) = host.disk.usage {
        findings.extend(resource_finding(
            AlertKind::HighDiskUsage,
            "Disk",
            &host.hostname,
            disk,
            t.high_disk_pct,
            95.0,
            Duration::hours(1),
        ));
    }
    findings
}
