//! DNS and proxy log-file import jobs.
//!
//! Imports stream a log line by line, parse per format, resolve each
//! record's client IP to a managed host, aggregate into five-minute
//! buckets and upsert through `record_bucketed`. Every non-blank,
//! non-comment line counts as processed; lines that fail to parse and
//! records whose IP matches no host are dropped and simply never reach
//! the imported count.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use fleetwatch_common::{
    DomainVisit, HostId, HostStore, MonitoringSettings, StoreError, UserId, UserStore,
    VisitSource, VisitStore,
};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;
use uuid::Uuid;

use crate::adapters::dns::{parse_windows_line, BindParser};
use crate::adapters::proxy::{parse_bluecoat_line, parse_squid_line};
use crate::aggregate::{bucket_start, root_domain};
use crate::identity::{resolve_import_host, resolve_user};
use crate::IngestError;

/// DNS log dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsFormat {
    Bind,
    Windows,
}

impl FromStr for DnsFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bind" => Ok(Self::Bind),
            "windows" => Ok(Self::Windows),
            other => Err(IngestError::UnknownFormat(other.to_string())),
        }
    }
}

/// Proxy log dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyFormat {
    Squid,
    BlueCoat,
}

impl FromStr for ProxyFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "squid" => Ok(Self::Squid),
            "bluecoat" => Ok(Self::BlueCoat),
            other => Err(IngestError::UnknownFormat(other.to_string())),
        }
    }
}

/// What an import job did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Non-blank, non-comment lines consumed, parseable or not.
    pub processed: usize,
    /// Aggregated visit rows written to the store.
    pub imported: usize,
}

#[derive(Hash, PartialEq, Eq)]
struct BucketKey {
    host_id: HostId,
    domain: String,
    bucket: DateTime<Utc>,
}

struct BucketAcc {
    hostname: String,
    user_id: Option<UserId>,
    url: Option<String>,
    frequency: u64,
    bytes: u64,
}

fn skip_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

async fn flush_buckets<S>(
    store: &S,
    source: VisitSource,
    buckets: HashMap<BucketKey, BucketAcc>,
) -> Result<usize, StoreError>
where
    S: VisitStore + ?Sized,
{
    let imported = buckets.len();
    for (key, acc) in buckets {
        store
            .record_bucketed(DomainVisit {
                id: Uuid::new_v4(),
                host_id: key.host_id,
                hostname: acc.hostname,
                user_id: acc.user_id,
                domain: key.domain,
                url: acc.url,
                source,
                frequency: acc.frequency,
                bytes_transferred: acc.bytes,
                timestamp: key.bucket,
            })
            .await?;
    }
    Ok(imported)
}

/// Import DNS queries from a buffered reader.
pub async fn import_dns<S, R>(
    store: &S,
    reader: R,
    format: DnsFormat,
) -> Result<ImportReport, IngestError>
where
    S: HostStore + VisitStore + ?Sized,
    R: AsyncBufRead + Unpin,
{
    let bind = BindParser::new();
    let mut lines = reader.lines();
    let mut report = ImportReport::default();
    let mut buckets: HashMap<BucketKey, BucketAcc> = HashMap::new();

    while let Some(line) = lines.next_line().await? {
        if skip_line(&line) {
            continue;
        }
        report.processed += 1;
        let query = match format {
            DnsFormat::Bind => bind.parse_line(&line),
            DnsFormat::Windows => parse_windows_line(&line),
        };
        let Some(query) = query else { continue };

        let Some(host) = resolve_import_host(store, &query.client_ip).await? else {
            continue;
        };
        let key = BucketKey {
            host_id: host.id,
            domain: root_domain(&query.name),
            bucket: bucket_start(query.timestamp),
        };
        buckets
            .entry(key)
            .or_insert_with(|| BucketAcc {
                hostname: host.hostname.clone(),
                user_id: None,
                url: None,
                frequency: 0,
                bytes: 0,
            })
            .frequency += 1;
    }

    report.imported = flush_buckets(store, VisitSource::Dns, buckets).await?;
    info!(
        processed = report.processed,
        imported = report.imported,
        "dns import complete"
    );
    Ok(report)
}

/// Import proxy access records from a buffered reader.
///
/// Usernames are mapped to user accounts where possible; full URLs are
/// kept only when the privacy settings allow it.
pub async fn import_proxy<S, R>(
    store: &S,
    reader: R,
    format: ProxyFormat,
    settings: &MonitoringSettings,
) -> Result<ImportReport, IngestError>
where
    S: HostStore + VisitStore + UserStore + ?Sized,
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut report = ImportReport::default();
    let mut buckets: HashMap<BucketKey, BucketAcc> = HashMap::new();

    while let Some(line) = lines.next_line().await? {
        if skip_line(&line) {
            continue;
        }
        report.processed += 1;
        let access = match format {
            ProxyFormat::Squid => parse_squid_line(&line),
            ProxyFormat::BlueCoat => parse_bluecoat_line(&line),
        };
        let Some(access) = access else { continue };

        let Some(host) = resolve_import_host(store, &access.client_ip).await? else {
            continue;
        };
        let user_id = match &access.username {
            Some(name) => resolve_user(store, name).await?,
            None => None,
        };

        let key = BucketKey {
            host_id: host.id,
            domain: root_domain(&access.host),
            bucket: bucket_start(access.timestamp),
        };
        let acc = buckets.entry(key).or_insert_with(|| BucketAcc {
            hostname: host.hostname.clone(),
            user_id: None,
            url: None,
            frequency: 0,
            bytes: 0,
        });
        acc.frequency += 1;
        acc.bytes += access.bytes;
        if acc.user_id.is_none() {
            acc.user_id = user_id;
        }
        if settings.privacy.store_full_urls && acc.url.is_none() {
            acc.url = Some(access.url.clone());
        }
    }

    report.imported = flush_buckets(store, VisitSource::Proxy, buckets).await?;
    info!(
        processed = report.processed,
        imported = report.imported,
        "proxy import complete"
    );
    Ok(report)
}

/// Import a DNS log from a file path.
pub async fn import_dns_file<S>(
    store: &S,
    path: impl AsRef<Path>,
    format: DnsFormat,
) -> Result<ImportReport, IngestError>
where
    S: HostStore + VisitStore + ?Sized,
{
    let file = tokio::fs::File::open(path).await?;
    import_dns(store, BufReader::new(file), format).await
}

/// Import a proxy log from a file path.
pub async fn import_proxy_file<S>(
    store: &S,
    path: impl AsRef<Path>,
    format: ProxyFormat,
    settings: &MonitoringSettings,
) -> Result<ImportReport, IngestError>
where
    S: HostStore + VisitStore + UserStore + ?Sized,
{
    let file = tokio::fs::File::open(path).await?;
    import_proxy(store, BufReader::new(file), format, settings).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwatch_common::{Host, MemoryStore, UserAccount};

    async fn known_host(store: &MemoryStore, hostname: &str, ip: &str) -> Host {
        let mut host = Host::new(hostname, "Linux");
        host.ip_address = Some(ip.into());
        store.insert_host(host).await.unwrap()
    }

    #[tokio::test]
    async fn dns_import_aggregates_per_bucket() {
        let store = MemoryStore::new();
        let host = known_host(&store, "wks-110", "192.168.1.100").await;

        // Two example.com queries in the same bucket, one other domain,
        // one from an unknown client, one garbage line, one comment.
        let log = "\
15-Jan-2025 10:30:45.123 client 192.168.1.100#54321 (www.example.com): query: www.example.com IN A + (10.0.0.1)
15-Jan-2025 10:31:02.456 client 192.168.1.100#54322 (cdn.example.com): query: cdn.example.com IN AAAA + (10.0.0.1)
15-Jan-2025 10:31:10.000 client 192.168.1.100#54323 (mail.example.org): query: mail.example.org IN A + (10.0.0.1)
15-Jan-2025 10:31:15.000 client 10.9.9.9#1000 (other.net): query: other.net IN A + (10.0.0.1)
# comment
not a log line
";
        let report = import_dns(&store, BufReader::new(log.as_bytes()), DnsFormat::Bind)
            .await
            .unwrap();
        // The garbage line counts as processed, the comment does not.
        assert_eq!(report.processed, 5);
        assert_eq!(report.imported, 2);

        let visits = store
            .visits_for_host_since(host.id, chrono::DateTime::UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(visits.len(), 2);
        let example = visits.iter().find(|v| v.domain == "example.com").unwrap();
        assert_eq!(example.frequency, 2);
        assert_eq!(example.source, VisitSource::Dns);
    }

    #[tokio::test]
    async fn dns_reimport_increments_instead_of_duplicating() {
        let store = MemoryStore::new();
        let host = known_host(&store, "wks-111", "192.168.1.101").await;
        let log = "15-Jan-2025 10:30:45.123 client 192.168.1.101#54321 (example.com): query: example.com IN A + (10.0.0.1)\n";

        import_dns(&store, BufReader::new(log.as_bytes()), DnsFormat::Bind)
            .await
            .unwrap();
        import_dns(&store, BufReader::new(log.as_bytes()), DnsFormat::Bind)
            .await
            .unwrap();

        let visits = store
            .visits_for_host_since(host.id, chrono::DateTime::UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].frequency, 2);
    }

    #[tokio::test]
    async fn proxy_import_sums_bytes_and_resolves_users() {
        let store = MemoryStore::new();
        let host = known_host(&store, "wks-112", "10.0.0.42").await;
        let jane = UserAccount {
            id: Uuid::new_v4(),
            name: "Jane Doe".into(),
            email: "jdoe@corp.example".into(),
        };
        store.add_user(jane.clone());

        let log = "\
1736935845.100 120 10.0.0.42 TCP_MISS/200 1000 GET https://files.example.com/a jdoe DIRECT/93.184.216.34 application/pdf
1736935851.200 80 10.0.0.42 TCP_MISS/200 2000 GET https://files.example.com/b jdoe DIRECT/93.184.216.34 application/pdf
";
        let report = import_proxy(
            &store,
            BufReader::new(log.as_bytes()),
            ProxyFormat::Squid,
            &MonitoringSettings::default(),
        )
        .await
        .unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.imported, 1);

        let visits = store
            .visits_for_host_since(host.id, chrono::DateTime::UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].bytes_transferred, 3000);
        assert_eq!(visits[0].frequency, 2);
        assert_eq!(visits[0].user_id, Some(jane.id));
        // Default privacy drops full URLs.
        assert!(visits[0].url.is_none());
        assert_eq!(visits[0].source, VisitSource::Proxy);
    }

    #[tokio::test]
    async fn proxy_import_keeps_urls_when_privacy_allows() {
        let store = MemoryStore::new();
        let host = known_host(&store, "wks-113", "10.0.0.7").await;
        let mut settings = MonitoringSettings::default();
        settings.privacy.store_full_urls = true;

        let log = "2025-01-15,10:30:45,10.0.0.7,-,GET,https,upload.example.net,443,/x,-,200,512,10\n";
        import_proxy(
            &store,
            BufReader::new(log.as_bytes()),
            ProxyFormat::BlueCoat,
            &settings,
        )
        .await
        .unwrap();

        let visits = store
            .visits_for_host_since(host.id, chrono::DateTime::UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(
            visits[0].url.as_deref(),
            Some("https://upload.example.net/x")
        );
        assert_eq!(visits[0].domain, "example.net");
    }

    #[tokio::test]
    async fn malformed_lines_count_as_processed_not_imported() {
        let store = MemoryStore::new();
        known_host(&store, "wks-114", "192.168.1.102").await;
        let log = "\
15-Jan-2025 10:30:45.123 client 192.168.1.102#54321 (example.com): query: example.com IN A + (10.0.0.1)
this line is not a bind query log
";
        let report = import_dns(&store, BufReader::new(log.as_bytes()), DnsFormat::Bind)
            .await
            .unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.imported, 1);
    }

    #[test]
    fn formats_parse_from_str() {
        assert_eq!(DnsFormat::from_str("BIND").unwrap(), DnsFormat::Bind);
        assert_eq!(
            ProxyFormat::from_str("bluecoat").unwrap(),
            ProxyFormat::BlueCoat
        );
        assert!(DnsFormat::from_str("zeek").is_err());
    }
}
