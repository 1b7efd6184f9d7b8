//! Web proxy access log parsing (Squid native, BlueCoat CSV).

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use url::Url;

/// One parsed proxy access record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAccess {
    pub timestamp: DateTime<Utc>,
    pub client_ip: String,
    pub username: Option<String>,
    /// Full request host, not yet reduced to a root domain.
    pub host: String,
    pub url: String,
    pub bytes: u64,
    pub method: String,
}

fn username_of(raw: &str) -> Option<String> {
    if raw.is_empty() || raw == "-" {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Parse one Squid native access log line.
///
/// Fields: timestamp elapsed remotehost code/status bytes method URL
/// rfc931 peerstatus/peerhost type.
pub fn parse_squid_line(line: &str) -> Option<ProxyAccess> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 10 {
        return None;
    }
    let secs: f64 = parts[0].parse().ok()?;
    let timestamp = Utc.timestamp_millis_opt((secs * 1000.0) as i64).single()?;
    let url = Url::parse(parts[6]).ok()?;
    let host = url.host_str()?.to_string();
    Some(ProxyAccess {
        timestamp,
        client_ip: parts[2].to_string(),
        username: username_of(parts[7]),
        host,
        url: parts[6].to_string(),
        bytes: parts[4].parse().unwrap_or(0),
        method: parts[5].to_string(),
    })
}

/// Parse one BlueCoat CSV access log line.
///
/// Fields: date, time, c-ip, cs-username, cs-method, cs-uri-scheme,
/// cs-host, cs-uri-port, cs-uri-path, cs-uri-query, sc-status, sc-bytes,
/// time-taken.
pub fn parse_bluecoat_line(line: &str) -> Option<ProxyAccess> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 13 {
        return None;
    }
    let raw = format!("{} {}", parts[0].trim(), parts[1].trim());
    let naive = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S").ok()?;
    let host = parts[6].trim();
    if host.is_empty() {
        return None;
    }
    let query = parts[9].trim();
    let url = if query.is_empty() || query == "-" {
        format!("{}://{}{}", parts[5].trim(), host, parts[8].trim())
    } else {
        format!("{}://{}{}?{}", parts[5].trim(), host, parts[8].trim(), query)
    };
    Some(ProxyAccess {
        timestamp: Utc.from_utc_datetime(&naive),
        client_ip: parts[2].trim().to_string(),
        username: username_of(parts[3].trim()),
        host: host.to_string(),
        url,
        bytes: parts[11].trim().parse().unwrap_or(0),
        method: parts[4].trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squid_line_parses() {
        let line = "1736935845.123    120 10.0.0.42 TCP_MISS/200 524288 GET https://files.example.com/report.pdf jdoe DIRECT/93.184.216.34 application/pdf";
        let rec = parse_squid_line(line).unwrap();
        assert_eq!(rec.client_ip, "10.0.0.42");
        assert_eq!(rec.host, "files.example.com");
        assert_eq!(rec.bytes, 524288);
        assert_eq!(rec.username.as_deref(), Some("jdoe"));
        assert_eq!(rec.method, "GET");
    }

    #[test]
    fn squid_dash_username_is_none() {
        let line = "1736935845.123    120 10.0.0.42 TCP_MISS/200 1024 GET http://example.com/ - DIRECT/93.184.216.34 text/html";
        let rec = parse_squid_line(line).unwrap();
        assert!(rec.username.is_none());
    }

    #[test]
    fn squid_rejects_short_or_invalid_lines() {
        assert!(parse_squid_line("1736935845.123 120 10.0.0.42").is_none());
        // Unparseable URL.
        let line = "1736935845.123 120 10.0.0.42 TCP_MISS/200 1024 GET not_a_url - DIRECT/x text/html";
        assert!(parse_squid_line(line).is_none());
    }

    #[test]
    fn bluecoat_line_parses() {
        let line = "2025-01-15,10:30:45,10.0.0.7,CORP\\jdoe,POST,https,upload.example.net,443,/api/v1/files,session=abc,200,1048576,350";
        let rec = parse_bluecoat_line(line).unwrap();
        assert_eq!(rec.client_ip, "10.0.0.7");
        assert_eq!(rec.host, "upload.example.net");
        assert_eq!(rec.bytes, 1048576);
        assert_eq!(
            rec.url,
            "https://upload.example.net/api/v1/files?session=abc"
        );
        assert_eq!(rec.username.as_deref(), Some("CORP\\jdoe"));
    }

    #[test]
    fn bluecoat_rejects_short_lines() {
        assert!(parse_bluecoat_line("2025-01-15,10:30:45,10.0.0.7").is_none());
    }
}
