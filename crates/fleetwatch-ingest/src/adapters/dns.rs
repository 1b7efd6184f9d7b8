//! DNS query log parsing.
//!
//! Two on-disk formats: BIND query logs and Windows DNS debug logs.
//! A line that does not parse yields `None` and the caller drops it.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

/// One parsed DNS query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    pub timestamp: DateTime<Utc>,
    pub client_ip: String,
    pub client_port: u16,
    pub name: String,
}

/// BIND query log parser.
///
/// Example line:
/// `15-Jan-2025 10:30:45.123 client 192.168.1.100#54321 (example.com): query: example.com IN A + (10.0.0.1)`
pub struct BindParser {
    timestamp: Regex,
    client: Regex,
    query: Regex,
}

impl Default for BindParser {
    fn default() -> Self {
        Self::new()
    }
}

impl BindParser {
    pub fn new() -> Self {
        // The patterns are literals; compilation cannot fail.
        Self {
            timestamp: Regex::new(r"(\d+-\w+-\d+ \d+:\d+:\d+\.\d+)").unwrap(),
            client: Regex::new(r"client ([0-9.]+)#(\d+)").unwrap(),
            query: Regex::new(r"query: ([\w.-]+) IN").unwrap(),
        }
    }

    pub fn parse_line(&self, line: &str) -> Option<DnsQuery> {
        let ts_raw = self.timestamp.captures(line)?.get(1)?.as_str().to_string();
        let client = self.client.captures(line)?;
        let name = self.query.captures(line)?.get(1)?.as_str().to_string();

        let naive = NaiveDateTime::parse_from_str(&ts_raw, "%d-%b-%Y %H:%M:%S%.3f").ok()?;
        Some(DnsQuery {
            timestamp: Utc.from_utc_datetime(&naive),
            client_ip: client.get(1)?.as_str().to_string(),
            client_port: client.get(2)?.as_str().parse().ok()?,
            name,
        })
    }
}

/// Parse one Windows DNS debug log line.
///
/// Columnar: date, time, thread, event type, protocol, direction, client
/// IP, port, queried name. Only `QUERY` events produce a record.
pub fn parse_windows_line(line: &str) -> Option<DnsQuery> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 9 || parts[3] != "QUERY" {
        return None;
    }
    let raw = format!("{} {}", parts[0], parts[1]);
    let naive = NaiveDateTime::parse_from_str(&raw, "%m/%d/%Y %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S"))
        .ok()?;
    Some(DnsQuery {
        timestamp: Utc.from_utc_datetime(&naive),
        client_ip: parts[6].to_string(),
        client_port: parts[7].parse().ok()?,
        name: parts[8].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_line_parses() {
        let parser = BindParser::new();
        let line = "15-Jan-2025 10:30:45.123 client 192.168.1.100#54321 (example.com): query: example.com IN A + (10.0.0.1)";
        let q = parser.parse_line(line).unwrap();
        assert_eq!(q.client_ip, "192.168.1.100");
        assert_eq!(q.client_port, 54321);
        assert_eq!(q.name, "example.com");
        assert_eq!(
            q.timestamp,
            Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 45).unwrap()
                + chrono::Duration::milliseconds(123)
        );
    }

    #[test]
    fn bind_rejects_partial_lines() {
        let parser = BindParser::new();
        // Missing the query section.
        assert!(parser
            .parse_line("15-Jan-2025 10:30:45.123 client 192.168.1.100#54321 ping")
            .is_none());
        // Missing the client section.
        assert!(parser
            .parse_line("15-Jan-2025 10:30:45.123 query: example.com IN A")
            .is_none());
        assert!(parser.parse_line("").is_none());
    }

    #[test]
    fn windows_line_parses_query_events_only() {
        let line = "1/15/2025 10:30:45 0E04 QUERY UDP Rcv 192.168.1.55 53211 mail.example.org";
        let q = parse_windows_line(line).unwrap();
        assert_eq!(q.client_ip, "192.168.1.55");
        assert_eq!(q.client_port, 53211);
        assert_eq!(q.name, "mail.example.org");

        let response = "1/15/2025 10:30:45 0E04 RESPONSE UDP Snd 192.168.1.55 53211 mail.example.org";
        assert!(parse_windows_line(response).is_none());
        assert!(parse_windows_line("too few columns").is_none());
    }
}
