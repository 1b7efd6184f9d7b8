//! Domain visit aggregation helpers.
//!
//! Log imports collapse per-query noise into fixed five-minute buckets
//! keyed by (host, root domain, bucket start, source). The store's
//! `record_bucketed` makes re-imports increment frequency instead of
//! duplicating rows.

use chrono::{DateTime, TimeZone, Utc};

/// Bucket width for import aggregation.
pub const BUCKET_SECS: i64 = 5 * 60;

/// Floor a timestamp to its five-minute bucket start.
pub fn bucket_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp() - ts.timestamp().rem_euclid(BUCKET_SECS);
    Utc.timestamp_opt(secs, 0).single().unwrap_or(ts)
}

/// Reduce an FQDN to its root domain (last two labels).
///
/// A trailing dot from DNS logs is stripped first. Single-label names
/// pass through unchanged.
pub fn root_domain(fqdn: &str) -> String {
    let trimmed = fqdn.trim_end_matches('.');
    let labels: Vec<&str> = trimmed.split('.').collect();
    if labels.len() >= 2 {
        labels[labels.len() - 2..].join(".")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_floor_to_five_minutes() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 2, 14, 33, 41).unwrap();
        let bucket = bucket_start(ts);
        assert_eq!(bucket, Utc.with_ymd_and_hms(2026, 8, 2, 14, 30, 0).unwrap());
        // Same bucket for everything inside the window.
        let later = Utc.with_ymd_and_hms(2026, 8, 2, 14, 34, 59).unwrap();
        assert_eq!(bucket_start(later), bucket);
        // Next window starts a new bucket.
        let next = Utc.with_ymd_and_hms(2026, 8, 2, 14, 35, 0).unwrap();
        assert_ne!(bucket_start(next), bucket);
    }

    #[test]
    fn root_domain_keeps_last_two_labels() {
        assert_eq!(root_domain("cdn.assets.example.com"), "example.com");
        assert_eq!(root_domain("example.com."), "example.com");
        assert_eq!(root_domain("localhost"), "localhost");
    }
}
