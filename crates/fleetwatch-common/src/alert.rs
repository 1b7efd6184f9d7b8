//! Monitoring alerts and their lifecycle.
//!
//! Alerts are created `Open` by the rule engine and only ever advanced by
//! administrative action: `Open → Acknowledged → Resolved`, `Open →
//! Resolved` directly, or `Open → Dismissed` (auto-expired by the
//! reconciliation sweep after a fixed window).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{HostId, UserId};

/// Alert identifier.
pub type AlertId = Uuid;

/// The condition class that raised an alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighNetworkUsage,
    HighUpload,
    BulkFileDeletion,
    SuspiciousUpload,
    OffNetwork,
    HighCpuUsage,
    HighMemoryUsage,
    HighDiskUsage,
    HostOffline,
    Custom,
}

/// Alert severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Open,
    Acknowledged,
    Resolved,
    Dismissed,
}

/// A raised monitoring alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub host_id: HostId,
    pub hostname: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    /// Structured rule-specific context (byte counts, top processes, ...).
    pub metadata: serde_json::Value,
    /// Secondary dedup key for process- or domain-scoped rules.
    pub correlated: Option<String>,
    pub state: AlertState,
    pub acknowledged_by: Option<UserId>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_note: Option<String>,
    pub dismissed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// New open alert for a host.
    pub fn open(
        host_id: HostId,
        hostname: impl Into<String>,
        kind: AlertKind,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            host_id,
            hostname: hostname.into(),
            kind,
            severity,
            title: title.into(),
            description: description.into(),
            metadata: serde_json::Value::Null,
            correlated: None,
            state: AlertState::Open,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            resolved_note: None,
            dismissed_at: None,
            created_at: Utc::now(),
        }
    }

    /// Attach structured metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach the correlated dedup key (process name, domain).
    pub fn with_correlated(mut self, key: impl Into<String>) -> Self {
        self.correlated = Some(key.into());
        self
    }

    /// Whether the alert still counts against dedup checks.
    pub fn is_unresolved(&self) -> bool {
        matches!(self.state, AlertState::Open | AlertState::Acknowledged)
    }

    /// Acknowledge an open alert. No-op in any other state.
    pub fn acknowledge(&mut self, by: UserId) {
        if self.state == AlertState::Open {
            self.state = AlertState::Acknowledged;
            self.acknowledged_by = Some(by);
            self.acknowledged_at = Some(Utc::now());
        }
    }

    /// Resolve an open or acknowledged alert.
    pub fn resolve(&mut self, by: UserId, note: Option<String>) {
        if self.is_unresolved() {
            self.state = AlertState::Resolved;
            self.resolved_by = Some(by);
            self.resolved_at = Some(Utc::now());
            self.resolved_note = note;
        }
    }

    /// Dismiss an open alert; the sweep expires it later.
    pub fn dismiss(&mut self) {
        if self.state == AlertState::Open {
            self.state = AlertState::Dismissed;
            self.dismissed_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        let admin = Uuid::new_v4();
        let mut alert = Alert::open(
            Uuid::new_v4(),
            "wks-042",
            AlertKind::HighUpload,
            Severity::High,
            "High Upload Detected",
            "test",
        );
        assert!(alert.is_unresolved());

        alert.acknowledge(admin);
        assert_eq!(alert.state, AlertState::Acknowledged);
        assert!(alert.is_unresolved());

        alert.resolve(admin, Some("false positive".into()));
        assert_eq!(alert.state, AlertState::Resolved);
        assert!(!alert.is_unresolved());

        // Terminal: further transitions are no-ops.
        alert.acknowledge(admin);
        assert_eq!(alert.state, AlertState::Resolved);
    }

    #[test]
    fn dismiss_only_from_open() {
        let mut alert = Alert::open(
            Uuid::new_v4(),
            "wks-042",
            AlertKind::HostOffline,
            Severity::Medium,
            "Host Offline",
            "test",
        );
        alert.dismiss();
        assert_eq!(alert.state, AlertState::Dismissed);
        assert!(alert.dismissed_at.is_some());
        assert!(!alert.is_unresolved());
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
    }
}
