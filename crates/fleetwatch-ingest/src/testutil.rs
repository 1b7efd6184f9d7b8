//! Test doubles shared by this crate's test modules.

use chrono::{DateTime, Utc};
use fleetwatch_common::{Alert, AlertFilter, AlertKind, AlertStore, HostId, StoreError, UserId};
use uuid::Uuid;

/// Alert store whose every operation fails, for exercising best-effort
/// evaluation paths.
pub(crate) struct UnavailableAlerts;

fn down() -> StoreError {
    StoreError::Unavailable("alerts store down".into())
}

#[async_trait::async_trait]
impl AlertStore for UnavailableAlerts {
    async fn insert_alert(&self, _alert: Alert) -> Result<(), StoreError> {
        Err(down())
    }

    async fn get_alert(&self, _id: Uuid) -> Result<Option<Alert>, StoreError> {
        Err(down())
    }

    async fn list_alerts(&self, _filter: AlertFilter) -> Result<Vec<Alert>, StoreError> {
        Err(down())
    }

    async fn has_unresolved(
        &self,
        _host_id: HostId,
        _kind: AlertKind,
        _correlated: Option<&str>,
        _since: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        Err(down())
    }

    async fn open_count_for_host(&self, _host_id: HostId) -> Result<usize, StoreError> {
        Err(down())
    }

    async fn acknowledge(&self, _id: Uuid, _by: UserId) -> Result<Alert, StoreError> {
        Err(down())
    }

    async fn resolve(
        &self,
        _id: Uuid,
        _by: UserId,
        _note: Option<String>,
    ) -> Result<Alert, StoreError> {
        Err(down())
    }

    async fn dismiss(&self, _id: Uuid) -> Result<Alert, StoreError> {
        Err(down())
    }

    async fn expire_dismissed(&self, _older_than: DateTime<Utc>) -> Result<usize, StoreError> {
        Err(down())
    }
}
