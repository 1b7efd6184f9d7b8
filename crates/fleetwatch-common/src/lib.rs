//! Fleetwatch Common
//!
//! Canonical record shapes shared by every telemetry producer and consumer:
//! managed hosts, network flows, domain visits, file and process events,
//! user sessions, and monitoring alerts. Also home to the monitoring
//! settings snapshot, the category-scoped record-store traits, and the
//! in-memory store used by the server and tests.
//!
//! The ingestion pipeline never mutates alert lifecycle state; acknowledge,
//! resolve and dismiss are administrative actions surfaced by the server.

pub mod alert;
pub mod error;
pub mod model;
pub mod settings;
pub mod store;

pub use alert::{Alert, AlertKind, AlertState, Severity};
pub use error::StoreError;
pub use model::{
    DomainVisit, FileEvent, FileOperation, FlowSource, Host, HostId, HostStatus, NetworkFlow,
    ProcessSnapshot, SessionRecord, UserAccount, UserId, VisitSource,
};
pub use settings::{MonitoringSettings, SettingsProvider, StaticSettings};
pub use store::{
    AlertFilter, AlertStore, FileEventStore, FlowStore, HostStore, MemoryStore, ProcessStore,
    SessionStore, UserStore, VisitStore,
};
