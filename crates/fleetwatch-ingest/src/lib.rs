//! Fleetwatch Ingest
//!
//! Everything that turns outside telemetry into canonical records: the
//! agent batch normalizer, the DNS/proxy log-file adapters, and the
//! NetFlow v5 UDP collector. Producers disagree on shape and transport;
//! this crate maps all of them onto `fleetwatch_common` records, resolves
//! host identity, and hands the result to the alert engine.

pub mod adapters;
pub mod aggregate;
pub mod batch;
pub mod collector;
pub mod identity;
pub mod import;
pub mod normalize;
#[cfg(test)]
pub(crate) mod testutil;

use thiserror::Error;

pub use batch::{IngestSummary, TelemetryBatch};
pub use collector::NetFlowCollector;
pub use import::{DnsFormat, ImportReport, ProxyFormat};

/// Failures surfaced by imports and the collector.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] fleetwatch_common::StoreError),

    #[error("unknown log format: {0}")]
    UnknownFormat(String),
}
