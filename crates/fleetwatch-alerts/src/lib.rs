//! Alert rule engine and host reconciliation.
//!
//! Rules are pure functions over canonical records and a settings snapshot;
//! they return [`rules::Finding`]s with a declared dedup policy. The
//! [`engine::AlertEngine`] applies dedup against the alert store and
//! persists what survives. [`reconcile`] owns the periodic sweep that marks
//! silent hosts offline and expires dismissed alerts.

pub mod engine;
pub mod reconcile;
pub mod rules;

pub use engine::AlertEngine;
pub use reconcile::{sweep_once, SweepReport};
pub use rules::{Dedup, Finding};
