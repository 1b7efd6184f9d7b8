//! Error taxonomy for the storage and settings seams.

use thiserror::Error;

/// Failures from a record store or the settings provider.
///
/// Per-category persistence failures are logged and reported per category;
/// they never abort sibling categories in the same batch.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-constraint violation (hostname, agent id).
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// Record not found by primary or natural key.
    #[error("not found: {0}")]
    NotFound(String),

    /// Store or settings backend unavailable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
