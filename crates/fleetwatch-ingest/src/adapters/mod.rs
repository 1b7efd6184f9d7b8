//! Format adapters for external telemetry sources.
//!
//! Each adapter parses one wire or log format into an intermediate record;
//! host resolution and persistence happen in `import` and `collector`.
//! Malformed input is dropped per line or per record, never per file.

pub mod dns;
pub mod netflow;
pub mod proxy;
