//! FleetWatch Server
//!
//! Hosts the agent-facing HTTP API, the log-import endpoints, the NetFlow
//! collector and the background reconciliation and retention tasks over a
//! shared in-memory store.

pub mod config;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use routes::build_router;
pub use state::{AppState, SharedState};
