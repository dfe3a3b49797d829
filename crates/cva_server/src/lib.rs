//! # CVA Server (L4: Surface)
//!
//! REST surface over the CVA pipeline: submit a run for a calculation date,
//! poll its status, and download the published artifacts. The default wiring
//! uses in-memory stores and the HTTP pricing client; ingestion into the
//! input stores is a collaborator concern.

pub mod config;
pub mod routes;
pub mod server;

/// Crate version, reported by the health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
