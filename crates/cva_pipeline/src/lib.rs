//! # CVA Pipeline (L3: Dataflow)
//!
//! The staged CVA computation over a trade book:
//!
//! ```text
//! stores -> cartesian join -> pricing -> exposure -> CVA
//!        -> trade aggregate -> counterparty aggregate -> artifacts
//! ```
//!
//! Stages are order-independent within a run: every reducer follows a
//! deterministic tie-break, so partitioned workers plus a final combine give
//! the same result as a single sequential pass. CPU stages run data-parallel
//! over `rayon`; only the pricing stage suspends.
//!
//! The [`runner::CvaPipeline`] wraps the whole flow behind
//! [`registry::RunRegistry`], which enforces at most one live run per
//! calculation date.

pub mod aggregate;
pub mod artifacts;
pub mod cva;
pub mod error;
pub mod exposure;
pub mod join;
pub mod registry;
pub mod runner;

pub use aggregate::{CounterpartyAggregate, TradeAggregate};
pub use error::PipelineError;
pub use registry::{DuplicateRunError, RunHandle, RunRegistry, RunStatus};
pub use runner::{ArtifactStores, CvaPipeline, InputStores, RunConfig, RunReport};
