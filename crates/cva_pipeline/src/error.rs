//! Pipeline-level failure taxonomy.
//!
//! Per-record problems never surface here; they are logged and the record is
//! dropped where it fails. This type covers the failures that abort a run:
//! missing mandatory inputs, batch-protocol breaks at the pricing boundary,
//! and run-orchestration conflicts.

use thiserror::Error;

use crate::registry::DuplicateRunError;
use cva_pricing::PricingError;

/// A failure that aborts the run and transitions it to `Failed`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The fixing store held no record. There is no default fixing.
    #[error("fixing store is empty, cannot price without a fixing")]
    MissingFixing,

    /// The trade or curve store held no usable records.
    #[error("{store} store yielded no parseable records")]
    EmptyInput {
        /// Name of the offending store.
        store: &'static str,
    },

    /// Batch-protocol failure at the pricing boundary.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// A run for this calculation date is already in flight.
    #[error(transparent)]
    DuplicateRun(#[from] DuplicateRunError),

    /// Artifact rendering failure.
    #[error("failed to render artifact: {0}")]
    Artifact(#[from] csv::Error),
}
