//! Record-level error taxonomy.
//!
//! A `RecordError` always concerns a single record or pairing; the policy for
//! all of them is the same: log, drop the record, keep the pipeline running.
//! Batch-protocol and orchestration failures live in the pricing and pipeline
//! crates respectively.

use thiserror::Error;

/// A single input or intermediate record failed to parse or validate.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The JSON document could not be deserialised into the record type.
    #[error("malformed {kind} record: {source}")]
    Malformed {
        /// Record kind, e.g. `"trade"` or `"mtm"`.
        kind: &'static str,
        /// Underlying serde failure.
        #[source]
        source: serde_json::Error,
    },

    /// Fixed and floating payment legs were empty or of unequal length.
    #[error("fixed/floating legs invalid: {fixed} fixed vs {floating} floating payments")]
    LegMismatch {
        /// Fixed leg length.
        fixed: usize,
        /// Floating leg length.
        floating: usize,
    },

    /// A record referenced a counterparty with no CDS curve on file.
    #[error("no counterparty credit curve for '{0}'")]
    UnknownCounterparty(String),

    /// A priced point referenced a trade absent from the input snapshot.
    #[error("no trade record for '{0}'")]
    UnknownTrade(String),

    /// A field held a value outside its documented domain.
    #[error("invalid {kind} record: {reason}")]
    Invalid {
        /// Record kind.
        kind: &'static str,
        /// Human-readable constraint violation.
        reason: String,
    },
}

impl RecordError {
    /// Wraps a serde failure with the record kind it occurred in.
    pub fn malformed(kind: &'static str, source: serde_json::Error) -> Self {
        RecordError::Malformed { kind, source }
    }
}
