//! # CVA Core (L1: Domain)
//!
//! Domain records, snapshot stores and shared error types for the CVA
//! straight-through-processing engine.
//!
//! This crate provides:
//! - Typed input records parsed from JSON store snapshots (trades, curves,
//!   fixings, counterparty CDS curves)
//! - Intermediate records flowing between pipeline stages (mark-to-market
//!   results, exposure profiles, CVA records)
//! - Store abstractions: unordered keyed snapshots on the input side,
//!   write-once artifact stores and debug sinks on the output side
//!
//! Input records keep their full original JSON document alongside the parsed
//! fields, because the pricing service boundary forwards whole trade, curve
//! and fixing documents verbatim.

pub mod error;
pub mod record;
pub mod store;

pub use error::RecordError;
pub use record::{
    CdsRecord, CurveRecord, CvaRecord, ExposureProfile, FixingRecord, MtmResult, TradeRecord,
};
pub use store::{
    ArtifactStore, DebugSink, InMemoryArtifacts, InMemoryDebugSink, InMemoryStore, NullDebugSink,
    SnapshotStore,
};

/// Well-known store names, shared between the pipeline and the server.
pub mod stores {
    /// Trade input store.
    pub const TRADES: &str = "trades";
    /// Interest-rate curve scenario input store.
    pub const IRCURVES: &str = "ircurves";
    /// Fixing input store (one record per run).
    pub const FIXINGS: &str = "fixings";
    /// Counterparty CDS curve input store.
    pub const CP_CDS: &str = "cp_cds";
    /// CSV artifact output store.
    pub const CVA_CSV: &str = "cva_csv";
    /// Tabular artifact output store.
    pub const CVA_DATA: &str = "cva_data";
}
