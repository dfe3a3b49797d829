//! Per-counterparty totals.

use serde::{Deserialize, Serialize};

/// Running CVA total for one counterparty: the final reportable number.
///
/// Plain summation, so `combine` is associative and commutative across
/// partitions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CounterpartyAggregate {
    /// Counterparty code.
    pub counterparty: String,
    /// Counterparty display name, from the CDS reference record.
    pub shortname: String,
    /// Trades folded in.
    pub count: u64,
    /// Summed net CVA.
    pub cva: f64,
}

impl CounterpartyAggregate {
    /// Creates an empty total for a counterparty.
    pub fn new(counterparty: impl Into<String>, shortname: impl Into<String>) -> Self {
        Self {
            counterparty: counterparty.into(),
            shortname: shortname.into(),
            count: 0,
            cva: 0.0,
        }
    }

    /// Folds one trade's net CVA into the total.
    pub fn add(&mut self, cva: f64) {
        self.count += 1;
        self.cva += cva;
    }

    /// Merges another partial total of the same counterparty.
    pub fn combine(&mut self, other: &CounterpartyAggregate) {
        self.count += other.count;
        self.cva += other.cva;
    }

    /// Removes a previously merged partial total, for sliding-window use.
    ///
    /// Only valid when `other` (or its exact contents) was previously added
    /// or combined into this total; this is not checked at runtime.
    pub fn deduct(&mut self, other: &CounterpartyAggregate) {
        self.count -= other.count;
        self.cva -= other.cva;
    }
}
