//! Streaming aggregation of CVA records.
//!
//! Both reducers are built for partitioned execution: workers accumulate
//! disjoint key shards independently and a final `combine` merges partial
//! aggregates. Results are invariant to arrival order given the documented
//! tie-breaks.

mod counterparty;
mod trade;

pub use counterparty::CounterpartyAggregate;
pub use trade::TradeAggregate;
