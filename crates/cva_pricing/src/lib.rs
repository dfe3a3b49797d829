//! # CVA Pricing (L2: Service boundary)
//!
//! The boundary to the external pricing engine: wire protocol types, an HTTP
//! JSON batch client, and a bounded fan-out dispatcher that keeps at most
//! `batch_size * fan_out` items buffered awaiting a response.
//!
//! The engine itself is a black box. Its contract: for a request of `k`
//! ordered items it returns exactly `k` ordered items, result *i*
//! corresponding to input *i*. Any count mismatch is treated as a
//! batch-level failure, never silently dropped, since it may indicate a
//! systemic desync.

pub mod client;
pub mod dispatch;
pub mod protocol;

pub use client::{HttpPricingClient, PricingError, PricingService};
pub use dispatch::{price_all, DispatchConfig, PricingStats};
pub use protocol::{PriceBatchRequest, PriceBatchResponse, PricingRequestItem};
