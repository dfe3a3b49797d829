//! Cartesian joiner.
//!
//! Pairs every trade with every curve scenario and broadcasts the single
//! fixing record onto each pairing. The product is emitted lazily: for
//! hundreds of thousands of trades against thousands of curves the full
//! product never exists in memory, the pricing dispatcher pulls items as
//! batch slots free up.

use cva_core::{CurveRecord, FixingRecord, TradeRecord};
use cva_pricing::PricingRequestItem;

/// Lazily yields one pricing request item per (trade, curve) pairing.
///
/// Emits exactly `trades.len() * curves.len()` items, each pairing exactly
/// once. No filtering, no deduplication; emission order carries no meaning
/// downstream.
pub fn joined_items<'a>(
    calcdate: &'a str,
    trades: &'a [TradeRecord],
    curves: &'a [CurveRecord],
    fixing: &'a FixingRecord,
    debug: bool,
) -> impl Iterator<Item = PricingRequestItem> + 'a {
    trades.iter().flat_map(move |trade| {
        curves
            .iter()
            .map(move |curve| PricingRequestItem::new(calcdate, trade, curve, fixing, debug))
    })
}
