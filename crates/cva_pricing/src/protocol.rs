//! Wire protocol for the pricing service boundary.
//!
//! A batch request is an ordered list of JSON strings, each containing the
//! calculation date plus the full trade, curve and fixing documents. The
//! response mirrors it: an ordered list of JSON strings, one mark-to-market
//! payload per request item, same order, same count.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use cva_core::{CurveRecord, FixingRecord, TradeRecord};

/// One item of a pricing batch request.
///
/// The trade, curve and fixing fields carry the full original documents;
/// the engine parses what it needs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PricingRequestItem {
    /// Calculation date, ISO-8601 (`2016-01-07`).
    pub calcdate: String,
    /// Full trade document.
    pub trade: Value,
    /// Full curve scenario document.
    pub curve: Value,
    /// Full fixing document.
    pub fixing: Value,
    /// Ask the engine for verbose diagnostics on this item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
}

impl PricingRequestItem {
    /// Builds a request item from the joined triple.
    ///
    /// Serialising the records reconstructs their full original documents
    /// because parsed records retain unrecognised fields.
    pub fn new(
        calcdate: &str,
        trade: &TradeRecord,
        curve: &CurveRecord,
        fixing: &FixingRecord,
        debug: bool,
    ) -> Self {
        Self {
            calcdate: calcdate.to_string(),
            trade: serde_json::to_value(trade).unwrap_or(Value::Null),
            curve: serde_json::to_value(curve).unwrap_or(Value::Null),
            fixing: serde_json::to_value(fixing).unwrap_or(Value::Null),
            debug: debug.then_some(true),
        }
    }
}

/// An ordered batch of serialised request items.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PriceBatchRequest {
    /// Request items, one JSON string each, order-significant.
    pub items: Vec<String>,
}

/// An ordered batch of serialised mark-to-market payloads.
///
/// `items[i]` corresponds to the request's `items[i]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PriceBatchResponse {
    /// Response items, one JSON string each, positionally correlated.
    pub items: Vec<String>,
}
