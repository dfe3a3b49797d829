//! Input and intermediate record types.
//!
//! Input records (`TradeRecord`, `CurveRecord`, `FixingRecord`, `CdsRecord`)
//! are parsed from the JSON values held in the input stores. Required fields
//! are surfaced as typed struct members; everything else the document carried
//! is retained in `extra` so the record serialises back to the full original
//! document — the pricing request embeds whole trade, curve and fixing
//! documents, not just the fields this crate inspects.
//!
//! Intermediate records (`MtmResult`, `ExposureProfile`, `CvaRecord`) flow
//! between pipeline stages and are transient within a run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RecordError;

/// A trade: identifier, direction flag, counterparty, and the
/// scenario-independent cashflow schedule retained in `extra`.
///
/// `payer_receiver_flag` is `+1` for a payer swap, `-1` for a receiver swap
/// and `0` for a flat position.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Trade identifier, unique within a run snapshot.
    pub tradeid: String,
    /// +1 payer, -1 receiver, 0 flat.
    pub payer_receiver_flag: i32,
    /// Counterparty code, the key into the CDS store.
    pub counterparty: String,
    /// Remaining fields of the original document (cashflow schedule etc).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TradeRecord {
    /// Parses a trade from its store JSON value.
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        serde_json::from_str(json).map_err(|e| RecordError::malformed("trade", e))
    }
}

/// An interest-rate curve scenario. The curve description itself is opaque
/// to this pipeline and retained in `extra` for the pricing service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CurveRecord {
    /// Curve scenario name, e.g. `"curvescenario0000"`.
    pub curvename: String,
    /// Full curve description from the original document.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CurveRecord {
    /// Parses a curve from its store JSON value.
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        serde_json::from_str(json).map_err(|e| RecordError::malformed("curve", e))
    }
}

/// The scenario-wide fixing record: published dates and rates. Exactly one
/// is used per run and broadcast onto every trade/curve pairing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixingRecord {
    /// Name of the curve the fixings belong to.
    pub curvename: String,
    /// Fixing dates as epoch seconds.
    pub fixing_dates: Vec<i64>,
    /// Fixing rates, parallel to `fixing_dates`.
    pub fixing_rates: Vec<f64>,
    /// Remaining fields of the original document.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FixingRecord {
    /// Parses a fixing from its store JSON value.
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        let fixing: FixingRecord =
            serde_json::from_str(json).map_err(|e| RecordError::malformed("fixing", e))?;
        if fixing.fixing_dates.len() != fixing.fixing_rates.len() {
            return Err(RecordError::Invalid {
                kind: "fixing",
                reason: format!(
                    "{} fixing dates vs {} rates",
                    fixing.fixing_dates.len(),
                    fixing.fixing_rates.len()
                ),
            });
        }
        Ok(fixing)
    }
}

/// A counterparty's piecewise-constant CDS spread curve plus the reference
/// fields carried through to the tabular artifact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CdsRecord {
    /// Counterparty code; matches `TradeRecord::counterparty`.
    pub ticker: String,
    /// Counterparty display name.
    #[serde(default)]
    pub shortname: String,
    /// Quote date, reference only.
    #[serde(default)]
    pub date: String,
    /// Markit RED identifier, reference only.
    #[serde(default)]
    pub redcode: String,
    /// Seniority tier, reference only.
    #[serde(default)]
    pub tier: String,
    /// CDS spreads per period.
    pub spreads: Vec<f64>,
    /// Period boundaries (year fractions), sorted ascending.
    pub spread_periods: Vec<f64>,
    /// Recovery rate in `[0, 1)`.
    pub recovery: f64,
    /// Remaining fields of the original document.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CdsRecord {
    /// Parses and validates a counterparty CDS curve from its store JSON.
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        let cds: CdsRecord =
            serde_json::from_str(json).map_err(|e| RecordError::malformed("cp_cds", e))?;
        if !(0.0..1.0).contains(&cds.recovery) {
            return Err(RecordError::Invalid {
                kind: "cp_cds",
                reason: format!("recovery {} outside [0, 1)", cds.recovery),
            });
        }
        if cds.spreads.is_empty() || cds.spreads.len() != cds.spread_periods.len() {
            return Err(RecordError::Invalid {
                kind: "cp_cds",
                reason: format!(
                    "{} spreads vs {} spread periods",
                    cds.spreads.len(),
                    cds.spread_periods.len()
                ),
            });
        }
        Ok(cds)
    }

    /// Recovery-adjusted loss fraction, `1 - recovery`.
    #[inline]
    pub fn loss_given_default(&self) -> f64 {
        1.0 - self.recovery
    }
}

/// Raw valuation payload for one (trade, curve) pairing, as returned by the
/// pricing service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MtmResult {
    /// Trade identifier echoed by the service.
    pub tradeid: String,
    /// Curve scenario name echoed by the service.
    pub curvename: String,
    /// Fixed-leg payment amounts per period.
    pub fixlegamount: Vec<f64>,
    /// Floating-leg payment amounts per period.
    pub fltlegamount: Vec<f64>,
    /// Discount factors per period.
    pub discountvalues: Vec<f64>,
    /// Cumulative leg time fractions per period, non-decreasing.
    pub legfractions: Vec<f64>,
    /// Engine-side failure flag; an errored result carries no usable legs.
    #[serde(default)]
    pub haserrored: bool,
    /// Engine-side error description when `haserrored` is set.
    #[serde(default)]
    pub error: String,
}

impl MtmResult {
    /// Parses a mark-to-market payload from a pricing response item.
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        serde_json::from_str(json).map_err(|e| RecordError::malformed("mtm", e))
    }
}

/// Non-negative expected-exposure profile for one (trade, curve) pairing,
/// with the leg fractions and discount factors carried through from the MTM.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExposureProfile {
    /// Trade identifier.
    pub tradeid: String,
    /// Curve scenario name.
    pub curvename: String,
    /// Counterparty code, joined on from the trade.
    pub counterparty: String,
    /// Expected exposure per payment period, all `>= 0`.
    pub exposures: Vec<f64>,
    /// Cumulative leg time fractions, carried from the MTM.
    pub legfractions: Vec<f64>,
    /// Discount factors, carried from the MTM.
    pub discountfactors: Vec<f64>,
}

/// CVA contribution of one (trade, curve) pairing: per-leg vector and net.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CvaRecord {
    /// Trade identifier.
    pub tradeid: String,
    /// Curve scenario name; the trade aggregator's tie-break key.
    pub curvename: String,
    /// Counterparty code.
    pub counterparty: String,
    /// Net CVA, the sum of `cvaexposurebyleg`.
    pub cva: f64,
    /// Spread rate selected per leg from the CDS curve.
    pub spreadrates: Vec<f64>,
    /// Hazard rate per leg.
    pub hazardrates: Vec<f64>,
    /// Marginal default probability per leg.
    pub defaultprob: Vec<f64>,
    /// CVA contribution per leg.
    pub cvaexposurebyleg: Vec<f64>,
}
