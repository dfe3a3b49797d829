//! Per-trade aggregation across curve scenarios.

use tracing::{error, warn};

use cva_core::CvaRecord;

/// Running aggregate of one trade's CVA records across its curve scenarios.
///
/// The representative scenario fields (counterparty, spread rates, hazard
/// rates, default probabilities) always come from exactly one scenario: the
/// lexicographically smallest curve name seen so far. They are replaced
/// wholesale when a smaller curve name arrives, never merged field by field.
/// The per-leg and net CVA sums accumulate over every record regardless of
/// which scenario is representative; [`TradeAggregate::finish`] divides by
/// the count to report the average across scenarios.
#[derive(Clone, Debug)]
pub struct TradeAggregate {
    tradeid: String,
    count: u64,
    net_sum: f64,
    leg_sum: Vec<f64>,
    counterparty: String,
    repr_curve: String,
    spreadrates: Vec<f64>,
    hazardrates: Vec<f64>,
    defaultprob: Vec<f64>,
}

impl TradeAggregate {
    /// Creates an empty aggregate for a trade.
    pub fn new(tradeid: impl Into<String>) -> Self {
        Self {
            tradeid: tradeid.into(),
            count: 0,
            net_sum: 0.0,
            leg_sum: Vec::new(),
            counterparty: String::new(),
            repr_curve: String::new(),
            spreadrates: Vec::new(),
            hazardrates: Vec::new(),
            defaultprob: Vec::new(),
        }
    }

    /// Records seen so far.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The current representative curve name.
    #[inline]
    pub fn representative_curve(&self) -> &str {
        &self.repr_curve
    }

    /// Folds one CVA record into the aggregate.
    ///
    /// A record whose leg vector length disagrees with the trade's
    /// established length is malformed: it is logged and dropped, the
    /// aggregate is unchanged.
    pub fn add(&mut self, record: &CvaRecord) {
        if self.count > 0 && record.cvaexposurebyleg.len() != self.leg_sum.len() {
            warn!(
                tradeid = %record.tradeid,
                curvename = %record.curvename,
                expected = self.leg_sum.len(),
                got = record.cvaexposurebyleg.len(),
                "leg vector length mismatch, dropping record"
            );
            return;
        }

        if self.count == 0 {
            self.leg_sum = record.cvaexposurebyleg.clone();
        } else {
            for (sum, leg) in self.leg_sum.iter_mut().zip(&record.cvaexposurebyleg) {
                *sum += leg;
            }
        }

        if self.count == 0 || record.curvename < self.repr_curve {
            self.set_representative(
                &record.curvename,
                &record.counterparty,
                &record.spreadrates,
                &record.hazardrates,
                &record.defaultprob,
            );
        }

        self.net_sum += record.cva;
        self.count += 1;
    }

    /// Merges another partial aggregate of the same trade into this one.
    ///
    /// Symmetric tie-break: the side with the smaller representative curve
    /// name supplies the representative fields of the merged aggregate.
    pub fn combine(&mut self, other: &TradeAggregate) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        if other.leg_sum.len() != self.leg_sum.len() {
            warn!(
                tradeid = %self.tradeid,
                expected = self.leg_sum.len(),
                got = other.leg_sum.len(),
                "leg vector length mismatch between partial aggregates, dropping partial"
            );
            return;
        }
        for (sum, leg) in self.leg_sum.iter_mut().zip(&other.leg_sum) {
            *sum += leg;
        }

        if other.repr_curve < self.repr_curve {
            self.set_representative(
                &other.repr_curve,
                &other.counterparty,
                &other.spreadrates,
                &other.hazardrates,
                &other.defaultprob,
            );
        }

        self.net_sum += other.net_sum;
        self.count += other.count;
    }

    /// Finalises the aggregate into the trade's average CVA record.
    ///
    /// A zero count is a degenerate state: it emits a zeroed record and logs
    /// at error level rather than dividing by zero.
    pub fn finish(self) -> CvaRecord {
        if self.count == 0 {
            error!(tradeid = %self.tradeid, "finishing trade aggregate with zero records");
            return CvaRecord {
                tradeid: self.tradeid,
                curvename: String::new(),
                counterparty: String::new(),
                cva: 0.0,
                spreadrates: Vec::new(),
                hazardrates: Vec::new(),
                defaultprob: Vec::new(),
                cvaexposurebyleg: Vec::new(),
            };
        }

        let divisor = self.count as f64;
        CvaRecord {
            tradeid: self.tradeid,
            curvename: self.repr_curve,
            counterparty: self.counterparty,
            cva: self.net_sum / divisor,
            spreadrates: self.spreadrates,
            hazardrates: self.hazardrates,
            defaultprob: self.defaultprob,
            cvaexposurebyleg: self.leg_sum.iter().map(|leg| leg / divisor).collect(),
        }
    }

    fn set_representative(
        &mut self,
        curvename: &str,
        counterparty: &str,
        spreadrates: &[f64],
        hazardrates: &[f64],
        defaultprob: &[f64],
    ) {
        self.repr_curve = curvename.to_string();
        self.counterparty = counterparty.to_string();
        self.spreadrates = spreadrates.to_vec();
        self.hazardrates = hazardrates.to_vec();
        self.defaultprob = defaultprob.to_vec();
    }
}
