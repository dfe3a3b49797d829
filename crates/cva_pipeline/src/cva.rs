//! CVA calculator.
//!
//! Combines an exposure profile with the counterparty's piecewise-constant
//! CDS spread curve:
//!
//! 1. spread rate per leg fraction, by left bisection into the period grid
//! 2. hazard rate `spread / (1 - recovery)`
//! 3. marginal default probability, survival-curve differencing under
//!    piecewise-constant hazard
//! 4. per-leg CVA `exposure * discount * defaultProb * (1 - recovery)`,
//!    netted by summation

use tracing::warn;

use cva_core::{CdsRecord, CvaRecord, ExposureProfile};

/// Selects the spread applicable at leg fraction `fraction`.
///
/// Left bisection: the earliest index whose period boundary is `>=` the
/// fraction, so a fraction landing exactly on a boundary takes that period's
/// spread and duplicate boundaries resolve to the first. Fractions beyond
/// the defined curve reuse the last spread.
#[inline]
pub fn spread_at(spreads: &[f64], spread_periods: &[f64], fraction: f64) -> f64 {
    let j = spread_periods
        .partition_point(|period| *period < fraction)
        .min(spreads.len() - 1);
    spreads[j]
}

/// Computes the CVA contribution of one (trade, curve) pairing.
///
/// An empty exposure profile (upstream pricing failure) yields empty vectors
/// and a net CVA of zero with a logged warning, never a panic.
pub fn cva_record(profile: &ExposureProfile, cds: &CdsRecord) -> CvaRecord {
    if profile.exposures.is_empty() {
        warn!(
            tradeid = %profile.tradeid,
            curvename = %profile.curvename,
            "empty exposure profile, emitting zero CVA"
        );
        return CvaRecord {
            tradeid: profile.tradeid.clone(),
            curvename: profile.curvename.clone(),
            counterparty: profile.counterparty.clone(),
            cva: 0.0,
            spreadrates: Vec::new(),
            hazardrates: Vec::new(),
            defaultprob: Vec::new(),
            cvaexposurebyleg: Vec::new(),
        };
    }

    let lgd = cds.loss_given_default();
    let fractions = &profile.legfractions;

    let spreadrates: Vec<f64> = fractions
        .iter()
        .map(|f| spread_at(&cds.spreads, &cds.spread_periods, *f))
        .collect();
    let hazardrates: Vec<f64> = spreadrates.iter().map(|s| s / lgd).collect();

    // Survival-curve differencing: P(default in leg i) is the drop in
    // exp(-hazard * fraction) across the leg, starting from survival 1.
    let mut defaultprob = Vec::with_capacity(fractions.len());
    let mut survival_prev = 1.0;
    for (hazard, fraction) in hazardrates.iter().zip(fractions) {
        let survival = (-hazard * fraction).exp();
        defaultprob.push(survival_prev - survival);
        survival_prev = survival;
    }

    let cvaexposurebyleg: Vec<f64> = profile
        .exposures
        .iter()
        .zip(&profile.discountfactors)
        .zip(&defaultprob)
        .map(|((exposure, discount), pd)| exposure * discount * pd * lgd)
        .collect();
    let cva = cvaexposurebyleg.iter().sum();

    CvaRecord {
        tradeid: profile.tradeid.clone(),
        curvename: profile.curvename.clone(),
        counterparty: profile.counterparty.clone(),
        cva,
        spreadrates,
        hazardrates,
        defaultprob,
        cvaexposurebyleg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cds(spreads: &[f64], periods: &[f64], recovery: f64) -> CdsRecord {
        CdsRecord::from_json(
            &serde_json::json!({
                "ticker": "ACME",
                "shortname": "Acme Corp",
                "spreads": spreads,
                "spread_periods": periods,
                "recovery": recovery,
            })
            .to_string(),
        )
        .unwrap()
    }

    fn profile(exposures: &[f64], fractions: &[f64]) -> ExposureProfile {
        ExposureProfile {
            tradeid: "t000000".to_string(),
            curvename: "c0".to_string(),
            counterparty: "ACME".to_string(),
            exposures: exposures.to_vec(),
            legfractions: fractions.to_vec(),
            discountfactors: vec![1.0; exposures.len()],
        }
    }

    #[test]
    fn bisection_takes_earliest_period_at_exact_boundary() {
        let spreads = [0.010, 0.020, 0.020, 0.030];
        let periods = [0.5, 1.0, 1.0, 2.0];
        // Exactly on a duplicated boundary: earliest matching index wins.
        assert_eq!(spread_at(&spreads, &periods, 1.0), 0.020);
        // Strictly inside a period: first boundary at or after the fraction.
        assert_eq!(spread_at(&spreads, &periods, 0.75), 0.020);
        assert_eq!(spread_at(&spreads, &periods, 0.25), 0.010);
    }

    #[test]
    fn bisection_reuses_last_spread_beyond_curve_end() {
        let spreads = [0.010, 0.020];
        let periods = [1.0, 5.0];
        assert_eq!(spread_at(&spreads, &periods, 30.0), 0.020);
    }

    #[test]
    fn hazard_and_default_probability_round_trip() {
        let cds = cds(&[0.01], &[1.0], 0.4);
        let profile = profile(&[100.0], &[1.0]);
        let record = cva_record(&profile, &cds);

        assert_relative_eq!(record.hazardrates[0], 0.01 / 0.6, epsilon = 1e-12);
        assert_relative_eq!(record.defaultprob[0], 0.01653, epsilon = 1e-4);
    }

    #[test]
    fn default_probabilities_difference_the_survival_curve() {
        let cds = cds(&[0.012, 0.012], &[1.0, 2.0], 0.4);
        let profile = profile(&[100.0, 100.0], &[1.0, 2.0]);
        let record = cva_record(&profile, &cds);

        let h: f64 = 0.012 / 0.6;
        assert_relative_eq!(record.defaultprob[0], 1.0 - (-h).exp(), epsilon = 1e-12);
        assert_relative_eq!(
            record.defaultprob[1],
            (-h).exp() - (-2.0 * h).exp(),
            epsilon = 1e-12
        );
        // Probabilities sum to the total default probability over the horizon.
        let total: f64 = record.defaultprob.iter().sum();
        assert_relative_eq!(total, 1.0 - (-2.0 * h).exp(), epsilon = 1e-12);
    }

    #[test]
    fn net_cva_is_the_leg_sum() {
        let cds = cds(&[0.01, 0.015], &[0.5, 1.0], 0.4);
        let profile = profile(&[557.95, 911.90], &[0.5, 1.0]);
        let record = cva_record(&profile, &cds);

        let sum: f64 = record.cvaexposurebyleg.iter().sum();
        assert_relative_eq!(record.cva, sum, epsilon = 1e-12);
        assert!(record.cva > 0.0);
    }

    #[test]
    fn empty_profile_yields_zero_cva() {
        let cds = cds(&[0.01], &[1.0], 0.4);
        let record = cva_record(&profile(&[], &[]), &cds);
        assert_eq!(record.cva, 0.0);
        assert!(record.cvaexposurebyleg.is_empty());
        assert!(record.defaultprob.is_empty());
    }
}
