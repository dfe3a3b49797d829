//! Exposure calculator.
//!
//! Turns a raw mark-to-market payment schedule into a non-negative expected
//! exposure profile. The algorithm is order-sensitive and exact:
//!
//! 1. `payment[i] = flag * (float[i] - fixed[i])`
//! 2. cumulative value from the end, `cum[N] = 0`, `cum[i] = cum[i+1] + payment[i]`
//! 3. clamp each cumulative value at zero
//! 4. `exposure[i] = 0.5 * (cum[i] + cum[i+1])`, the trapezoidal average of
//!    adjacent clamped cumulative values

use cva_core::{ExposureProfile, MtmResult, RecordError};

/// Derives the expected-exposure profile for one priced (trade, curve)
/// pairing.
///
/// `flag` is the trade's payer/receiver direction (+1 payer, -1 receiver,
/// 0 flat); `counterparty` is joined on from the trade and carried through
/// for the credit lookup downstream.
///
/// # Errors
///
/// Unequal-length or empty leg arrays fail the pairing with
/// [`RecordError::LegMismatch`]; discount or fraction vectors that disagree
/// with the leg count fail it with [`RecordError::Invalid`]. The caller
/// drops the pairing and continues.
pub fn exposure_profile(
    mtm: &MtmResult,
    flag: i32,
    counterparty: &str,
) -> Result<ExposureProfile, RecordError> {
    let n = mtm.fixlegamount.len();
    if n == 0 || mtm.fltlegamount.len() != n {
        return Err(RecordError::LegMismatch {
            fixed: n,
            floating: mtm.fltlegamount.len(),
        });
    }
    // Every downstream zip assumes one discount and one fraction per leg.
    if mtm.discountvalues.len() != n || mtm.legfractions.len() != n {
        return Err(RecordError::Invalid {
            kind: "mtm",
            reason: format!(
                "{} discounts / {} fractions for {} payment legs",
                mtm.discountvalues.len(),
                mtm.legfractions.len(),
                n
            ),
        });
    }

    let flag = f64::from(flag);
    let mut cum = vec![0.0; n + 1];
    for i in (0..n).rev() {
        let payment = flag * (mtm.fltlegamount[i] - mtm.fixlegamount[i]);
        cum[i] = cum[i + 1] + payment;
    }
    for value in &mut cum {
        *value = value.max(0.0);
    }

    let exposures = (0..n).map(|i| 0.5 * (cum[i] + cum[i + 1])).collect();

    Ok(ExposureProfile {
        tradeid: mtm.tradeid.clone(),
        curvename: mtm.curvename.clone(),
        counterparty: counterparty.to_string(),
        exposures,
        legfractions: mtm.legfractions.clone(),
        discountfactors: mtm.discountvalues.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mtm(fixed: &[f64], float: &[f64]) -> MtmResult {
        MtmResult {
            tradeid: "t000000".to_string(),
            curvename: "c0".to_string(),
            fixlegamount: fixed.to_vec(),
            fltlegamount: float.to_vec(),
            discountvalues: vec![1.0; fixed.len()],
            legfractions: (1..=fixed.len()).map(|i| i as f64 * 0.5).collect(),
            haserrored: false,
            error: String::new(),
        }
    }

    #[test]
    fn payer_swap_profile_matches_worked_example() {
        let mtm = mtm(
            &[985.83, 985.83, 1018.33, 985.83],
            &[101.11, 1162.66, 1205.57, 1622.08],
        );
        let profile = exposure_profile(&mtm, 1, "ACME").unwrap();

        let expected = [557.96, 911.905, 729.87, 318.125];
        assert_eq!(profile.exposures.len(), expected.len());
        for (got, want) in profile.exposures.iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-9);
        }
        assert_eq!(profile.counterparty, "ACME");
    }

    #[test]
    fn receiver_flag_negates_payments() {
        let mtm = mtm(&[100.0, 100.0], &[150.0, 150.0]);
        // Receiver of the fixed leg: positive float excess is a liability.
        let profile = exposure_profile(&mtm, -1, "ACME").unwrap();
        assert!(profile.exposures.iter().all(|e| *e == 0.0));
    }

    #[test]
    fn flat_flag_zeroes_exposure() {
        let mtm = mtm(&[100.0], &[150.0]);
        let profile = exposure_profile(&mtm, 0, "ACME").unwrap();
        assert_eq!(profile.exposures, vec![0.0]);
    }

    #[test]
    fn negative_residuals_are_not_exposure() {
        // Every payment negative for a payer: clamped to zero throughout.
        let mtm = mtm(&[200.0, 200.0], &[100.0, 100.0]);
        let profile = exposure_profile(&mtm, 1, "ACME").unwrap();
        assert_eq!(profile.exposures, vec![0.0, 0.0]);
    }

    #[test]
    fn mismatched_legs_fail_the_pairing() {
        let mut bad = mtm(&[1.0, 2.0], &[1.0, 2.0]);
        bad.fltlegamount.pop();
        let err = exposure_profile(&bad, 1, "ACME").unwrap_err();
        assert!(matches!(
            err,
            RecordError::LegMismatch {
                fixed: 2,
                floating: 1
            }
        ));
    }

    #[test]
    fn short_discount_vector_fails_the_pairing() {
        let mut bad = mtm(&[1.0, 2.0], &[2.0, 3.0]);
        bad.discountvalues.pop();
        let err = exposure_profile(&bad, 1, "ACME").unwrap_err();
        assert!(matches!(err, RecordError::Invalid { kind: "mtm", .. }));
    }

    #[test]
    fn short_fraction_vector_fails_the_pairing() {
        let mut bad = mtm(&[1.0, 2.0], &[2.0, 3.0]);
        bad.legfractions.pop();
        let err = exposure_profile(&bad, 1, "ACME").unwrap_err();
        assert!(matches!(err, RecordError::Invalid { kind: "mtm", .. }));
    }

    #[test]
    fn empty_legs_fail_the_pairing() {
        let bad = mtm(&[], &[]);
        assert!(exposure_profile(&bad, 1, "ACME").is_err());
    }

    #[test]
    fn carries_fractions_and_discounts_through() {
        let mtm = mtm(&[1.0, 1.0, 1.0], &[2.0, 2.0, 2.0]);
        let profile = exposure_profile(&mtm, 1, "ACME").unwrap();
        assert_eq!(profile.legfractions, mtm.legfractions);
        assert_eq!(profile.discountfactors, mtm.discountvalues);
    }
}
