//! Numeric guards for ill-conditioned rate arithmetic.
//!
//! Extreme parameter combinations (large bond-energy products, deeply
//! depleted reservoirs) push the rate exponentials outside the range a
//! double can represent. Every rate computation therefore routes through
//! two guards in sequence: [`safe_exp`] saturates the exponent before
//! evaluation, and [`finite_or_zero`] replaces any non-finite survivor
//! with exactly zero so it drops out of weighted selection instead of
//! corrupting it.

/// Largest exponent argument evaluated as-is; `exp(700)` is about 1e304,
/// the last comfortable magnitude below the double-precision ceiling.
pub const MAX_EXP_ARG: f64 = 700.0;

/// Floor applied to uniform draws before taking a logarithm, so a zero
/// draw can never produce an infinite waiting time.
pub const MIN_UNIFORM_DRAW: f64 = 1e-15;

/// Exponential with the argument saturated to `[-700, 700]`.
///
/// Arguments beyond the bound all map to the boundary value, so
/// `safe_exp(800)` and `safe_exp(1000)` return the same finite number.
/// A NaN argument propagates; [`finite_or_zero`] handles it downstream.
pub fn safe_exp(x: f64) -> f64 {
    x.clamp(-MAX_EXP_ARG, MAX_EXP_ARG).exp()
}

/// Pass finite values through unchanged; map `inf`, `-inf`, and NaN to
/// exactly `0.0`.
pub const fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() { x } else { 0.0 }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn safe_exp_saturates_identically_above_the_bound() {
        let at_800 = safe_exp(800.0);
        let at_1000 = safe_exp(1000.0);
        assert!(at_800.is_finite());
        assert_eq!(at_800, at_1000);
        assert_eq!(at_800, MAX_EXP_ARG.exp());
    }

    #[test]
    fn safe_exp_underflows_to_effectively_zero() {
        let tiny = safe_exp(-800.0);
        assert!(tiny >= 0.0);
        assert!(tiny < 1e-300);
    }

    #[test]
    fn safe_exp_is_exact_in_the_interior() {
        assert_eq!(safe_exp(0.0), 1.0);
        assert_eq!(safe_exp(1.0), 1.0_f64.exp());
    }

    #[test]
    fn finite_or_zero_scrubs_every_non_finite() {
        assert_eq!(finite_or_zero(f64::INFINITY), 0.0);
        assert_eq!(finite_or_zero(f64::NEG_INFINITY), 0.0);
        assert_eq!(finite_or_zero(f64::NAN), 0.0);
    }

    #[test]
    fn finite_or_zero_passes_finite_values_unchanged() {
        assert_eq!(finite_or_zero(0.0), 0.0);
        assert_eq!(finite_or_zero(-3.5), -3.5);
        assert_eq!(finite_or_zero(1.0e300), 1.0e300);
    }

    #[test]
    fn nan_argument_still_ends_at_zero_after_both_guards() {
        assert_eq!(finite_or_zero(safe_exp(f64::NAN)), 0.0);
    }
}
