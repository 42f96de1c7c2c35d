//! Attempt-rate functions for the four kinetic event categories.
//!
//! Each function is pure: a rate depends only on the parameter record, the
//! site's bond-count class, and (for adsorption) the live supersaturation
//! and reservoir occupancy. All four route their exponential through
//! [`safe_exp`] and their result through [`finite_or_zero`], so a rate is
//! always a finite non-negative number -- degenerate inputs silently
//! become zero weight rather than poisoning the selection sums.

use crate::config::KmcParams;
use crate::numeric::{finite_or_zero, safe_exp};

/// Signed epsilon that keeps the supersaturation divisor away from zero
/// while preserving the sign of the correction term.
const SUPERSATURATION_EPSILON: f64 = 1e-12;

/// Adsorption attempt rate for a site with `class` prospective bonds.
///
/// Zero when the reservoir is empty. Otherwise
/// `K0 * exp(S + class * delta / S_guarded) * bulk / initial_bulk`,
/// where `S_guarded` is the supersaturation held away from zero by a
/// signed epsilon. The occupancy factor drives the rate toward zero as
/// the reservoir depletes, producing the finite-reservoir plateau.
pub fn adsorption_rate(
    params: &KmcParams,
    class: usize,
    supersaturation: f64,
    bulk: u32,
    initial_bulk: u32,
) -> f64 {
    if bulk == 0 {
        return 0.0;
    }
    let epsilon = if supersaturation >= 0.0 {
        SUPERSATURATION_EPSILON
    } else {
        -SUPERSATURATION_EPSILON
    };
    let correction =
        class_factor(class) * (params.supersaturation_sensitivity / supersaturation.max(epsilon));
    let base = params.attempt_prefactor * safe_exp(supersaturation + correction);
    let occupancy = f64::from(bulk) / f64::from(initial_bulk.max(1));
    finite_or_zero(base * occupancy)
}

/// Desorption attempt rate for a site whose removal breaks `class` bonds:
/// `K0 * exp(phi - class * Eb)`.
pub fn desorption_rate(params: &KmcParams, class: usize) -> f64 {
    let arg = params.chemical_potential - class_factor(class) * params.bond_energy;
    finite_or_zero(params.attempt_prefactor * safe_exp(arg))
}

/// Migration attempt rate for a site with `class` bonds:
/// `K0 * exp(phi + Eb/2 - class * Eb)`.
///
/// The half-bond offset makes a hop cheaper than a full detachment into
/// the reservoir.
pub fn migration_rate(params: &KmcParams, class: usize) -> f64 {
    let arg = params.chemical_potential + 0.5 * params.bond_energy
        - class_factor(class) * params.bond_energy;
    finite_or_zero(params.attempt_prefactor * safe_exp(arg))
}

/// Incorporation attempt rate for a site with `class` bonds:
/// `Kinc * exp(class * Eb)`.
///
/// Unlike the other three, better-bonded sites incorporate *faster*:
/// lateral coordination favors conversion into the bulk phase.
pub fn incorporation_rate(params: &KmcParams, class: usize) -> f64 {
    let arg = class_factor(class) * params.bond_energy;
    finite_or_zero(params.incorporation_prefactor * safe_exp(arg))
}

/// Bond-count class as a float factor. Classes are at most 4, so the
/// conversion is always exact.
fn class_factor(class: usize) -> f64 {
    f64::from(u32::try_from(class).unwrap_or(u32::MAX))
}
