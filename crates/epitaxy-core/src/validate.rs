//! Optional read-only integrity checks over the live simulation state.
//!
//! These checks guard structural invariants that are unreachable by
//! construction -- a binning pass that loses a site, a negative or
//! non-finite rate. In normal operation they never fire; they exist as
//! defense-in-depth for refactors and are kept out of the hot path
//! (enabled per run via [`RunBounds::verify_integrity`]).
//!
//! All checks are pure reads over the same interfaces the engine exposes
//! publicly; a failing check produces an [`IntegrityAnomaly`] rather than
//! a panic, so the run loop can preserve partial results.
//!
//! [`RunBounds::verify_integrity`]: crate::runner::RunBounds

use epitaxy_lattice::SosSurface;

use crate::classify::{BOND_CLASSES, MIGRATION_CLASSES, SurfaceBins, binned_site_count};
use crate::config::KmcParams;
use crate::engine::KmcEngine;
use crate::rates;

/// The result of an integrity pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityResult {
    /// All checked invariants hold.
    Consistent,
    /// One or more invariants are violated -- a logic defect.
    Anomaly(IntegrityAnomaly),
}

/// A collection of violated invariants from one integrity pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityAnomaly {
    /// Human-readable description of each violation.
    pub violations: Vec<String>,
}

impl std::fmt::Display for IntegrityAnomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "INTEGRITY_ANOMALY: {} violation(s): {}",
            self.violations.len(),
            self.violations.join("; ")
        )
    }
}

/// Run all integrity checks against the engine's live state.
///
/// Classifies the surface afresh (the checks must not trust the engine's
/// own pass) and verifies binning completeness and rate sanity.
pub fn verify_engine(engine: &KmcEngine) -> IntegrityResult {
    let bins = SurfaceBins::classify(engine.surface());
    let mut violations = Vec::new();

    collect_classification_violations(engine.surface(), &bins, &mut violations);
    collect_rate_violations(
        engine.params(),
        engine.supersaturation(),
        engine.bulk_particles(),
        engine.initial_bulk(),
        &mut violations,
    );

    if violations.is_empty() {
        IntegrityResult::Consistent
    } else {
        IntegrityResult::Anomaly(IntegrityAnomaly { violations })
    }
}

/// Verify that the four binnings account for the surface exactly.
pub fn verify_classification(surface: &SosSurface, bins: &SurfaceBins) -> IntegrityResult {
    let mut violations = Vec::new();
    collect_classification_violations(surface, bins, &mut violations);
    if violations.is_empty() {
        IntegrityResult::Consistent
    } else {
        IntegrityResult::Anomaly(IntegrityAnomaly { violations })
    }
}

/// Verify that every class rate is finite and non-negative for the live
/// reservoir state.
pub fn verify_rates(
    params: &KmcParams,
    supersaturation: f64,
    bulk: u32,
    initial_bulk: u32,
) -> IntegrityResult {
    let mut violations = Vec::new();
    collect_rate_violations(params, supersaturation, bulk, initial_bulk, &mut violations);
    if violations.is_empty() {
        IntegrityResult::Consistent
    } else {
        IntegrityResult::Anomaly(IntegrityAnomaly { violations })
    }
}

fn collect_classification_violations(
    surface: &SosSurface,
    bins: &SurfaceBins,
    violations: &mut Vec<String>,
) {
    let site_count = surface.site_count();
    let occupied = surface.sites().filter(|&s| surface.height(s) > 0).count();
    let empty = site_count.saturating_sub(occupied);

    let ads_total = binned_site_count(bins.adsorption());
    if ads_total != site_count {
        violations.push(format!(
            "adsorption bins hold {ads_total} sites, lattice has {site_count}"
        ));
    }

    let des_total = binned_site_count(bins.desorption());
    if des_total.saturating_add(empty) != site_count {
        violations.push(format!(
            "desorption bins hold {des_total} sites plus {empty} empty columns, lattice has {site_count}"
        ));
    }

    let inc_total = binned_site_count(bins.incorporation());
    if inc_total != des_total {
        violations.push(format!(
            "incorporation bins hold {inc_total} sites, desorption bins hold {des_total}"
        ));
    }

    let mig_total = binned_site_count(bins.migration());
    if mig_total > des_total {
        violations.push(format!(
            "migration bins hold {mig_total} sites, more than the {des_total} occupied sites"
        ));
    }
    for bin in bins.migration() {
        for &site in bin {
            if surface.height(site) == 0 {
                violations.push(format!("migration bin contains empty column {site}"));
            } else if surface.migration_targets(site).is_empty() {
                violations.push(format!("migration bin contains immobile site {site}"));
            }
        }
    }
}

fn collect_rate_violations(
    params: &KmcParams,
    supersaturation: f64,
    bulk: u32,
    initial_bulk: u32,
    violations: &mut Vec<String>,
) {
    for class in 0..BOND_CLASSES {
        let ads = rates::adsorption_rate(params, class, supersaturation, bulk, initial_bulk);
        check_rate("adsorption", class, ads, violations);
        check_rate("desorption", class, rates::desorption_rate(params, class), violations);
        check_rate(
            "incorporation",
            class,
            rates::incorporation_rate(params, class),
            violations,
        );
    }
    for class in 0..MIGRATION_CLASSES {
        check_rate("migration", class, rates::migration_rate(params, class), violations);
    }
}

fn check_rate(category: &str, class: usize, rate: f64, violations: &mut Vec<String>) {
    if !rate.is_finite() || rate < 0.0 {
        violations.push(format!("{category} rate for class {class} is {rate}"));
    }
}
