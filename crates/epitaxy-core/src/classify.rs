//! Per-category binning of surface sites by bond-count class.
//!
//! Every step, the engine reclassifies the whole surface from scratch: a
//! single full pass sorts each site into small fixed-index bins, one bin
//! per bond-count class per event category. Sites sharing a bin share an
//! identical attempt rate by construction, which is what makes the later
//! uniform-within-bin site choice exact rather than approximate.
//!
//! Bins are fixed-size arrays indexed by class, each holding a growable
//! list of sites -- the classification stays cache-friendly and needs no
//! hashing. Recomputing from scratch each step is an accepted cost; there
//! is deliberately no incremental bin maintenance.

use epitaxy_lattice::SosSurface;
use epitaxy_types::Site;

/// Number of bond-count classes for adsorption, desorption, and
/// incorporation (0 through 4 lateral bonds).
pub const BOND_CLASSES: usize = 5;

/// Number of bond-count classes for migration (clipped one lower).
pub const MIGRATION_CLASSES: usize = 4;

/// Highest class index for adsorption/desorption/incorporation binning.
const MAX_BOND_CLASS: usize = BOND_CLASSES - 1;

/// Highest class index for migration binning.
const MAX_MIGRATION_CLASS: usize = MIGRATION_CLASSES - 1;

/// The four per-category site binnings for one surface state.
#[derive(Debug, Clone, Default)]
pub struct SurfaceBins {
    /// Every site, keyed by prospective adsorption bond count.
    adsorption: [Vec<Site>; BOND_CLASSES],
    /// Occupied sites, keyed by desorption bond count.
    desorption: [Vec<Site>; BOND_CLASSES],
    /// Occupied sites with at least one legal hop target, keyed by
    /// desorption bond count clipped to the migration class range.
    migration: [Vec<Site>; MIGRATION_CLASSES],
    /// Occupied sites, keyed by desorption bond count; incorporation
    /// reuses occupied-site bonding as its favorability signal.
    incorporation: [Vec<Site>; BOND_CLASSES],
}

impl SurfaceBins {
    /// Classify every site of the surface into all four category binnings.
    ///
    /// One fresh, exhaustive pass: adsorption covers every site exactly
    /// once; desorption and incorporation cover exactly the occupied
    /// sites; migration covers the occupied sites that have somewhere
    /// to hop.
    pub fn classify(surface: &SosSurface) -> Self {
        let mut bins = Self::default();
        for site in surface.sites() {
            let ads_class = surface.adsorption_bond_count(site).min(MAX_BOND_CLASS);
            if let Some(bin) = bins.adsorption.get_mut(ads_class) {
                bin.push(site);
            }

            if surface.height(site) == 0 {
                continue;
            }
            let des_bonds = surface.desorption_bond_count(site);

            let des_class = des_bonds.min(MAX_BOND_CLASS);
            if let Some(bin) = bins.desorption.get_mut(des_class) {
                bin.push(site);
            }
            if let Some(bin) = bins.incorporation.get_mut(des_class) {
                bin.push(site);
            }

            if !surface.migration_targets(site).is_empty() {
                let mig_class = des_bonds.min(MAX_MIGRATION_CLASS);
                if let Some(bin) = bins.migration.get_mut(mig_class) {
                    bin.push(site);
                }
            }
        }
        bins
    }

    /// Adsorption bins, indexed by bond-count class.
    pub const fn adsorption(&self) -> &[Vec<Site>] {
        self.adsorption.as_slice()
    }

    /// Desorption bins, indexed by bond-count class.
    pub const fn desorption(&self) -> &[Vec<Site>] {
        self.desorption.as_slice()
    }

    /// Migration bins, indexed by (clipped) bond-count class.
    pub const fn migration(&self) -> &[Vec<Site>] {
        self.migration.as_slice()
    }

    /// Incorporation bins, indexed by bond-count class.
    pub const fn incorporation(&self) -> &[Vec<Site>] {
        self.incorporation.as_slice()
    }
}

/// Total number of sites across a category's bins.
pub fn binned_site_count(bins: &[Vec<Site>]) -> usize {
    bins.iter()
        .fold(0_usize, |acc, bin| acc.saturating_add(bin.len()))
}
