//! The Solid-On-Solid surface: integer column heights on a periodic lattice.
//!
//! Each lattice site holds one non-negative integer, the height of the
//! crystal column standing on it. Overhangs and voids are not representable;
//! a column is a solid stack. Adjacency is von Neumann (±1 along each axis)
//! with periodic wraparound, so the surface is a torus and every site has
//! exactly four neighbors.
//!
//! # Bond counting
//!
//! The kinetic model classifies sites by how many lateral bonds a particle
//! at the top of a column would form or break:
//!
//! - [`adsorption_bond_count`] -- bonds a *newly adsorbed* particle would
//!   form: neighbors whose height reaches at least `h + 1`.
//! - [`desorption_bond_count`] -- bonds broken by *removing* the top
//!   particle: neighbors whose height reaches at least `h` (zero for an
//!   empty column, which has nothing to remove).
//! - [`migration_targets`] -- neighbors a top particle may hop to: those of
//!   equal or lower height. Particles move sideways or downhill, never up.
//!
//! Both bond counts are bounded by the neighbor count of 4, and the height
//! floor guarantees `desorption_bond_count` is 0 wherever the height is 0.
//!
//! [`adsorption_bond_count`]: SosSurface::adsorption_bond_count
//! [`desorption_bond_count`]: SosSurface::desorption_bond_count
//! [`migration_targets`]: SosSurface::migration_targets

use rand::Rng;

use epitaxy_types::Site;

use crate::error::LatticeError;

/// Number of von Neumann neighbors of every site on the torus.
pub const NEIGHBOR_COUNT: usize = 4;

/// A Solid-On-Solid surface: a periodic field of integer column heights.
///
/// Heights are unsigned, so the "never negative" invariant is carried by
/// the type itself; [`decrease`](Self::decrease) refuses to underflow
/// rather than clamping after the fact. The surface is cheap to clone,
/// which is how the run loop captures independent snapshots.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SosSurface {
    /// Length of the first lattice axis.
    lx: usize,
    /// Length of the second lattice axis.
    ly: usize,
    /// Column heights in row-major order (`x` outer, `y` inner).
    heights: Vec<u32>,
}

impl SosSurface {
    /// Create a flat surface (all heights zero) of the given dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::EmptyAxis`] if either axis is zero, or
    /// [`LatticeError::DimensionOverflow`] if `lx * ly` does not fit in
    /// `usize`.
    pub fn new(lx: usize, ly: usize) -> Result<Self, LatticeError> {
        if lx == 0 {
            return Err(LatticeError::EmptyAxis { axis: "x" });
        }
        if ly == 0 {
            return Err(LatticeError::EmptyAxis { axis: "y" });
        }
        let len = lx
            .checked_mul(ly)
            .ok_or(LatticeError::DimensionOverflow { lx, ly })?;
        Ok(Self {
            lx,
            ly,
            heights: vec![0; len],
        })
    }

    /// Return the lattice dimensions `(lx, ly)`.
    pub const fn dimensions(&self) -> (usize, usize) {
        (self.lx, self.ly)
    }

    /// Total number of sites on the surface.
    pub fn site_count(&self) -> usize {
        self.heights.len()
    }

    // -------------------------------------------------------------------
    // Initialization
    // -------------------------------------------------------------------

    /// Reset every column to height zero.
    pub fn reset_flat(&mut self) {
        self.heights.fill(0);
    }

    /// Randomize every column height uniformly in `0..=max_roughness`.
    ///
    /// A `max_roughness` of 0 is treated as 1, so the call always produces
    /// at least a two-level surface rather than silently degenerating to
    /// a flat one.
    pub fn randomize(&mut self, rng: &mut impl Rng, max_roughness: u32) {
        let top = max_roughness.max(1);
        for h in &mut self.heights {
            *h = rng.random_range(0..=top);
        }
    }

    // -------------------------------------------------------------------
    // Height access and mutation
    // -------------------------------------------------------------------

    /// Current height of the column at `site`.
    ///
    /// Coordinates wrap periodically, so any coordinate pair addresses a
    /// valid column.
    pub fn height(&self, site: Site) -> u32 {
        let idx = self.index(site);
        self.heights.get(idx).copied().unwrap_or(0)
    }

    /// Overwrite the height of the column at `site`.
    ///
    /// Intended for test fixtures and state restoration; the kinetic
    /// engine mutates heights only through [`increase`](Self::increase)
    /// and [`decrease`](Self::decrease).
    pub fn set_height(&mut self, site: Site, height: u32) {
        let idx = self.index(site);
        if let Some(h) = self.heights.get_mut(idx) {
            *h = height;
        }
    }

    /// Add `delta` to the column at `site`.
    ///
    /// `delta` must be positive; debug builds assert on a zero delta,
    /// release builds treat it as a no-op addition.
    pub fn increase(&mut self, site: Site, delta: u32) {
        debug_assert!(delta > 0, "increase called with non-positive delta");
        let idx = self.index(site);
        if let Some(h) = self.heights.get_mut(idx) {
            *h = h.saturating_add(delta);
        }
    }

    /// Subtract `delta` from the column at `site`, only if the column is
    /// tall enough.
    ///
    /// A column shorter than `delta` is left unchanged: the height floor
    /// at zero is enforced by refusing the operation, never by clamping
    /// a negative result.
    pub fn decrease(&mut self, site: Site, delta: u32) {
        debug_assert!(delta > 0, "decrease called with non-positive delta");
        let idx = self.index(site);
        if let Some(h) = self.heights.get_mut(idx) {
            if let Some(lowered) = h.checked_sub(delta) {
                *h = lowered;
            }
        }
    }

    /// Sum of all column heights (total particles on the surface).
    pub fn total_height(&self) -> u64 {
        self.heights
            .iter()
            .fold(0_u64, |acc, &h| acc.saturating_add(u64::from(h)))
    }

    // -------------------------------------------------------------------
    // Topology
    // -------------------------------------------------------------------

    /// The four von Neumann neighbors of `site` under periodic wraparound.
    pub fn neighbors(&self, site: Site) -> [Site; NEIGHBOR_COUNT] {
        let x = site.x.checked_rem(self.lx).unwrap_or(0);
        let y = site.y.checked_rem(self.ly).unwrap_or(0);
        [
            Site::new(wrap_down(x, self.lx), y),
            Site::new(wrap_up(x, self.lx), y),
            Site::new(x, wrap_down(y, self.ly)),
            Site::new(x, wrap_up(y, self.ly)),
        ]
    }

    /// Iterate over every site in stable row-major order.
    ///
    /// The order is total and exhaustive: classification relies on each
    /// site appearing exactly once per pass.
    pub fn sites(&self) -> impl Iterator<Item = Site> + '_ {
        (0..self.lx).flat_map(move |x| (0..self.ly).map(move |y| Site::new(x, y)))
    }

    // -------------------------------------------------------------------
    // Bond counting
    // -------------------------------------------------------------------

    /// Lateral bonds a newly adsorbed particle at `site` would form.
    ///
    /// Counts neighbors whose height is at least `h + 1`, where `h` is the
    /// current column height. Always in `0..=4`.
    pub fn adsorption_bond_count(&self, site: Site) -> usize {
        let level = self.height(site).saturating_add(1);
        self.neighbors_at_or_above(site, level)
    }

    /// Lateral bonds broken by removing the top particle at `site`.
    ///
    /// Zero for an empty column; otherwise the number of neighbors whose
    /// height is at least the current column height. Always in `0..=4`.
    pub fn desorption_bond_count(&self, site: Site) -> usize {
        let h = self.height(site);
        if h == 0 {
            return 0;
        }
        self.neighbors_at_or_above(site, h)
    }

    /// Neighbors the top particle at `site` may migrate to.
    ///
    /// Empty for an empty column. A particle may hop sideways or downhill
    /// only: a neighbor qualifies when its height does not exceed the
    /// source column's height.
    pub fn migration_targets(&self, site: Site) -> Vec<Site> {
        let h = self.height(site);
        if h == 0 {
            return Vec::new();
        }
        self.neighbors(site)
            .into_iter()
            .filter(|&n| self.height(n) <= h)
            .collect()
    }

    /// Count neighbors whose height is at least `level`.
    fn neighbors_at_or_above(&self, site: Site, level: u32) -> usize {
        self.neighbors(site)
            .into_iter()
            .filter(|&n| self.height(n) >= level)
            .count()
    }

    /// Row-major index of a site, with periodic coordinate wrapping.
    fn index(&self, site: Site) -> usize {
        let x = site.x.checked_rem(self.lx).unwrap_or(0);
        let y = site.y.checked_rem(self.ly).unwrap_or(0);
        x.saturating_mul(self.ly).saturating_add(y)
    }
}

/// Wrap `i + 1` back to 0 at the axis boundary.
const fn wrap_up(i: usize, n: usize) -> usize {
    let next = i.wrapping_add(1);
    if next >= n { 0 } else { next }
}

/// Wrap `i - 1` to the far edge at the axis boundary.
const fn wrap_down(i: usize, n: usize) -> usize {
    match i.checked_sub(1) {
        Some(prev) => prev,
        None => n.saturating_sub(1),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    /// Helper: a surface with explicit heights laid out row-major.
    fn surface_with_heights(lx: usize, ly: usize, heights: &[u32]) -> SosSurface {
        let mut surface = SosSurface::new(lx, ly).unwrap();
        for (idx, &h) in heights.iter().enumerate() {
            let x = idx / ly;
            let y = idx % ly;
            surface.set_height(Site::new(x, y), h);
        }
        surface
    }

    #[test]
    fn zero_axis_is_rejected() {
        assert!(SosSurface::new(0, 5).is_err());
        assert!(SosSurface::new(5, 0).is_err());
    }

    #[test]
    fn new_surface_is_flat() {
        let surface = SosSurface::new(4, 6).unwrap();
        assert_eq!(surface.site_count(), 24);
        assert_eq!(surface.total_height(), 0);
        assert!(surface.sites().all(|s| surface.height(s) == 0));
    }

    #[test]
    fn height_floor_decrease_below_zero_is_noop() {
        let mut surface = SosSurface::new(3, 3).unwrap();
        let site = Site::new(1, 1);

        // Empty column: decrease does nothing, never errors.
        surface.decrease(site, 1);
        assert_eq!(surface.height(site), 0);

        // A column of height 2 cannot lose 3.
        surface.set_height(site, 2);
        surface.decrease(site, 3);
        assert_eq!(surface.height(site), 2);

        // But it can lose exactly 2.
        surface.decrease(site, 2);
        assert_eq!(surface.height(site), 0);
    }

    #[test]
    fn increase_and_decrease_round_trip() {
        let mut surface = SosSurface::new(2, 2).unwrap();
        let site = Site::new(0, 1);
        surface.increase(site, 3);
        assert_eq!(surface.height(site), 3);
        surface.decrease(site, 1);
        assert_eq!(surface.height(site), 2);
        assert_eq!(surface.total_height(), 2);
    }

    #[test]
    fn neighbors_wrap_periodically() {
        let surface = SosSurface::new(5, 7).unwrap();

        // Top edge wraps to bottom along y.
        let corner = Site::new(0, 6);
        assert!(surface.neighbors(corner).contains(&Site::new(0, 0)));

        // Right edge wraps to left along x.
        let edge = Site::new(4, 0);
        assert!(surface.neighbors(edge).contains(&Site::new(0, 0)));
    }

    #[test]
    fn every_site_has_four_distinct_neighbors() {
        let surface = SosSurface::new(4, 4).unwrap();
        for site in surface.sites() {
            let neighbors = surface.neighbors(site);
            assert_eq!(neighbors.len(), NEIGHBOR_COUNT);
            for (i, a) in neighbors.iter().enumerate() {
                for b in neighbors.iter().skip(i.saturating_add(1)) {
                    assert_ne!(a, b, "duplicate neighbor of {site}");
                }
            }
        }
    }

    #[test]
    fn isolated_column_has_no_desorption_bonds() {
        // A single column of height 2 surrounded by height-0 neighbors:
        // nothing reaches its top level, so removal breaks no bonds.
        let mut surface = SosSurface::new(5, 5).unwrap();
        surface.set_height(Site::new(2, 2), 2);
        assert_eq!(surface.desorption_bond_count(Site::new(2, 2)), 0);
    }

    #[test]
    fn pit_site_has_four_adsorption_bonds() {
        // A height-0 site walled in by four height-2 neighbors: a particle
        // adsorbing there forms a bond to each wall.
        let mut surface = SosSurface::new(5, 5).unwrap();
        let center = Site::new(2, 2);
        for n in surface.neighbors(center) {
            surface.set_height(n, 2);
        }
        assert_eq!(surface.adsorption_bond_count(center), 4);
    }

    #[test]
    fn flat_surface_bond_counts() {
        let surface = surface_with_heights(3, 3, &[1; 9]);
        for site in surface.sites() {
            // Nothing reaches h+1 on a flat surface.
            assert_eq!(surface.adsorption_bond_count(site), 0);
            // Every neighbor matches the current height.
            assert_eq!(surface.desorption_bond_count(site), 4);
        }
    }

    #[test]
    fn empty_column_has_zero_desorption_bonds_even_when_walled() {
        let mut surface = SosSurface::new(5, 5).unwrap();
        let center = Site::new(2, 2);
        for n in surface.neighbors(center) {
            surface.set_height(n, 3);
        }
        // Height 0 short-circuits regardless of neighbor heights.
        assert_eq!(surface.desorption_bond_count(center), 0);
    }

    #[test]
    fn migration_excludes_uphill_neighbors() {
        // Center of height 2, three neighbors at 1, one at 3: the particle
        // may hop to the three lower columns, never the taller one.
        let mut surface = SosSurface::new(5, 5).unwrap();
        let center = Site::new(2, 2);
        surface.set_height(center, 2);

        let neighbors = surface.neighbors(center);
        let uphill = neighbors[0];
        surface.set_height(uphill, 3);
        for &n in neighbors.iter().skip(1) {
            surface.set_height(n, 1);
        }

        let targets = surface.migration_targets(center);
        assert_eq!(targets.len(), 3);
        assert!(!targets.contains(&uphill));
        for &n in neighbors.iter().skip(1) {
            assert!(targets.contains(&n));
        }
    }

    #[test]
    fn migration_from_empty_column_is_impossible() {
        let surface = SosSurface::new(3, 3).unwrap();
        assert!(surface.migration_targets(Site::new(1, 1)).is_empty());
    }

    #[test]
    fn equal_height_neighbors_are_valid_migration_targets() {
        let surface = surface_with_heights(3, 3, &[1; 9]);
        let targets = surface.migration_targets(Site::new(1, 1));
        assert_eq!(targets.len(), 4);
    }

    #[test]
    fn sites_enumeration_is_total_and_stable() {
        let surface = SosSurface::new(3, 4).unwrap();
        let first: Vec<Site> = surface.sites().collect();
        let second: Vec<Site> = surface.sites().collect();
        assert_eq!(first.len(), 12);
        assert_eq!(first, second);

        // Every coordinate pair appears exactly once.
        for x in 0..3 {
            for y in 0..4 {
                let want = Site::new(x, y);
                assert_eq!(first.iter().filter(|s| **s == want).count(), 1);
            }
        }
    }

    #[test]
    fn randomize_respects_roughness_bound() {
        let mut surface = SosSurface::new(6, 6).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        surface.randomize(&mut rng, 3);
        assert!(surface.sites().all(|s| surface.height(s) <= 3));
        // A 36-site draw over 0..=3 flat at zero is vanishingly unlikely.
        assert!(surface.total_height() > 0);
    }

    #[test]
    fn reset_flat_clears_all_columns() {
        let mut surface = SosSurface::new(4, 4).unwrap();
        let mut rng = SmallRng::seed_from_u64(11);
        surface.randomize(&mut rng, 2);
        surface.reset_flat();
        assert_eq!(surface.total_height(), 0);
    }

    #[test]
    fn cloned_snapshot_is_independent() {
        let mut surface = SosSurface::new(3, 3).unwrap();
        surface.set_height(Site::new(0, 0), 5);
        let snapshot = surface.clone();

        surface.increase(Site::new(0, 0), 1);
        surface.increase(Site::new(2, 2), 4);

        assert_eq!(snapshot.height(Site::new(0, 0)), 5);
        assert_eq!(snapshot.height(Site::new(2, 2)), 0);
    }

    #[test]
    fn surface_round_trips_through_json() {
        let surface = surface_with_heights(2, 2, &[0, 1, 2, 3]);
        let json = serde_json::to_string(&surface).unwrap();
        let back: SosSurface = serde_json::from_str(&json).unwrap();
        assert_eq!(back, surface);
    }
}
