//! Lattice coordinates for the Solid-On-Solid surface.

use serde::{Deserialize, Serialize};

/// A column coordinate on the two-dimensional growth surface.
///
/// Coordinates address columns, not particles: each site names one integer
/// height in the surface's height field. The surface applies periodic
/// wraparound, so any coordinate pair is a valid address.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Site {
    /// Column index along the first lattice axis.
    pub x: usize,
    /// Column index along the second lattice axis.
    pub y: usize,
}

impl Site {
    /// Create a site from its axis indices.
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_display_shows_both_axes() {
        let site = Site::new(3, 7);
        assert_eq!(format!("{site}"), "(3, 7)");
    }

    #[test]
    fn site_ordering_is_row_major() {
        // Ordering derives lexicographically on (x, y), matching the
        // surface's row-major enumeration order.
        assert!(Site::new(0, 5) < Site::new(1, 0));
        assert!(Site::new(2, 1) < Site::new(2, 2));
    }
}
