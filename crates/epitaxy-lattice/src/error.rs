//! Error types for the `epitaxy-lattice` crate.
//!
//! All fallible operations in this crate return [`LatticeError`] through
//! the standard [`Result`] type alias.

/// Errors that can occur when constructing a surface.
#[derive(Debug, thiserror::Error)]
pub enum LatticeError {
    /// A lattice axis has zero length.
    #[error("lattice axis {axis} must have at least one column")]
    EmptyAxis {
        /// The offending axis name (`"x"` or `"y"`).
        axis: &'static str,
    },

    /// The product of the axis lengths does not fit in memory addressing.
    #[error("lattice dimensions {lx} x {ly} overflow the addressable size")]
    DimensionOverflow {
        /// Requested length of the first axis.
        lx: usize,
        /// Requested length of the second axis.
        ly: usize,
    },
}
