//! Solid-On-Solid height field and bond geometry for the Epitaxy simulator.
//!
//! This crate models the growing crystal surface: a two-dimensional field
//! of integer column heights on a toroidal lattice with von Neumann
//! (4-neighbor) connectivity. It owns the geometric primitives every rate
//! computation depends on: neighbor lookups under periodic wraparound,
//! lateral bond counting for adsorption and desorption, and the legality
//! rule for downhill particle migration.
//!
//! # Modules
//!
//! - [`error`] -- Error types for surface construction.
//! - [`surface`] -- [`SosSurface`], the height field with its bond-counting
//!   queries and height mutations.
//!
//! [`SosSurface`]: surface::SosSurface

pub mod error;
pub mod surface;

// Re-export primary types at crate root.
pub use error::LatticeError;
pub use surface::{NEIGHBOR_COUNT, SosSurface};
