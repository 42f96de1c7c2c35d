//! Rate model, site classifier, and BKL event engine for the Epitaxy
//! crystal-growth simulator.
//!
//! This crate owns the rejection-free kinetic Monte Carlo scheme that
//! drives the simulation: every step it reclassifies the whole surface
//! into bond-count bins, aggregates per-category rates, draws an
//! exponentially distributed waiting time, selects one event by exact
//! weighted sampling, and applies it to the surface and the finite
//! particle reservoir.
//!
//! # Modules
//!
//! - [`classify`] -- Per-category binning of surface sites by bond count.
//! - [`config`] -- [`KmcParams`] rate parameters with a YAML loader.
//! - [`engine`] -- [`KmcEngine`], the BKL event-selection and
//!   time-stepping engine.
//! - [`numeric`] -- Saturating exponential and finiteness guards.
//! - [`rates`] -- Pure attempt-rate functions per event category.
//! - [`runner`] -- Bounded run loop with guaranteed snapshot delivery.
//! - [`validate`] -- Optional read-only integrity checks.
//!
//! [`KmcParams`]: config::KmcParams
//! [`KmcEngine`]: engine::KmcEngine

pub mod classify;
pub mod config;
pub mod engine;
pub mod numeric;
pub mod rates;
pub mod runner;
pub mod validate;

// Re-export primary types at crate root.
pub use classify::{BOND_CLASSES, MIGRATION_CLASSES, SurfaceBins};
pub use config::{ConfigError, KmcParams};
pub use engine::{EngineError, EngineOptions, KmcEngine, StepOutcome};
pub use runner::{RunBounds, RunEndReason, RunOutcome, Snapshot, run_to_horizon};
pub use validate::{IntegrityAnomaly, IntegrityResult};
