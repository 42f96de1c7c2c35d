//! Bounded run loop with guaranteed snapshot delivery.
//!
//! [`run_to_horizon`] drives single engine steps until the clock reaches
//! the caller's time horizon, the event budget is exhausted, or a step
//! reports no progress. Requested snapshot times are sorted once; after
//! every successful step, all requested times the clock has passed are
//! flushed into independent surface copies.
//!
//! The central contract: **every requested snapshot time receives exactly
//! one entry, never fewer**. Whatever ends the run early -- a spent
//! reservoir, the event budget, an engine fault, an integrity anomaly --
//! the outstanding requested times are filled with the final known state,
//! and everything accumulated so far is returned rather than discarded.
//! Partial results from a long stochastic run are valuable.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use epitaxy_lattice::SosSurface;

use crate::engine::{KmcEngine, StepOutcome};
use crate::validate::{self, IntegrityResult};

/// Default ceiling on executed events per run.
pub const DEFAULT_MAX_EVENTS: u32 = 2_000_000;

/// Stopping conditions and snapshot schedule for one run.
#[derive(Debug, Clone)]
pub struct RunBounds {
    /// Simulation time at which the run completes normally.
    pub time_horizon: f64,
    /// Times at which to capture surface snapshots; order is irrelevant,
    /// the scheduler sorts them once.
    pub snapshot_times: Vec<f64>,
    /// Hard ceiling on executed events.
    pub max_events: u32,
    /// Run the read-only integrity checks after every step. Costs a full
    /// extra classification pass per step; off in production runs.
    pub verify_integrity: bool,
}

impl RunBounds {
    /// Bounds that run to the given horizon with no snapshots, the
    /// default event budget, and integrity checking off.
    pub const fn to_time(time_horizon: f64) -> Self {
        Self {
            time_horizon,
            snapshot_times: Vec::new(),
            max_events: DEFAULT_MAX_EVENTS,
            verify_integrity: false,
        }
    }
}

/// An independent copy of the surface at one requested time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The nominal requested time (not the clock value at capture).
    pub requested_time: f64,
    /// Full copy of the height field; later engine mutation cannot
    /// touch it.
    pub surface: SosSurface,
    /// Conversion percentage at capture.
    pub conversion_percent: f64,
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEndReason {
    /// The clock reached the time horizon.
    HorizonReached,
    /// The event budget was exhausted first.
    EventBudgetExhausted,
    /// A step reported no progress: the event distribution ran dry.
    NoProgress,
    /// A step fault or integrity anomaly stopped the run; accumulated
    /// results were preserved.
    Fault {
        /// Description of the fault.
        message: String,
    },
}

/// The result of a bounded run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// One snapshot per requested time, in ascending requested-time
    /// order -- always complete, regardless of how the run ended.
    pub snapshots: Vec<Snapshot>,
    /// Why the run stopped.
    pub end_reason: RunEndReason,
    /// Number of successfully executed events.
    pub events_executed: u32,
}

/// Drive the engine until the horizon, the event budget, or a halt.
///
/// Snapshot times are flushed after each successful step; on any early
/// termination the outstanding times are filled with the final known
/// state, so the returned list always matches the request in count.
pub fn run_to_horizon(engine: &mut KmcEngine, bounds: &RunBounds) -> RunOutcome {
    let mut times = bounds.snapshot_times.clone();
    times.sort_by(f64::total_cmp);

    let mut snapshots: Vec<Snapshot> = Vec::with_capacity(times.len());
    let mut next_snap: usize = 0;
    let mut events: u32 = 0;

    info!(
        time_horizon = bounds.time_horizon,
        max_events = bounds.max_events,
        snapshot_count = times.len(),
        "run starting"
    );

    let end_reason = loop {
        if engine.time() >= bounds.time_horizon {
            break RunEndReason::HorizonReached;
        }
        if events >= bounds.max_events {
            break RunEndReason::EventBudgetExhausted;
        }

        match engine.step() {
            Ok(StepOutcome::Advanced) => {
                events = events.saturating_add(1);

                // Flush every requested time the clock has passed.
                while let Some(&requested) = times.get(next_snap) {
                    if engine.time() < requested {
                        break;
                    }
                    debug!(requested, time = engine.time(), "snapshot captured");
                    snapshots.push(capture(engine, requested));
                    next_snap = next_snap.saturating_add(1);
                }

                if bounds.verify_integrity {
                    if let IntegrityResult::Anomaly(anomaly) = validate::verify_engine(engine)
                    {
                        warn!(%anomaly, "integrity anomaly; halting run");
                        break RunEndReason::Fault {
                            message: anomaly.to_string(),
                        };
                    }
                }
            }
            Ok(StepOutcome::NoProgress) => break RunEndReason::NoProgress,
            Err(error) => {
                warn!(error = %error, "step fault; preserving partial results");
                break RunEndReason::Fault {
                    message: error.to_string(),
                };
            }
        }
    };

    // Fill outstanding requests with the final known state: one entry per
    // requested time, always.
    while let Some(&requested) = times.get(next_snap) {
        snapshots.push(capture(engine, requested));
        next_snap = next_snap.saturating_add(1);
    }

    info!(
        end_reason = ?end_reason,
        events,
        time = engine.time(),
        "run finished"
    );

    RunOutcome {
        snapshots,
        end_reason,
        events_executed: events,
    }
}

/// Capture an independent snapshot of the current state.
fn capture(engine: &KmcEngine, requested_time: f64) -> Snapshot {
    Snapshot {
        requested_time,
        surface: engine.surface().clone(),
        conversion_percent: engine.conversion_percent(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use crate::config::KmcParams;
    use crate::engine::EngineOptions;

    use super::*;

    fn seeded_engine(bulk: u32, params: KmcParams) -> KmcEngine {
        let surface = SosSurface::new(5, 5).unwrap();
        let options = EngineOptions {
            rng_seed: Some(42),
            ..EngineOptions::default()
        };
        KmcEngine::new(surface, params, bulk, options)
    }

    /// Params whose rates are all zero, so the first step reports no
    /// progress.
    fn dead_params() -> KmcParams {
        KmcParams {
            attempt_prefactor: 0.0,
            incorporation_prefactor: 0.0,
            ..KmcParams::default()
        }
    }

    #[test]
    fn early_halt_still_fills_every_requested_snapshot() {
        let mut engine = seeded_engine(500, dead_params());
        let bounds = RunBounds {
            time_horizon: 10.0,
            snapshot_times: vec![0.5, 1.0, 2.0],
            max_events: DEFAULT_MAX_EVENTS,
            verify_integrity: false,
        };

        let outcome = run_to_horizon(&mut engine, &bounds);

        assert_eq!(outcome.end_reason, RunEndReason::NoProgress);
        assert_eq!(outcome.events_executed, 0);
        assert_eq!(outcome.snapshots.len(), 3);
        for (snapshot, requested) in outcome.snapshots.iter().zip([0.5, 1.0, 2.0]) {
            assert_eq!(snapshot.requested_time, requested);
            // Final known state: the untouched flat surface.
            assert_eq!(snapshot.surface.total_height(), 0);
            assert_eq!(snapshot.conversion_percent, 0.0);
        }
    }

    #[test]
    fn unsorted_requests_come_back_in_ascending_order() {
        let mut engine = seeded_engine(500, dead_params());
        let bounds = RunBounds {
            time_horizon: 1.0,
            snapshot_times: vec![2.0, 0.1, 1.0],
            max_events: DEFAULT_MAX_EVENTS,
            verify_integrity: false,
        };

        let outcome = run_to_horizon(&mut engine, &bounds);
        let requested: Vec<f64> = outcome
            .snapshots
            .iter()
            .map(|s| s.requested_time)
            .collect();
        assert_eq!(requested, vec![0.1, 1.0, 2.0]);
    }

    #[test]
    fn event_budget_stops_the_run() {
        let mut engine = seeded_engine(1000, KmcParams::default());
        let bounds = RunBounds {
            time_horizon: 1.0,
            snapshot_times: Vec::new(),
            max_events: 5,
            verify_integrity: false,
        };

        let outcome = run_to_horizon(&mut engine, &bounds);

        assert_eq!(outcome.end_reason, RunEndReason::EventBudgetExhausted);
        assert_eq!(outcome.events_executed, 5);
        assert_eq!(engine.history().len(), 5);
    }

    #[test]
    fn horizon_terminates_a_live_run() {
        // Default rates are enormous, so the waiting times are tiny; a
        // nanosecond-scale horizon is reached within the event budget.
        let mut engine = seeded_engine(1000, KmcParams::default());
        let bounds = RunBounds {
            time_horizon: 1.0e-10,
            snapshot_times: vec![5.0e-11],
            max_events: DEFAULT_MAX_EVENTS,
            verify_integrity: false,
        };

        let outcome = run_to_horizon(&mut engine, &bounds);

        assert_eq!(outcome.end_reason, RunEndReason::HorizonReached);
        assert!(outcome.events_executed > 0);
        assert!(engine.time() >= 1.0e-10);
        assert_eq!(outcome.snapshots.len(), 1);
    }

    #[test]
    fn snapshots_are_independent_of_later_mutation() {
        let mut engine = seeded_engine(1000, KmcParams::default());
        let bounds = RunBounds {
            time_horizon: 1.0e-10,
            snapshot_times: vec![0.0],
            max_events: DEFAULT_MAX_EVENTS,
            verify_integrity: false,
        };

        let outcome = run_to_horizon(&mut engine, &bounds);
        let captured = outcome.snapshots[0].surface.clone();

        // Keep stepping after the run; the snapshot must not change.
        let _ = run_to_horizon(&mut engine, &RunBounds::to_time(2.0e-10));
        assert_eq!(outcome.snapshots[0].surface, captured);
    }

    #[test]
    fn integrity_checked_run_completes_cleanly() {
        let mut engine = seeded_engine(500, KmcParams::default());
        let bounds = RunBounds {
            time_horizon: 5.0e-11,
            snapshot_times: Vec::new(),
            max_events: 1000,
            verify_integrity: true,
        };

        let outcome = run_to_horizon(&mut engine, &bounds);
        assert!(!matches!(outcome.end_reason, RunEndReason::Fault { .. }));
    }

    #[test]
    fn default_bounds_carry_the_standard_budget() {
        let bounds = RunBounds::to_time(1.0);
        assert_eq!(bounds.max_events, 2_000_000);
        assert!(bounds.snapshot_times.is_empty());
        assert!(!bounds.verify_integrity);
    }
}
