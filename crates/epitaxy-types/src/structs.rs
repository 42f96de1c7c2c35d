//! Event bookkeeping records produced by the kinetic Monte Carlo engine.

use serde::{Deserialize, Serialize};

use crate::enums::EventKind;
use crate::site::Site;

/// One executed event in the simulation's time-ordered history.
///
/// Records are immutable once appended. The `time` field is the simulation
/// clock *after* the event's waiting time was added, so history times are
/// monotonically non-decreasing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Simulation time at which the event fired.
    pub time: f64,
    /// The event category.
    pub kind: EventKind,
    /// The lattice site the event acted on.
    pub site: Site,
}

/// Per-category totals of executed events.
///
/// Maintained alongside the event history; the sum of all four counters
/// always equals the history length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    /// Executed adsorption events.
    pub adsorption: u64,
    /// Executed desorption events.
    pub desorption: u64,
    /// Executed migration events.
    pub migration: u64,
    /// Executed incorporation events.
    pub incorporation: u64,
}

impl EventCounts {
    /// Increment the counter for one category.
    pub const fn record(&mut self, kind: EventKind) {
        match kind {
            EventKind::Adsorption => {
                self.adsorption = self.adsorption.saturating_add(1);
            }
            EventKind::Desorption => {
                self.desorption = self.desorption.saturating_add(1);
            }
            EventKind::Migration => {
                self.migration = self.migration.saturating_add(1);
            }
            EventKind::Incorporation => {
                self.incorporation = self.incorporation.saturating_add(1);
            }
        }
    }

    /// Return the counter for one category.
    pub const fn count(&self, kind: EventKind) -> u64 {
        match kind {
            EventKind::Adsorption => self.adsorption,
            EventKind::Desorption => self.desorption,
            EventKind::Migration => self.migration,
            EventKind::Incorporation => self.incorporation,
        }
    }

    /// Total events across all categories.
    pub const fn total(&self) -> u64 {
        self.adsorption
            .saturating_add(self.desorption)
            .saturating_add(self.migration)
            .saturating_add(self.incorporation)
    }
}
