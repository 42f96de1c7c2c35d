//! Enumeration types for the Epitaxy simulator.

use serde::{Deserialize, Serialize};

/// The four kinetic event categories of the growth model.
///
/// Every executed Monte Carlo event belongs to exactly one category. The
/// declaration order here is also the fixed tie-break order used by the
/// engine's cumulative category sampling, so it must not be rearranged.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A reservoir particle attaches to the top of a column.
    Adsorption,
    /// The top particle of a column detaches back into the reservoir.
    Desorption,
    /// The top particle of a column hops to a neighboring column of equal
    /// or lower height.
    Migration,
    /// A surface particle converts irreversibly into the bulk crystal
    /// phase. Bookkept as a counter only; column heights are untouched.
    Incorporation,
}

impl EventKind {
    /// All categories in the engine's fixed sampling order.
    pub const ALL: [Self; 4] = [
        Self::Adsorption,
        Self::Desorption,
        Self::Migration,
        Self::Incorporation,
    ];

    /// Lowercase label used in logs and serialized records.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Adsorption => "adsorption",
            Self::Desorption => "desorption",
            Self::Migration => "migration",
            Self::Incorporation => "incorporation",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
