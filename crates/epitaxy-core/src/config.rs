//! Rate parameters for the kinetic model, with a YAML loader.
//!
//! [`KmcParams`] is a passive, read-only record: the engine never mutates
//! it, and constructing physically sensible values is the caller's
//! responsibility. Energies are expressed pre-divided by the thermal
//! energy `kT`, so the rate functions exponentiate them directly.
//!
//! A typical parameter file:
//!
//! ```yaml
//! temperature: 300.0
//! attempt_prefactor: 1.0e12
//! incorporation_prefactor: 1.0e2
//! bond_energy: 2.0
//! chemical_potential: 5.0
//! supersaturation_sensitivity: 0.0
//! reservoir_volume: 1.0
//! equilibrium_concentration: 1.0e5
//! # supersaturation_floor and supersaturation_ceiling default to -5 / 8
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors that can occur when loading rate parameters.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the parameter file from disk.
    #[error("failed to read params file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse params YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Rate parameters for the four kinetic event categories.
///
/// Immutable for the lifetime of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KmcParams {
    /// Temperature in Kelvin. Informational only: all energy fields are
    /// already scaled by `kT`.
    pub temperature: f64,

    /// Attempt-frequency prefactor shared by adsorption, desorption, and
    /// migration.
    pub attempt_prefactor: f64,

    /// Attempt-frequency prefactor for incorporation.
    pub incorporation_prefactor: f64,

    /// Energy per lateral bond, divided by `kT`.
    pub bond_energy: f64,

    /// Reference chemical-potential term, divided by `kT`.
    pub chemical_potential: f64,

    /// Sensitivity of the adsorption rate to the bond-count correction
    /// term `class * sensitivity / supersaturation`.
    pub supersaturation_sensitivity: f64,

    /// Reservoir volume used to turn the bulk particle count into a
    /// concentration.
    pub reservoir_volume: f64,

    /// Equilibrium concentration the reservoir concentration is compared
    /// against.
    pub equilibrium_concentration: f64,

    /// Lower clamp for the supersaturation signal.
    #[serde(default = "default_supersaturation_floor")]
    pub supersaturation_floor: f64,

    /// Upper clamp for the supersaturation signal.
    #[serde(default = "default_supersaturation_ceiling")]
    pub supersaturation_ceiling: f64,
}

/// Default lower supersaturation clamp.
const fn default_supersaturation_floor() -> f64 {
    -5.0
}

/// Default upper supersaturation clamp.
const fn default_supersaturation_ceiling() -> f64 {
    8.0
}

impl Default for KmcParams {
    fn default() -> Self {
        Self {
            temperature: 300.0,
            attempt_prefactor: 1.0e12,
            incorporation_prefactor: 1.0e2,
            bond_energy: 2.0,
            chemical_potential: 5.0,
            supersaturation_sensitivity: 0.0,
            reservoir_volume: 1.0,
            equilibrium_concentration: 1.0e5,
            supersaturation_floor: default_supersaturation_floor(),
            supersaturation_ceiling: default_supersaturation_ceiling(),
        }
    }
}

impl KmcParams {
    /// Load parameters from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yml::from_str(&contents)?)
    }

    /// Parse parameters from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }
}
