//! Node deploy modes.
//!
//! A deploy mode decides which value a node hands to the elements reading from
//! it: the value simulated during the current run, an externally supplied
//! (observed) value, or the simulation result that was already available
//! before the run started.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which series a node forwards downstream.
///
/// The mode is fixed before a run and never changes while one is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployMode {
    /// Forward the value simulated during this run.
    #[default]
    Fresh,
    /// Forward the external series; the simulation is still recorded.
    Observed,
    /// Forward the external series, falling back to this run's simulation
    /// where the external value is missing.
    ObservedElseFresh,
    /// Forward the simulation series available before the run and leave it
    /// untouched.
    Carried,
    /// Forward the external series, falling back to the carried simulation
    /// where the external value is missing.
    ObservedElseCarried,
}

impl DeployMode {
    /// All modes, in declaration order.
    pub const ALL: [DeployMode; 5] = [
        DeployMode::Fresh,
        DeployMode::Observed,
        DeployMode::ObservedElseFresh,
        DeployMode::Carried,
        DeployMode::ObservedElseCarried,
    ];

    /// Whether downstream readers may receive a value simulated in the same
    /// step. Such nodes impose an ordering requirement on their readers.
    pub fn forwards_fresh(self) -> bool {
        matches!(self, DeployMode::Fresh | DeployMode::ObservedElseFresh)
    }

    /// Whether aggregation rewrites the node's own simulation series.
    pub fn refreshes_simulation(self) -> bool {
        !matches!(
            self,
            DeployMode::Carried | DeployMode::ObservedElseCarried
        )
    }

    /// Whether the external series takes precedence where it is present.
    pub fn prefers_observed(self) -> bool {
        matches!(
            self,
            DeployMode::Observed | DeployMode::ObservedElseFresh | DeployMode::ObservedElseCarried
        )
    }

    /// Whether a missing external value falls back to the simulation series.
    pub fn falls_back(self) -> bool {
        matches!(
            self,
            DeployMode::ObservedElseFresh | DeployMode::ObservedElseCarried
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeployMode::Fresh => "fresh",
            DeployMode::Observed => "observed",
            DeployMode::ObservedElseFresh => "observed_else_fresh",
            DeployMode::Carried => "carried",
            DeployMode::ObservedElseCarried => "observed_else_carried",
        }
    }
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown deploy mode name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDeployMode(pub String);

impl fmt::Display for UnknownDeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown deploy mode: {}", self.0)
    }
}

impl std::error::Error for UnknownDeployMode {}

impl FromStr for DeployMode {
    type Err = UnknownDeployMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeployMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| UnknownDeployMode(s.to_string()))
    }
}
