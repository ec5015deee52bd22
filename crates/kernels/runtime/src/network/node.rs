//! Nodes: measurement and junction points.

use hydronet_foundation::{DeployMode, IndexWindow, NodeId};

use super::connections::Connections;
use crate::error::{Error, Result};

/// A node holding its own simulation series and an external series.
///
/// Both series span the network horizon. Missing external values are `NaN`.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    mode: DeployMode,
    simulated: Vec<f64>,
    observed: Vec<f64>,
    /// Exclusive index up to which `simulated` holds values of the current run.
    computed_until: usize,
    pub(crate) connections: Connections,
}

impl Node {
    /// Create a node with zeroed simulation and missing external values.
    pub fn new(id: impl Into<NodeId>, horizon: usize) -> Self {
        Self {
            id: id.into(),
            mode: DeployMode::default(),
            simulated: vec![0.0; horizon],
            observed: vec![f64::NAN; horizon],
            computed_until: 0,
            connections: Connections::new(),
        }
    }

    pub fn with_mode(mut self, mode: DeployMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder form of [`Node::set_observed`].
    pub fn with_observed(mut self, observed: Vec<f64>) -> Result<Self> {
        self.set_observed(observed)?;
        Ok(self)
    }

    /// Builder form of [`Node::set_simulated`].
    pub fn with_simulated(mut self, simulated: Vec<f64>) -> Result<Self> {
        self.set_simulated(simulated)?;
        Ok(self)
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn mode(&self) -> DeployMode {
        self.mode
    }

    pub(crate) fn set_mode(&mut self, mode: DeployMode) {
        self.mode = mode;
    }

    pub fn horizon(&self) -> usize {
        self.simulated.len()
    }

    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    pub fn simulated(&self) -> &[f64] {
        &self.simulated
    }

    pub fn observed(&self) -> &[f64] {
        &self.observed
    }

    pub fn set_observed(&mut self, observed: Vec<f64>) -> Result<()> {
        self.check_len(observed.len())?;
        self.observed = observed;
        Ok(())
    }

    pub fn set_simulated(&mut self, simulated: Vec<f64>) -> Result<()> {
        self.check_len(simulated.len())?;
        self.simulated = simulated;
        Ok(())
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.simulated.len() {
            return Err(Error::Aggregation {
                node: self.id.clone(),
                message: format!(
                    "series has {len} values, horizon is {}",
                    self.simulated.len()
                ),
            });
        }
        Ok(())
    }

    /// Value forwarded to inlet and input readers at step `t`.
    pub fn deployed(&self, t: usize) -> f64 {
        match self.mode {
            DeployMode::Fresh | DeployMode::Carried => self.simulated[t],
            DeployMode::Observed => self.observed[t],
            DeployMode::ObservedElseFresh | DeployMode::ObservedElseCarried => {
                let observed = self.observed[t];
                if observed.is_nan() {
                    self.simulated[t]
                } else {
                    observed
                }
            }
        }
    }

    /// Value seen by receiver readers at step `t`.
    ///
    /// Fresh-forwarding nodes hand out the most recent simulated value
    /// available at the time of reading. Within a run that is `t` itself once
    /// the node has been aggregated for `t`, and the last aggregated step
    /// before that.
    pub fn receiver_value(&self, t: usize) -> f64 {
        match self.mode {
            DeployMode::Fresh => self.latest_simulated(t),
            DeployMode::ObservedElseFresh => {
                let observed = self.observed[t];
                if observed.is_nan() {
                    self.latest_simulated(t)
                } else {
                    observed
                }
            }
            _ => self.deployed(t),
        }
    }

    fn latest_simulated(&self, t: usize) -> f64 {
        if t < self.computed_until {
            self.simulated[t]
        } else if let Some(previous) = self.computed_until.checked_sub(1) {
            self.simulated[previous]
        } else {
            0.0
        }
    }

    pub fn deployed_window(&self, window: IndexWindow) -> Vec<f64> {
        window.range().map(|t| self.deployed(t)).collect()
    }

    pub fn receiver_window(&self, window: IndexWindow) -> Vec<f64> {
        window.range().map(|t| self.receiver_value(t)).collect()
    }

    /// Whether the node holds this run's values for every step of `window`.
    pub fn is_computed(&self, window: IndexWindow) -> bool {
        window.end <= self.computed_until
    }

    pub(crate) fn begin_run(&mut self, window: IndexWindow) {
        self.computed_until = window.start;
    }

    /// Store the aggregated upstream contributions for `window`.
    ///
    /// Carried modes keep their simulation series untouched.
    pub(crate) fn store_aggregate(&mut self, window: IndexWindow, totals: &[f64]) -> Result<()> {
        if totals.len() != window.len() || !window.fits(self.simulated.len()) {
            return Err(Error::Aggregation {
                node: self.id.clone(),
                message: format!(
                    "{} values for window {}..{} of horizon {}",
                    totals.len(),
                    window.start,
                    window.end,
                    self.simulated.len()
                ),
            });
        }
        if self.mode.refreshes_simulation() {
            self.simulated[window.range()].copy_from_slice(totals);
        }
        self.computed_until = window.end;
        Ok(())
    }
}
