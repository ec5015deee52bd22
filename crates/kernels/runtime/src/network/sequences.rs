//! Per-element time series.

use indexmap::IndexMap;

use hydronet_foundation::{IndexWindow, NodeId};

use super::connections::{Connections, Role};

/// The time series an element's model reads and writes.
///
/// There is one series per `(role, node)` connection, each spanning the
/// network horizon. Reading-role series are filled from nodes before the model
/// runs; writing-role series are filled by the model and read back by nodes.
#[derive(Debug, Clone, Default)]
pub struct Sequences {
    horizon: usize,
    series: IndexMap<(Role, NodeId), Vec<f64>>,
}

impl Sequences {
    pub fn new(horizon: usize) -> Self {
        Self {
            horizon,
            series: IndexMap::new(),
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Match the series table to `connections`, keeping series that are still
    /// connected and zero-filling new ones.
    pub(crate) fn sync(&mut self, connections: &Connections, horizon: usize) {
        let mut synced = IndexMap::with_capacity(connections.len());
        for (role, device) in connections.iter() {
            let Some(node) = device.as_node() else {
                continue;
            };
            let key = (role, node.clone());
            let series = match self.series.swap_remove(&key) {
                Some(series) if series.len() == horizon => series,
                _ => vec![0.0; horizon],
            };
            synced.insert(key, series);
        }
        self.horizon = horizon;
        self.series = synced;
    }

    /// Nodes connected under `role`, sorted by name.
    pub fn nodes(&self, role: Role) -> impl Iterator<Item = &NodeId> {
        self.series
            .keys()
            .filter(move |(r, _)| *r == role)
            .map(|(_, node)| node)
    }

    pub fn count(&self, role: Role) -> usize {
        self.nodes(role).count()
    }

    pub fn series(&self, role: Role, node: &NodeId) -> Option<&[f64]> {
        self.series
            .get(&(role, node.clone()))
            .map(Vec::as_slice)
    }

    pub fn series_mut(&mut self, role: Role, node: &NodeId) -> Option<&mut [f64]> {
        self.series
            .get_mut(&(role, node.clone()))
            .map(Vec::as_mut_slice)
    }

    /// Value of one connection at step `t`.
    pub fn get(&self, role: Role, node: &NodeId, t: usize) -> Option<f64> {
        self.series(role, node).and_then(|s| s.get(t).copied())
    }

    /// Sum over all nodes connected under `role` at step `t`, in name order.
    pub fn sum(&self, role: Role, t: usize) -> f64 {
        self.series
            .iter()
            .filter(|((r, _), _)| *r == role)
            .map(|(_, series)| series[t])
            .sum()
    }

    /// Set one connection's value at step `t`. Returns `false` if the
    /// connection does not exist.
    pub fn set(&mut self, role: Role, node: &NodeId, t: usize, value: f64) -> bool {
        match self.series_mut(role, node).and_then(|s| s.get_mut(t)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Set every connection under `role` to `value` at step `t`.
    pub fn fill(&mut self, role: Role, t: usize, value: f64) {
        for ((r, _), series) in self.series.iter_mut() {
            if *r == role {
                series[t] = value;
            }
        }
    }

    /// Copy `values` into the `window` of one connection.
    pub(crate) fn load(
        &mut self,
        role: Role,
        node: &NodeId,
        window: IndexWindow,
        values: &[f64],
    ) -> bool {
        match self.series_mut(role, node) {
            Some(series) if window.end <= series.len() && values.len() == window.len() => {
                series[window.range()].copy_from_slice(values);
                true
            }
            _ => false,
        }
    }
}
