//! Network graph construction.

use std::collections::{BTreeSet, VecDeque};

use indexmap::IndexSet;
use tracing::debug;

use hydronet_foundation::{DeployMode, Device};

use crate::error::{Error, Result};
use crate::network::{Network, Role};

/// One directed edge, seen from the vertex that stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Edge {
    /// Index of the vertex on the other end.
    pub vertex: usize,
    /// The element-side role of the connection.
    pub role: Role,
}

/// Immutable directed graph over all devices of a network.
///
/// Vertices are sorted by device order (name, then kind), so vertex indices
/// and iteration follow the same deterministic order. The deploy mode of every
/// node is captured at build time; a graph is rebuilt whenever the network's
/// revision changes.
#[derive(Debug, Clone)]
pub struct NetworkGraph {
    vertices: IndexSet<Device>,
    modes: Vec<Option<DeployMode>>,
    successors: Vec<Vec<Edge>>,
    predecessors: Vec<Vec<Edge>>,
    revision: u64,
}

impl NetworkGraph {
    /// Build the graph for `network`.
    ///
    /// Fails with [`Error::UnknownDevice`] if a connection refers to a device
    /// that is not part of the network.
    pub fn build(network: &Network) -> Result<Self> {
        let mut devices: Vec<Device> = network
            .node_ids()
            .cloned()
            .map(Device::Node)
            .chain(network.element_ids().cloned().map(Device::Element))
            .collect();
        devices.sort();
        let vertices: IndexSet<Device> = devices.into_iter().collect();

        let mut modes = vec![None; vertices.len()];
        let mut successors = vec![Vec::new(); vertices.len()];
        let mut predecessors = vec![Vec::new(); vertices.len()];

        for (id, cell) in network.nodes() {
            let node = cell.read();
            let referrer = Device::Node(id.clone());
            let idx = index(&vertices, &referrer)?;
            modes[idx] = Some(node.mode());
            for (_, device) in node.connections().iter() {
                if !vertices.contains(device) {
                    return Err(Error::UnknownDevice {
                        referrer,
                        missing: device.clone(),
                    });
                }
            }
        }

        let mut edge_count = 0;
        for (id, cell) in network.elements() {
            let element = cell.lock();
            let referrer = Device::Element(id.clone());
            let element_idx = index(&vertices, &referrer)?;
            for (role, device) in element.connections().iter() {
                let Some(node_idx) = vertices.get_index_of(device) else {
                    return Err(Error::UnknownDevice {
                        referrer,
                        missing: device.clone(),
                    });
                };
                let (from, to) = if role.writes_node() {
                    (element_idx, node_idx)
                } else {
                    (node_idx, element_idx)
                };
                successors[from].push(Edge { vertex: to, role });
                predecessors[to].push(Edge { vertex: from, role });
                edge_count += 1;
            }
        }
        for edges in successors.iter_mut().chain(predecessors.iter_mut()) {
            edges.sort();
        }

        debug!(
            vertices = vertices.len(),
            edges = edge_count,
            revision = network.revision(),
            "network graph built"
        );

        Ok(Self {
            vertices,
            modes,
            successors,
            predecessors,
            revision: network.revision(),
        })
    }

    /// Network revision this graph was built from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.vertices.iter()
    }

    pub fn elements(&self) -> impl Iterator<Item = &Device> {
        self.vertices.iter().filter(|d| d.is_element())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Device> {
        self.vertices.iter().filter(|d| d.is_node())
    }

    pub fn contains(&self, device: &Device) -> bool {
        self.vertices.contains(device)
    }

    pub fn index_of(&self, device: &Device) -> Option<usize> {
        self.vertices.get_index_of(device)
    }

    /// Device at vertex `idx`. Panics if out of range.
    pub fn device(&self, idx: usize) -> &Device {
        &self.vertices[idx]
    }

    /// Deploy mode of a node at build time; `None` for elements.
    pub fn deploy_mode(&self, device: &Device) -> Option<DeployMode> {
        self.index_of(device).and_then(|idx| self.modes[idx])
    }

    /// Whether readers of vertex `idx` must wait for it within a step.
    ///
    /// Elements always hand out freshly computed values; nodes do so when
    /// their deploy mode forwards fresh values.
    pub fn forwards_fresh(&self, idx: usize) -> bool {
        self.modes[idx].is_none_or(DeployMode::forwards_fresh)
    }

    pub(crate) fn successor_edges(&self, idx: usize) -> &[Edge] {
        &self.successors[idx]
    }

    pub(crate) fn predecessor_edges(&self, idx: usize) -> &[Edge] {
        &self.predecessors[idx]
    }

    /// Devices fed directly by `device`, with the connecting role.
    pub fn successors(&self, device: &Device) -> impl Iterator<Item = (&Device, Role)> {
        self.index_of(device)
            .into_iter()
            .flat_map(move |idx| self.successors[idx].iter())
            .map(move |edge| (self.device(edge.vertex), edge.role))
    }

    /// Devices feeding `device` directly, with the connecting role.
    pub fn predecessors(&self, device: &Device) -> impl Iterator<Item = (&Device, Role)> {
        self.index_of(device)
            .into_iter()
            .flat_map(move |idx| self.predecessors[idx].iter())
            .map(move |edge| (self.device(edge.vertex), edge.role))
    }

    /// Every device that transitively needs `device`'s output.
    pub fn descendants(&self, device: &Device) -> BTreeSet<Device> {
        self.collect(device, true)
    }

    /// Every device whose output `device` transitively needs.
    pub fn ancestors(&self, device: &Device) -> BTreeSet<Device> {
        self.collect(device, false)
    }

    fn collect(&self, device: &Device, downstream: bool) -> BTreeSet<Device> {
        match self.index_of(device) {
            Some(idx) => self
                .reach(idx, downstream)
                .into_iter()
                .map(|v| self.device(v).clone())
                .collect(),
            None => BTreeSet::new(),
        }
    }

    /// Number of descendants of vertex `idx`.
    pub fn descendant_count(&self, idx: usize) -> usize {
        self.reach(idx, true).len()
    }

    /// Vertices reachable from `start` (excluding `start` itself).
    pub(crate) fn reach(&self, start: usize, downstream: bool) -> BTreeSet<usize> {
        let adjacency = if downstream {
            &self.successors
        } else {
            &self.predecessors
        };
        let mut seen = BTreeSet::new();
        let mut frontier = VecDeque::from([start]);
        while let Some(v) = frontier.pop_front() {
            for edge in &adjacency[v] {
                if edge.vertex != start && seen.insert(edge.vertex) {
                    frontier.push_back(edge.vertex);
                }
            }
        }
        seen
    }
}

fn index(vertices: &IndexSet<Device>, device: &Device) -> Result<usize> {
    vertices
        .get_index_of(device)
        .ok_or_else(|| Error::NotFound(device.clone()))
}
