//! Network assembly.
//!
//! A [`Network`] is the central table owning every [`Node`] and [`Element`].
//! Devices refer to one another only by identifier through their
//! [`Connections`], so there are no ownership cycles.
//!
//! # Mutation Model
//!
//! Assembly methods take `&mut self`; a run only ever sees `&Network`. During
//! a run the only mutable state is each device's own series, reached through
//! per-device locks that are never contended because the scheduler hands each
//! device to exactly one worker at a time.
//!
//! Every change that can affect scheduling (connections, membership, deploy
//! modes) bumps [`Network::revision`], which is how execution plans notice
//! they are stale.

mod connections;
mod element;
mod node;
mod sequences;

use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use tracing::debug;

use hydronet_foundation::{DeployMode, Device, ElementId, IndexWindow, NodeId};

use crate::error::{Error, Result};

pub use connections::{Connections, Role};
pub use element::{Element, Model};
pub use node::Node;
pub use sequences::Sequences;

/// All devices of a simulated network plus the shared horizon length.
#[derive(Debug)]
pub struct Network {
    horizon: usize,
    nodes: IndexMap<NodeId, RwLock<Node>>,
    elements: IndexMap<ElementId, Mutex<Element>>,
    revision: u64,
}

impl Network {
    /// Create an empty network whose series span `horizon` steps.
    pub fn new(horizon: usize) -> Self {
        Self {
            horizon,
            nodes: IndexMap::new(),
            elements: IndexMap::new(),
            revision: 0,
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Counter bumped by every topology or deploy-mode change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.elements.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn element_ids(&self) -> impl Iterator<Item = &ElementId> {
        self.elements.keys()
    }

    pub fn contains(&self, device: &Device) -> bool {
        match device {
            Device::Node(id) => self.nodes.contains_key(id),
            Device::Element(id) => self.elements.contains_key(id),
        }
    }

    /// Add a node.
    ///
    /// Elements already in the network that declare a connection to this node
    /// are recorded on the node's side.
    pub fn add_node(&mut self, mut node: Node) -> Result<()> {
        let id = node.id().clone();
        if self.nodes.contains_key(&id) {
            return Err(Error::Duplicate(Device::Node(id)));
        }
        if node.horizon() != self.horizon {
            return Err(Error::Aggregation {
                node: id,
                message: format!(
                    "node horizon {} differs from network horizon {}",
                    node.horizon(),
                    self.horizon
                ),
            });
        }
        let target = Device::Node(id.clone());
        for (element_id, element) in self.elements.iter_mut() {
            for role in element.get_mut().connections.roles_of(&target) {
                if let Some(side) = role.node_side() {
                    node.connections
                        .add(side, Device::Element(element_id.clone()));
                }
            }
        }
        debug!(node = %id, mode = %node.mode(), "node added");
        self.nodes.insert(id, RwLock::new(node));
        self.touch();
        Ok(())
    }

    /// Add an element together with the connections it declares.
    ///
    /// Connections to nodes that are not (yet) part of the network are kept;
    /// they are reported as topology errors when the graph is built.
    pub fn add_element(&mut self, element: Element) -> Result<()> {
        let id = element.id().clone();
        if self.elements.contains_key(&id) {
            return Err(Error::Duplicate(Device::Element(id)));
        }
        for (role, device) in element.connections.iter() {
            let (Some(node_id), Some(side)) = (device.as_node(), role.node_side()) else {
                continue;
            };
            if let Some(node) = self.nodes.get_mut(node_id) {
                node.get_mut()
                    .connections
                    .add(side, Device::Element(id.clone()));
            }
        }
        debug!(element = %id, connections = element.connections.len(), "element added");
        self.elements.insert(id, Mutex::new(element));
        self.touch();
        Ok(())
    }

    /// Connect `element` to `node` under an element `role`.
    pub fn connect(&mut self, element: &ElementId, role: Role, node: &NodeId) -> Result<()> {
        if !role.is_element_role() {
            return Err(Error::InvalidConfig(format!(
                "{role} is not an element connection role"
            )));
        }
        let side = role.node_side().unwrap_or(Role::Exit);
        let node_cell = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| Error::NotFound(Device::Node(node.clone())))?;
        let element_cell = self
            .elements
            .get_mut(element)
            .ok_or_else(|| Error::NotFound(Device::Element(element.clone())))?;

        let added = element_cell
            .get_mut()
            .connections
            .add(role, Device::Node(node.clone()));
        node_cell
            .get_mut()
            .connections
            .add(side, Device::Element(element.clone()));
        if added {
            self.touch();
        }
        Ok(())
    }

    /// Remove the `role` connection between `element` and `node`.
    pub fn disconnect(&mut self, element: &ElementId, role: Role, node: &NodeId) -> Result<()> {
        let element_cell = self
            .elements
            .get_mut(element)
            .ok_or_else(|| Error::NotFound(Device::Element(element.clone())))?;
        let connections = &mut element_cell.get_mut().connections;
        connections.remove(role, &Device::Node(node.clone()))?;

        // The node keeps its entry/exit record while another role of the same
        // kind still links the pair.
        let still_linked = connections
            .roles_of(&Device::Node(node.clone()))
            .into_iter()
            .any(|r| r.node_side() == role.node_side());
        if !still_linked
            && let (Some(node_cell), Some(side)) = (self.nodes.get_mut(node), role.node_side())
        {
            node_cell
                .get_mut()
                .connections
                .remove(side, &Device::Element(element.clone()))?;
        }
        self.touch();
        Ok(())
    }

    /// Remove a node and every connection that refers to it.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<Node> {
        let cell = self
            .nodes
            .shift_remove(id)
            .ok_or_else(|| Error::NotFound(Device::Node(id.clone())))?;
        let target = Device::Node(id.clone());
        for element in self.elements.values_mut() {
            element.get_mut().connections.detach(&target);
        }
        self.touch();
        let mut node = cell.into_inner();
        node.connections = Connections::new();
        Ok(node)
    }

    /// Remove an element and every connection that refers to it.
    pub fn remove_element(&mut self, id: &ElementId) -> Result<Element> {
        let cell = self
            .elements
            .shift_remove(id)
            .ok_or_else(|| Error::NotFound(Device::Element(id.clone())))?;
        let target = Device::Element(id.clone());
        for node in self.nodes.values_mut() {
            node.get_mut().connections.detach(&target);
        }
        self.touch();
        Ok(cell.into_inner())
    }

    /// Change a node's deploy mode.
    pub fn set_deploy_mode(&mut self, id: &NodeId, mode: DeployMode) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.mode() == mode {
            return Ok(());
        }
        node.set_mode(mode);
        debug!(node = %id, %mode, "deploy mode changed");
        self.touch();
        Ok(())
    }

    /// Shared access to a node.
    pub fn node(&self, id: &NodeId) -> Result<RwLockReadGuard<'_, Node>> {
        self.node_cell(id).map(|cell| cell.read())
    }

    /// Exclusive access to a node outside of a run.
    ///
    /// Deploy modes cannot be changed through this handle; use
    /// [`Network::set_deploy_mode`] so the change is tracked.
    pub fn node_mut(&mut self, id: &NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .map(|cell| cell.get_mut())
            .ok_or_else(|| Error::NotFound(Device::Node(id.clone())))
    }

    /// Access to an element.
    pub fn element(&self, id: &ElementId) -> Result<MutexGuard<'_, Element>> {
        self.element_cell(id).map(|cell| cell.lock())
    }

    pub(crate) fn node_cell(&self, id: &NodeId) -> Result<&RwLock<Node>> {
        self.nodes
            .get(id)
            .ok_or_else(|| Error::NotFound(Device::Node(id.clone())))
    }

    pub(crate) fn element_cell(&self, id: &ElementId) -> Result<&Mutex<Element>> {
        self.elements
            .get(id)
            .ok_or_else(|| Error::NotFound(Device::Element(id.clone())))
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = (&NodeId, &RwLock<Node>)> {
        self.nodes.iter()
    }

    pub(crate) fn elements(&self) -> impl Iterator<Item = (&ElementId, &Mutex<Element>)> {
        self.elements.iter()
    }

    /// Reset per-run state ahead of simulating `window`.
    pub(crate) fn begin_run(&mut self, window: IndexWindow, reset_conditions: bool) {
        for node in self.nodes.values_mut() {
            node.get_mut().begin_run(window);
        }
        let horizon = self.horizon;
        for element in self.elements.values_mut() {
            element.get_mut().begin_run(horizon, reset_conditions);
        }
    }
}
