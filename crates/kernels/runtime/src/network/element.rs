//! Elements: model instances wired to nodes.

use hydronet_foundation::{Device, ElementId, IndexWindow, NodeId};

use super::connections::{Connections, Role};
use super::sequences::Sequences;
use crate::error::{Error, ModelError, Result};

/// A hydrological model as seen by the scheduler.
///
/// The scheduler only needs to run a model over an index window; what the
/// model computes is its own business. A model must be causal: values it
/// writes for step `t` may only depend on values it reads for steps `<= t`
/// and on its own state, so running `[i0, i1)` in one call gives the same
/// result as running it one step at a time.
pub trait Model: Send {
    /// Run the model over `window`, reading and writing `sequences`.
    fn simulate(
        &mut self,
        sequences: &mut Sequences,
        window: IndexWindow,
    ) -> std::result::Result<(), ModelError>;

    /// Restore the initial conditions before a new run.
    fn reset_conditions(&mut self) {}
}

/// A device owning a model instance and its connections to nodes.
pub struct Element {
    id: ElementId,
    model: Box<dyn Model>,
    sequences: Sequences,
    pub(crate) connections: Connections,
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id)
            .field("connections", &self.connections)
            .finish_non_exhaustive()
    }
}

impl Element {
    pub fn new(id: impl Into<ElementId>, model: impl Model + 'static) -> Self {
        Self {
            id: id.into(),
            model: Box::new(model),
            sequences: Sequences::default(),
            connections: Connections::new(),
        }
    }

    /// Declare a connection to `node` under an element `role`.
    ///
    /// The node side is recorded when the element joins a network.
    pub fn with(mut self, role: Role, node: impl Into<NodeId>) -> Self {
        self.connections.add(role, Device::Node(node.into()));
        self
    }

    pub fn inlet(self, node: impl Into<NodeId>) -> Self {
        self.with(Role::Inlet, node)
    }

    pub fn outlet(self, node: impl Into<NodeId>) -> Self {
        self.with(Role::Outlet, node)
    }

    pub fn receiver(self, node: impl Into<NodeId>) -> Self {
        self.with(Role::Receiver, node)
    }

    pub fn sender(self, node: impl Into<NodeId>) -> Self {
        self.with(Role::Sender, node)
    }

    pub fn input(self, node: impl Into<NodeId>) -> Self {
        self.with(Role::Input, node)
    }

    pub fn output(self, node: impl Into<NodeId>) -> Self {
        self.with(Role::Output, node)
    }

    pub fn id(&self) -> &ElementId {
        &self.id
    }

    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    pub fn sequences(&self) -> &Sequences {
        &self.sequences
    }

    /// Connections through which node values flow into this element.
    pub fn reading_connections(&self) -> Vec<(Role, NodeId)> {
        Role::READING
            .into_iter()
            .flat_map(|role| self.connections.nodes(role).map(move |n| (role, n.clone())))
            .collect()
    }

    pub(crate) fn begin_run(&mut self, horizon: usize, reset_conditions: bool) {
        self.sequences.sync(&self.connections, horizon);
        if reset_conditions {
            self.model.reset_conditions();
        }
    }

    /// Write node values into a reading-role series.
    pub(crate) fn load(
        &mut self,
        role: Role,
        node: &NodeId,
        window: IndexWindow,
        values: &[f64],
    ) -> Result<()> {
        if self.sequences.load(role, node, window, values) {
            Ok(())
        } else {
            Err(Error::NotFound(Device::Node(node.clone())))
        }
    }

    /// The `window` of a writing-role series.
    pub fn emission(&self, role: Role, node: &NodeId, window: IndexWindow) -> Result<&[f64]> {
        self.sequences
            .series(role, node)
            .and_then(|series| series.get(window.range()))
            .ok_or_else(|| Error::NotFound(Device::Node(node.clone())))
    }

    /// Run the model over `window`.
    pub fn simulate(&mut self, window: IndexWindow) -> Result<()> {
        self.model
            .simulate(&mut self.sequences, window)
            .map_err(|source| Error::Model {
                element: self.id.clone(),
                source,
            })
    }
}
