//! Connection registry.
//!
//! Every device owns a [`Connections`] value mapping each [`Role`] to the
//! name-sorted set of neighbouring devices. Registries hold identifiers only;
//! the [`Network`](super::Network) owns the devices themselves.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use hydronet_foundation::{Device, ElementId, NodeId};

use crate::error::{Error, Result};

/// The role a neighbour plays for a device.
///
/// The first six roles are seen from an element and name the node on the
/// other side. `Entry` and `Exit` are the node-side bookkeeping: an entry
/// element writes into the node, an exit element reads from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Inlet,
    Outlet,
    Receiver,
    Sender,
    Input,
    Output,
    Entry,
    Exit,
}

impl Role {
    /// Roles an element may use to refer to a node.
    pub const ELEMENT: [Role; 6] = [
        Role::Inlet,
        Role::Outlet,
        Role::Receiver,
        Role::Sender,
        Role::Input,
        Role::Output,
    ];

    /// Element roles through which a node's value flows into the element.
    pub const READING: [Role; 3] = [Role::Inlet, Role::Receiver, Role::Input];

    /// Element roles through which the element's results flow into a node.
    pub const WRITING: [Role; 3] = [Role::Outlet, Role::Sender, Role::Output];

    pub fn is_element_role(self) -> bool {
        !matches!(self, Role::Entry | Role::Exit)
    }

    pub fn reads_node(self) -> bool {
        matches!(self, Role::Inlet | Role::Receiver | Role::Input)
    }

    pub fn writes_node(self) -> bool {
        matches!(self, Role::Outlet | Role::Sender | Role::Output)
    }

    /// The role under which the element is recorded on the node's side.
    ///
    /// Returns `None` for roles that are already node-side.
    pub fn node_side(self) -> Option<Role> {
        if self.writes_node() {
            Some(Role::Entry)
        } else if self.reads_node() {
            Some(Role::Exit)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Inlet => "inlet",
            Role::Outlet => "outlet",
            Role::Receiver => "receiver",
            Role::Sender => "sender",
            Role::Input => "input",
            Role::Output => "output",
            Role::Entry => "entry",
            Role::Exit => "exit",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-role sets of neighbouring devices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connections {
    roles: IndexMap<Role, BTreeSet<Device>>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `device` under `role`. Adding an existing neighbour is a no-op.
    ///
    /// Returns whether the device was newly inserted.
    pub fn add(&mut self, role: Role, device: Device) -> bool {
        self.roles.entry(role).or_default().insert(device)
    }

    /// Remove `device` from `role`.
    pub fn remove(&mut self, role: Role, device: &Device) -> Result<()> {
        let removed = self
            .roles
            .get_mut(&role)
            .is_some_and(|set| set.remove(device));
        if !removed {
            return Err(Error::NotFound(device.clone()));
        }
        if self.roles.get(&role).is_some_and(BTreeSet::is_empty) {
            self.roles.shift_remove(&role);
        }
        Ok(())
    }

    /// Remove `device` from every role, returning the roles it held.
    pub fn detach(&mut self, device: &Device) -> Vec<Role> {
        let mut held = Vec::new();
        for (role, set) in self.roles.iter_mut() {
            if set.remove(device) {
                held.push(*role);
            }
        }
        self.roles.retain(|_, set| !set.is_empty());
        held
    }

    /// Neighbours under `role`, sorted by name.
    pub fn neighbors(&self, role: Role) -> impl Iterator<Item = &Device> {
        self.roles.get(&role).into_iter().flatten()
    }

    /// Node neighbours under `role`, sorted by name.
    pub fn nodes(&self, role: Role) -> impl Iterator<Item = &NodeId> {
        self.neighbors(role).filter_map(Device::as_node)
    }

    /// Element neighbours under `role`, sorted by name.
    pub fn elements(&self, role: Role) -> impl Iterator<Item = &ElementId> {
        self.neighbors(role).filter_map(Device::as_element)
    }

    /// Whether `device` is a neighbour under any role.
    pub fn contains(&self, device: &Device) -> bool {
        self.roles.values().any(|set| set.contains(device))
    }

    pub fn contains_in(&self, role: Role, device: &Device) -> bool {
        self.roles.get(&role).is_some_and(|set| set.contains(device))
    }

    /// Roles under which `device` is a neighbour, in role order.
    pub fn roles_of(&self, device: &Device) -> Vec<Role> {
        let mut roles: Vec<Role> = self
            .roles
            .iter()
            .filter(|(_, set)| set.contains(device))
            .map(|(role, _)| *role)
            .collect();
        roles.sort();
        roles
    }

    /// All `(role, neighbour)` pairs, roles in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &Device)> {
        let mut roles: Vec<&Role> = self.roles.keys().collect();
        roles.sort();
        roles
            .into_iter()
            .flat_map(move |role| self.neighbors(*role).map(move |device| (*role, device)))
    }

    /// Number of `(role, neighbour)` pairs.
    pub fn len(&self) -> usize {
        self.roles.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
