//! Unique identifiers for network devices
//!
//! Nodes and elements are identified by typed string wrappers. Ordering is by
//! name so that every set of devices iterates deterministically.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Creates a new identifier from a name.
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a node (measurement or junction point)
    NodeId
);

define_id!(
    /// Unique identifier for an element (one model instance)
    ElementId
);

/// Discriminates the two kinds of device without carrying a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceKind {
    Node,
    Element,
}

/// A vertex of the network: either a node or an element.
///
/// Devices compare by name first and by kind second, so a node and an element
/// may share a name without colliding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    Node(NodeId),
    Element(ElementId),
}

impl Device {
    /// The device name regardless of kind.
    pub fn name(&self) -> &str {
        match self {
            Device::Node(id) => id.as_str(),
            Device::Element(id) => id.as_str(),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            Device::Node(_) => DeviceKind::Node,
            Device::Element(_) => DeviceKind::Element,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Device::Node(_))
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Device::Element(_))
    }

    pub fn as_node(&self) -> Option<&NodeId> {
        match self {
            Device::Node(id) => Some(id),
            Device::Element(_) => None,
        }
    }

    pub fn as_element(&self) -> Option<&ElementId> {
        match self {
            Device::Element(id) => Some(id),
            Device::Node(_) => None,
        }
    }
}

impl Ord for Device {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name()
            .cmp(other.name())
            .then_with(|| self.kind().cmp(&other.kind()))
    }
}

impl PartialOrd for Device {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Node(id) => write!(f, "node.{id}"),
            Device::Element(id) => write!(f, "element.{id}"),
        }
    }
}

impl From<NodeId> for Device {
    fn from(id: NodeId) -> Self {
        Device::Node(id)
    }
}

impl From<ElementId> for Device {
    fn from(id: ElementId) -> Self {
        Device::Element(id)
    }
}
