//! Runtime errors for network simulation.
//!
//! # Error Categories
//!
//! - **Topology errors**: [`Error::UnknownDevice`], [`Error::CycleDetected`]
//! - **Lookup errors**: [`Error::NotFound`], [`Error::Duplicate`]
//! - **Execution errors**: [`Error::Model`], [`Error::Aggregation`], [`Error::WorkerPanicked`]
//! - **Misuse errors**: [`Error::QueueMisuse`], [`Error::InvalidConfig`]
//!
//! # Error Handling Policy
//!
//! A run surfaces exactly one error: the first one recorded by any worker.
//! Model errors keep the model's own error value as their source so callers
//! can tell which element failed and why. Nothing is retried.

use thiserror::Error;

use hydronet_foundation::{Device, ElementId, NodeId};

/// Runtime result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error raised by a model's `simulate` call.
pub type ModelError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while assembling or running a network.
#[derive(Debug, Error)]
pub enum Error {
    /// A device was looked up or removed but is not present.
    #[error("{0} not found")]
    NotFound(Device),

    /// A device with the same name and kind is already part of the network.
    #[error("{0} already exists")]
    Duplicate(Device),

    /// A connection refers to a device that is not part of the network.
    ///
    /// Detected when the dependency graph is built, before any scheduling.
    #[error("{referrer} refers to unknown {missing}")]
    UnknownDevice {
        /// The device holding the dangling connection.
        referrer: Device,
        /// The device that could not be found.
        missing: Device,
    },

    /// The network contains a cycle that does not pass through a receiver
    /// connection, so no step order exists.
    #[error("cycle detected among devices: {devices:?}")]
    CycleDetected {
        /// Devices that could not be ordered.
        devices: Vec<Device>,
    },

    /// An element's model failed.
    #[error("model of element {element} failed: {source}")]
    Model {
        /// The element whose model failed.
        element: ElementId,
        /// The error returned by the model, unchanged.
        #[source]
        source: ModelError,
    },

    /// A node could not aggregate its upstream contributions.
    #[error("aggregation failed at node {node}: {message}")]
    Aggregation {
        /// The node being aggregated.
        node: NodeId,
        /// Description of the problem.
        message: String,
    },

    /// The scheduler queue was used out of protocol or against a stale
    /// partition. Always a programming error.
    #[error("scheduler queue misuse: {0}")]
    QueueMisuse(String),

    /// Run configuration is not usable for this network.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A worker thread panicked while processing a device.
    #[error("worker panicked while processing {device}: {message}")]
    WorkerPanicked {
        /// The device being processed.
        device: Device,
        /// Panic payload, if it was a string.
        message: String,
    },
}

impl Error {
    /// The original model error, if this is a model failure.
    pub fn model_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Model { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }

    /// The element whose model failed, if this is a model failure.
    pub fn failed_element(&self) -> Option<&ElementId> {
        match self {
            Error::Model { element, .. } => Some(element),
            _ => None,
        }
    }
}
