//! Hydronet Runtime.
//!
//! This crate provides the execution engine for hydrological networks. It
//! simulates a network of elements (model instances) and nodes (junctions
//! and gauges) over a discrete time horizon, running whatever the topology
//! allows in parallel while producing the same results as a purely
//! sequential run.
//!
//! # Architecture
//!
//! The runtime is organized into several modules:
//!
//! - [`network`] - Devices, connection registries, and the [`Network`] table
//! - [`dag`] - Dependency graph, step ordering, and parallelisability analysis
//! - [`executor`] - Scheduler queue, worker pool, and the [`Simulator`]
//! - [`models`] - Reference models for harnesses and benches
//! - [`error`] - Error types for runtime failures
//!
//! # Execution Model
//!
//! Each run proceeds in three phases:
//!
//! 1. **Prepare** - Build or reuse the graph, partition, and queue
//! 2. **Parallel** - Workers process devices over the whole window as soon as
//!    their same-step dependencies are done
//! 3. **Sequential** - Devices that receive fresh same-step values are
//!    stepped one index at a time on the calling thread
//!
//! # Example
//!
//! ```ignore
//! use hydronet_runtime::{Element, Network, Node, RunConfig, Simulator};
//! use hydronet_runtime::models::LinearStorage;
//!
//! let mut network = Network::new(365);
//! network.add_node(Node::new("gauge", 365))?;
//! network.add_element(Element::new("land", LinearStorage::new(0.3)).outlet("gauge"))?;
//!
//! let mut simulator = Simulator::new(RunConfig::auto());
//! simulator.simulate(&mut network)?;
//! ```

pub mod dag;
pub mod error;
pub mod executor;
pub mod models;
pub mod network;

pub use dag::{NetworkGraph, Partition, analyze, step_order};
pub use error::{Error, ModelError, Result};
pub use executor::{
    ExecutionPlan, QueueDiscipline, RunConfig, RunReport, SchedulerQueue, Simulator,
    run_parallel, run_sequential,
};
pub use hydronet_foundation::{DeployMode, Device, DeviceKind, ElementId, IndexWindow, NodeId};
pub use network::{Connections, Element, Model, Network, Node, Role, Sequences};
