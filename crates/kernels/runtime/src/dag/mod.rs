//! Dependency Graph and Partitioning.
//!
//! This module turns a [`Network`](crate::network::Network) into the
//! read-only structures the scheduler works from.
//!
//! # Structure
//!
//! - [`NetworkGraph`] - Directed graph over all nodes and elements. An edge
//!   `u -> v` means `v` needs `u`'s output.
//! - [`Partition`] - Split of the devices into a part that may run
//!   concurrently (time-chunked) and a part that must step sequentially.
//! - [`step_order`] - Deterministic topological order used for sequential
//!   stepping.
//!
//! # Execution Model
//!
//! Devices in the parallel part each process the whole simulation window in
//! one go, as soon as every device they depend on has finished. That is only
//! valid when no element needs a value another element produces *in the same
//! step* through a receiver connection. Elements that do, and everything
//! downstream of them, step through time together on a single thread.
//!
//! ```text
//!   parallel part                         sequential part
//!   ─────────────                         ───────────────
//!   node.a ─▶ element.b ─▶ node.d ─┐
//!        └──▶ element.c ─▶ node.d  │ (transition node)
//!                                  └─▶ element.e (receives fresh node.d)
//! ```

mod builder;
mod partition;
mod topology;


pub use builder::{Edge, NetworkGraph};
pub use partition::{Partition, PartitionSummary, analyze};
pub use topology::step_order;
