//! Parallelisability analysis.

use std::collections::BTreeSet;
use std::fmt;

use hydronet_foundation::{Device, NodeId};

use super::builder::NetworkGraph;
use crate::network::Role;

/// Split of a network into a parallel and a sequential part.
///
/// Every device lands in exactly one of `parallel`, `sequential`, or (nodes
/// only) `transition`. Transition nodes sit on the border: they are fed by
/// parallel elements and read by sequential ones, or the other way round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    parallel: BTreeSet<Device>,
    sequential: BTreeSet<Device>,
    transition: BTreeSet<NodeId>,
    parallel_view: BTreeSet<Device>,
    sequential_view: BTreeSet<Device>,
}

impl Partition {
    /// Devices that may run time-chunked in the worker pool.
    pub fn parallel(&self) -> &BTreeSet<Device> {
        &self.parallel
    }

    /// Devices that must step through time one index at a time.
    pub fn sequential(&self) -> &BTreeSet<Device> {
        &self.sequential
    }

    /// Nodes connected to both parts.
    pub fn transition(&self) -> &BTreeSet<NodeId> {
        &self.transition
    }

    /// What the worker pool processes: the parallel part plus the
    /// transition nodes fed only by parallel elements.
    pub fn parallel_view(&self) -> &BTreeSet<Device> {
        &self.parallel_view
    }

    /// What sequential stepping processes: everything outside the parallel
    /// view.
    pub fn sequential_view(&self) -> &BTreeSet<Device> {
        &self.sequential_view
    }

    pub fn is_parallel(&self, device: &Device) -> bool {
        self.parallel_view.contains(device)
    }

    pub fn summary(&self) -> PartitionSummary {
        let count = |set: &BTreeSet<Device>, node: bool| {
            set.iter().filter(|d| d.is_node() == node).count()
        };
        PartitionSummary {
            parallel_elements: count(&self.parallel, false),
            parallel_nodes: count(&self.parallel, true),
            sequential_elements: count(&self.sequential, false),
            sequential_nodes: count(&self.sequential, true),
            transition_nodes: self.transition.len(),
        }
    }
}

/// Device counts per part, for logging and reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionSummary {
    pub parallel_elements: usize,
    pub parallel_nodes: usize,
    pub sequential_elements: usize,
    pub sequential_nodes: usize,
    pub transition_nodes: usize,
}

impl fmt::Display for PartitionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parallel {}e/{}n, sequential {}e/{}n, transition {}n",
            self.parallel_elements,
            self.parallel_nodes,
            self.sequential_elements,
            self.sequential_nodes,
            self.transition_nodes
        )
    }
}

/// Decide which devices of `graph` may run in parallel.
///
/// An element must step sequentially when it receives from a node that
/// forwards freshly simulated values: it needs that node's value for the
/// current step before it can compute the step. All elements downstream of
/// such an element inherit the restriction. Everything else is parallel.
///
/// Nodes follow the elements they touch: a node linked only to parallel
/// elements is parallel, a node linked to both parts is a transition node,
/// and any other node (including unconnected ones) is sequential.
pub fn analyze(graph: &NetworkGraph) -> Partition {
    let mut sequential_elements = BTreeSet::new();
    for element in graph.elements() {
        let receives_fresh = graph.predecessors(element).any(|(node, role)| {
            role == Role::Receiver
                && graph
                    .deploy_mode(node)
                    .is_some_and(|mode| mode.forwards_fresh())
        });
        if receives_fresh && sequential_elements.insert(element.clone()) {
            sequential_elements.extend(
                graph
                    .descendants(element)
                    .into_iter()
                    .filter(Device::is_element),
            );
        }
    }

    let mut partition = Partition::default();
    for element in graph.elements() {
        if sequential_elements.contains(element) {
            partition.sequential.insert(element.clone());
        } else {
            partition.parallel.insert(element.clone());
        }
    }

    for node in graph.nodes() {
        let (mut touches_parallel, mut touches_sequential) = (false, false);
        for (neighbor, _) in graph.predecessors(node).chain(graph.successors(node)) {
            if sequential_elements.contains(neighbor) {
                touches_sequential = true;
            } else {
                touches_parallel = true;
            }
        }
        match (touches_parallel, touches_sequential, node.as_node()) {
            (true, true, Some(id)) => {
                partition.transition.insert(id.clone());
            }
            (true, false, _) => {
                partition.parallel.insert(node.clone());
            }
            _ => {
                partition.sequential.insert(node.clone());
            }
        }
    }

    partition.parallel_view = partition.parallel.clone();
    partition.sequential_view = partition.sequential.clone();
    for id in &partition.transition {
        let node = Device::Node(id.clone());
        let fed_in_parallel = graph
            .predecessors(&node)
            .all(|(entry, _)| partition.parallel.contains(entry));
        if fed_in_parallel {
            partition.parallel_view.insert(node);
        } else {
            partition.sequential_view.insert(node);
        }
    }

    partition
}
