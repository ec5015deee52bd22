//! Deterministic step ordering.

use std::collections::BTreeSet;

use tracing::debug;

use hydronet_foundation::Device;

use super::builder::{Edge, NetworkGraph};
use crate::error::{Error, Result};
use crate::network::Role;

/// Topologically order `members` for sequential stepping.
///
/// Uses Kahn's algorithm restricted to the edges between members that carry a
/// same-step value: every edge out of an element, and the edges out of nodes
/// that forward fresh values. Reads of other nodes see observed or carried
/// values that no device changes during the step, so they impose no order.
/// Among the devices that are ready at the same time, the one that sorts first
/// by name goes first, so the order is stable across runs.
///
/// Receiver connections may legitimately close a loop (an element reading a
/// node that it, or something downstream of it, feeds). A receiver edge whose
/// source node is reachable from the reading element is left out of the
/// ordering, and that receiver sees the value of the previous step. Every other
/// receiver is ordered after its source. A loop without a receiver edge fails
/// with [`Error::CycleDetected`].
///
/// Members that are not part of `graph` are skipped.
pub fn step_order(graph: &NetworkGraph, members: &BTreeSet<Device>) -> Result<Vec<Device>> {
    let mut included = vec![false; graph.len()];
    let mut total = 0;
    for idx in members.iter().filter_map(|device| graph.index_of(device)) {
        included[idx] = true;
        total += 1;
    }

    let carries = |source: usize, target: usize| {
        included[source] && included[target] && graph.forwards_fresh(source)
    };

    let mut lagging = BTreeSet::new();
    for target in (0..graph.len()).filter(|&v| included[v]) {
        for edge in graph.predecessor_edges(target) {
            if edge.role == Role::Receiver
                && carries(edge.vertex, target)
                && reaches(graph, &carries, target, edge.vertex)
            {
                lagging.insert((edge.vertex, target));
            }
        }
    }
    if !lagging.is_empty() {
        debug!(
            receivers = lagging.len(),
            "receiver loops found, those receivers read the previous step"
        );
    }

    let orders = |source: usize, target: usize, edge: &Edge| {
        carries(source, target)
            && !(edge.role == Role::Receiver && lagging.contains(&(source, target)))
    };

    let mut in_degree = vec![0usize; graph.len()];
    let mut ready = BTreeSet::new();
    for v in (0..graph.len()).filter(|&v| included[v]) {
        in_degree[v] = graph
            .predecessor_edges(v)
            .iter()
            .filter(|e| orders(e.vertex, v, e))
            .count();
        if in_degree[v] == 0 {
            ready.insert(v);
        }
    }

    let mut placed = vec![false; graph.len()];
    let mut order = Vec::with_capacity(total);
    while let Some(v) = ready.pop_first() {
        placed[v] = true;
        order.push(graph.device(v).clone());
        for edge in graph.successor_edges(v) {
            let w = edge.vertex;
            if !orders(v, w, edge) {
                continue;
            }
            in_degree[w] -= 1;
            if in_degree[w] == 0 {
                ready.insert(w);
            }
        }
    }

    if order.len() == total {
        return Ok(order);
    }
    let remaining: Vec<Device> = (0..graph.len())
        .filter(|&v| included[v] && !placed[v])
        .map(|v| graph.device(v).clone())
        .collect();
    Err(Error::CycleDetected { devices: remaining })
}

/// Whether `to` can be reached from `from` over same-step edges.
fn reaches(
    graph: &NetworkGraph,
    carries: &impl Fn(usize, usize) -> bool,
    from: usize,
    to: usize,
) -> bool {
    let mut seen = vec![false; graph.len()];
    let mut stack = vec![from];
    seen[from] = true;
    while let Some(v) = stack.pop() {
        for edge in graph.successor_edges(v) {
            let w = edge.vertex;
            if seen[w] || !carries(v, w) {
                continue;
            }
            if w == to {
                return true;
            }
            seen[w] = true;
            stack.push(w);
        }
    }
    false
}
