//! Per-device units of work.
//!
//! Shared by the worker pool (one call per device over the whole window) and
//! sequential stepping (one call per device and step). At most one device
//! lock is held at any time.

use hydronet_foundation::{Device, ElementId, IndexWindow, NodeId};
use tracing::trace;

use crate::error::Result;
use crate::network::{Network, Role};

/// Run the unit of work for `device` over `window`.
pub fn process(network: &Network, device: &Device, window: IndexWindow) -> Result<()> {
    match device {
        Device::Node(id) => aggregate_node(network, id, window),
        Device::Element(id) => simulate_element(network, id, window),
    }
}

/// Sum the writing-role emissions of the node's entry elements into the node.
pub fn aggregate_node(network: &Network, id: &NodeId, window: IndexWindow) -> Result<()> {
    let cell = network.node_cell(id)?;
    let entries: Vec<ElementId> = cell
        .read()
        .connections()
        .elements(Role::Entry)
        .cloned()
        .collect();

    let target = Device::Node(id.clone());
    let mut totals = vec![0.0; window.len()];
    for entry in &entries {
        let element = network.element(entry)?;
        for role in Role::WRITING {
            if !element.connections().contains_in(role, &target) {
                continue;
            }
            let emitted = element.emission(role, id, window)?;
            for (total, value) in totals.iter_mut().zip(emitted) {
                *total += value;
            }
        }
    }

    trace!(node = %id, entries = entries.len(), start = window.start, "node aggregated");
    cell.write().store_aggregate(window, &totals)
}

/// Load the element's node inputs for `window`, then run its model.
pub fn simulate_element(network: &Network, id: &ElementId, window: IndexWindow) -> Result<()> {
    let cell = network.element_cell(id)?;
    let reading = cell.lock().reading_connections();

    let mut inputs = Vec::with_capacity(reading.len());
    for (role, node_id) in reading {
        let node = network.node(&node_id)?;
        let values = match role {
            Role::Receiver => node.receiver_window(window),
            _ => node.deployed_window(window),
        };
        drop(node);
        inputs.push((role, node_id, values));
    }

    let mut element = cell.lock();
    for (role, node_id, values) in &inputs {
        element.load(*role, node_id, window, values)?;
    }
    trace!(element = %id, inputs = inputs.len(), start = window.start, "element simulating");
    element.simulate(window)
}
