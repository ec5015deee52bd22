//! Synthetic river networks.

use hydronet_foundation::DeployMode;
use hydronet_runtime::models::{Lag, LinearStorage};
use hydronet_runtime::{Element, Network, Node, Result};

/// Shape of the generated network.
#[derive(Debug, Clone, Copy)]
pub struct RiverShape {
    pub horizon: usize,
    pub branches: usize,
    pub outlet_mode: DeployMode,
}

/// Tributaries of land and routing elements draining into one outlet, with
/// a reservoir receiving the outlet and an irrigation scheme fed by its
/// withdrawals.
pub fn synthesize(shape: RiverShape) -> Result<Network> {
    let RiverShape {
        horizon,
        branches,
        outlet_mode,
    } = shape;
    let mut network = Network::new(horizon);
    network.add_node(Node::new("outlet", horizon).with_mode(outlet_mode))?;
    for name in ["release", "withdrawn", "fields"] {
        network.add_node(Node::new(name, horizon))?;
    }

    for i in 0..branches {
        let rain = format!("rain_{i:04}");
        let reach = format!("reach_{i:04}");
        let series = (0..horizon)
            .map(|t| ((t * 13 + i * 7) % 23) as f64 * 0.25)
            .collect();
        network.add_node(
            Node::new(rain.as_str(), horizon)
                .with_mode(DeployMode::Observed)
                .with_observed(series)?,
        )?;
        network.add_node(Node::new(reach.as_str(), horizon))?;
        network.add_element(
            Element::new(format!("land_{i:04}"), LinearStorage::new(0.15 + (i % 5) as f64 * 0.1))
                .inlet(rain.as_str())
                .outlet(reach.as_str()),
        )?;
        network.add_element(
            Element::new(format!("route_{i:04}"), Lag::new(1 + i % 4))
                .inlet(reach.as_str())
                .outlet("outlet"),
        )?;
    }

    network.add_element(
        Element::new("reservoir", LinearStorage::with_storage(0.02, 500.0))
            .receiver("outlet")
            .outlet("release")
            .output("withdrawn"),
    )?;
    network.add_element(
        Element::new("irrigation", Lag::new(2))
            .input("withdrawn")
            .outlet("fields"),
    )?;
    Ok(network)
}
