//! Integration test harness for hydronet.
//!
//! This crate provides network fixtures and comparison helpers for
//! end-to-end testing of the scheduling pipeline:
//! Assemble → Analyze → Schedule → Execute → Compare.

use std::sync::Once;
use std::thread;
use std::time::Duration;

use indexmap::IndexMap;
use tracing_subscriber::EnvFilter;

use hydronet_foundation::{DeployMode, IndexWindow, same_values};
use hydronet_runtime::models::{Lag, LinearStorage};
use hydronet_runtime::{
    Element, Model, ModelError, Network, Node, Result, Role, RunConfig, RunReport, Sequences,
    Simulator,
};

/// Node name to simulated series, in network order.
pub type NodeSeries = IndexMap<String, Vec<f64>>;

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| "hydronet=warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A network under test.
pub struct NetworkFixture {
    network: Network,
}

impl NetworkFixture {
    pub fn new(network: Network) -> Self {
        Self { network }
    }

    /// `a -> {b, c} -> d` fed by observations at `a`, with `d` in `mode`.
    ///
    /// With `receiver` set, element `e` receives `d` and drains into `f`.
    pub fn diamond(horizon: usize, mode: DeployMode, receiver: bool) -> Self {
        let mut network = Network::new(horizon);
        let rain = pattern(horizon, 7, 0.5);
        add_node(
            &mut network,
            Node::new("a", horizon)
                .with_mode(DeployMode::Observed)
                .with_observed(rain)
                .expect("rain series matches horizon"),
        );
        add_node(
            &mut network,
            Node::new("d", horizon)
                .with_mode(mode)
                .with_observed(gappy(horizon, 3))
                .expect("observed series matches horizon"),
        );
        add_element(
            &mut network,
            Element::new("b", LinearStorage::new(0.4)).inlet("a").outlet("d"),
        );
        add_element(
            &mut network,
            Element::new("c", Lag::new(2)).inlet("a").outlet("d"),
        );
        if receiver {
            add_node(&mut network, Node::new("f", horizon));
            add_element(
                &mut network,
                Element::new("e", LinearStorage::with_storage(0.1, 50.0))
                    .receiver("d")
                    .outlet("f"),
            );
        }
        Self { network }
    }

    /// A river network using every connection role.
    ///
    /// `branches` tributaries drain into `outlet` (deployed in `outlet_mode`).
    /// Reach nodes cycle through all deploy modes starting at `mode_offset`.
    /// A dam receives the outlet and feeds irrigation elements through
    /// `withdrawn`; every tributary reports its storage through a sender node
    /// that a gauge element receives.
    pub fn river(
        horizon: usize,
        branches: usize,
        outlet_mode: DeployMode,
        mode_offset: usize,
    ) -> Self {
        let mut network = Network::new(horizon);
        for name in ["outlet", "release", "withdrawn", "fields"] {
            add_node(&mut network, Node::new(name, horizon));
        }
        network
            .set_deploy_mode(&"outlet".into(), outlet_mode)
            .expect("outlet exists");
        let outlet_observed = gappy(horizon, 5);
        network
            .node_mut(&"outlet".into())
            .expect("outlet exists")
            .set_observed(outlet_observed)
            .expect("observed series matches horizon");

        for i in 0..branches {
            let mode = DeployMode::ALL[(i + mode_offset) % DeployMode::ALL.len()];
            let rain = format!("rain_{i:02}");
            let reach = format!("reach_{i:02}");
            let store = format!("store_{i:02}");
            add_node(
                &mut network,
                Node::new(rain.as_str(), horizon)
                    .with_mode(DeployMode::Observed)
                    .with_observed(pattern(horizon, 11 + i, 0.3))
                    .expect("rain series matches horizon"),
            );
            add_node(
                &mut network,
                Node::new(reach.as_str(), horizon)
                    .with_mode(mode)
                    .with_observed(gappy(horizon, 2 + i % 3))
                    .expect("observed series matches horizon")
                    .with_simulated(pattern(horizon, 5 + i, 0.2))
                    .expect("carried series matches horizon"),
            );
            add_node(
                &mut network,
                Node::new(store.as_str(), horizon).with_mode(DeployMode::Carried),
            );
            add_element(
                &mut network,
                Element::new(format!("land_{i:02}"), LinearStorage::new(0.25))
                    .inlet(rain.as_str())
                    .outlet(reach.as_str())
                    .sender(store.as_str()),
            );
            add_element(
                &mut network,
                Element::new(format!("route_{i:02}"), Lag::new(1 + i % 3))
                    .inlet(reach.as_str())
                    .outlet("outlet"),
            );
            add_element(
                &mut network,
                Element::new(format!("gauge_{i:02}"), LinearStorage::new(0.5))
                    .receiver(store.as_str())
                    .input(rain.as_str()),
            );
        }

        add_element(
            &mut network,
            Element::new("dam", LinearStorage::with_storage(0.05, 200.0))
                .receiver("outlet")
                .outlet("release")
                .output("withdrawn"),
        );
        add_element(
            &mut network,
            Element::new("irrigation", Lag::new(1))
                .input("withdrawn")
                .outlet("fields"),
        );
        Self { network }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    /// Run once with a fresh simulator.
    pub fn run(&mut self, config: RunConfig) -> Result<RunReport> {
        Simulator::new(config).simulate(&mut self.network)
    }

    /// Run with `threads` workers and return every node's series.
    pub fn run_threads(&mut self, threads: usize) -> Result<NodeSeries> {
        self.run(RunConfig::default().with_threads(threads))?;
        Ok(self.series())
    }

    /// Simulated series of every node.
    pub fn series(&self) -> NodeSeries {
        self.network
            .node_ids()
            .map(|id| {
                let node = self.network.node(id).expect("listed node exists");
                (id.to_string(), node.simulated().to_vec())
            })
            .collect()
    }

    /// Simulated series of one node.
    pub fn simulated(&self, name: &str) -> Vec<f64> {
        self.network
            .node(&name.into())
            .expect("node exists")
            .simulated()
            .to_vec()
    }
}

fn add_node(network: &mut Network, node: Node) {
    network.add_node(node).expect("fixture node names are unique");
}

fn add_element(network: &mut Network, element: Element) {
    network
        .add_element(element)
        .expect("fixture element names are unique");
}

/// Deterministic non-negative series.
pub fn pattern(horizon: usize, period: usize, scale: f64) -> Vec<f64> {
    (0..horizon)
        .map(|t| ((t * 7 + period) % period.max(1)) as f64 * scale)
        .collect()
}

/// Observations with a gap every `every` steps.
pub fn gappy(horizon: usize, every: usize) -> Vec<f64> {
    (0..horizon)
        .map(|t| {
            if t % every.max(1) == 0 {
                f64::NAN
            } else {
                (t % 13) as f64
            }
        })
        .collect()
}

/// Assert two node-series snapshots are equal, NaN-equal.
///
/// # Panics
///
/// Panics naming the first node that differs.
pub fn assert_same_series(expected: &NodeSeries, actual: &NodeSeries, context: &str) {
    assert_eq!(
        expected.keys().collect::<Vec<_>>(),
        actual.keys().collect::<Vec<_>>(),
        "{context}: node sets differ"
    );
    for (name, values) in expected {
        assert!(
            same_values(values, &actual[name]),
            "{context}: node {name} differs\n expected {values:?}\n actual   {:?}",
            actual[name]
        );
    }
}

/// Error raised by [`FailingModel`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("fixture failure: {0}")]
pub struct FixtureError(pub String);

/// Model that fails after an optional delay.
#[derive(Debug, Clone)]
pub struct FailingModel {
    message: String,
    delay: Duration,
}

impl FailingModel {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn after(message: impl Into<String>, delay: Duration) -> Self {
        Self {
            message: message.into(),
            delay,
        }
    }
}

impl Model for FailingModel {
    fn simulate(
        &mut self,
        _sequences: &mut Sequences,
        _window: IndexWindow,
    ) -> std::result::Result<(), ModelError> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        Err(FixtureError(self.message.clone()).into())
    }
}

/// Model that panics.
#[derive(Debug, Clone)]
pub struct PanickingModel;

impl Model for PanickingModel {
    fn simulate(
        &mut self,
        _sequences: &mut Sequences,
        _window: IndexWindow,
    ) -> std::result::Result<(), ModelError> {
        panic!("boom");
    }
}

/// Model that copies its inlet sum to every outlet, step by step.
///
/// Receivers are added on top, which makes it handy for probing the values
/// a receiver sees.
#[derive(Debug, Clone, Default)]
pub struct PassThrough;

impl Model for PassThrough {
    fn simulate(
        &mut self,
        sequences: &mut Sequences,
        window: IndexWindow,
    ) -> std::result::Result<(), ModelError> {
        for t in window.range() {
            let value = sequences.sum(Role::Inlet, t) + sequences.sum(Role::Receiver, t);
            sequences.fill(Role::Outlet, t, value);
        }
        Ok(())
    }
}
