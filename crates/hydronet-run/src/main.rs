//! Hydronet Run - Simulates a synthetic river network
//!
//! This binary builds a river network, runs it once per requested worker
//! count, logs timings and partition sizes, and checks that every run
//! produced the same node series as the first one.

mod river;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use hydronet_foundation::{DeployMode, same_values};
use hydronet_runtime::{Network, RunConfig, Simulator};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use river::{RiverShape, synthesize};

#[derive(Parser, Debug)]
#[command(name = "hydronet-run")]
#[command(about = "Run a synthetic river network under several worker counts")]
struct Cli {
    /// Number of tributaries
    #[arg(long, default_value = "64")]
    branches: usize,

    /// Number of time steps
    #[arg(long, default_value = "1000")]
    horizon: usize,

    /// Worker counts to compare (0 = sequential on the calling thread)
    #[arg(long, value_delimiter = ',', default_value = "0,1,2,4")]
    threads: Vec<usize>,

    /// Deploy mode of the outlet node
    #[arg(long, default_value = "fresh")]
    outlet_mode: DeployMode,

    /// JSON file with a base run configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hydronet_run=info,hydronet_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let base = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load run configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shape = RiverShape {
        horizon: cli.horizon,
        branches: cli.branches,
        outlet_mode: cli.outlet_mode,
    };
    info!(?shape, "Synthesizing river network");

    let mut reference: Option<(usize, Vec<Vec<f64>>)> = None;
    let mut mismatches = 0;
    for &threads in &cli.threads {
        let mut network = match synthesize(shape) {
            Ok(network) => network,
            Err(e) => {
                error!("Failed to build network: {e}");
                return ExitCode::FAILURE;
            }
        };

        let mut simulator = Simulator::new(base.clone().with_threads(threads));
        let report = match simulator.simulate(&mut network) {
            Ok(report) => report,
            Err(e) => {
                error!(threads, "Run failed: {e}");
                return ExitCode::FAILURE;
            }
        };
        info!(
            threads,
            parallel = report.parallel_devices,
            sequential = report.sequential_devices,
            transition = report.transition_nodes,
            elapsed = ?report.elapsed,
            "Run finished"
        );

        let series = snapshot(&network);
        match &reference {
            None => reference = Some((threads, series)),
            Some((reference_threads, expected)) => {
                if !same_series(expected, &series) {
                    warn!(
                        threads,
                        reference = reference_threads,
                        "Node series differ from the reference run"
                    );
                    mismatches += 1;
                }
            }
        }
    }

    if mismatches > 0 {
        error!(mismatches, "Runs disagree");
        return ExitCode::FAILURE;
    }
    info!("All runs agree");
    ExitCode::SUCCESS
}

fn load_config(path: Option<&PathBuf>) -> Result<RunConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(RunConfig::default());
    };
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn snapshot(network: &Network) -> Vec<Vec<f64>> {
    network
        .node_ids()
        .filter_map(|id| network.node(id).ok())
        .map(|node| node.simulated().to_vec())
        .collect()
}

fn same_series(left: &[Vec<f64>], right: &[Vec<f64>]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(l, r)| same_values(l, r))
}
