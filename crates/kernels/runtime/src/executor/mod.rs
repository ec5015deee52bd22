//! Network executor.
//!
//! Runs a [`Network`] over an index window. The [`Simulator`] keeps an
//! [`ExecutionPlan`] (graph, partition, queue structure, step orders) and
//! reuses it across runs until the network's revision changes.
//!
//! # Run Phases
//!
//! 1. **Prepare** - Validate the configuration, rebuild the plan if needed,
//!    reset per-run state
//! 2. **Parallel** - Worker pool processes the parallel view, each device
//!    over the whole window ([`run_parallel`])
//! 3. **Sequential** - The calling thread steps the sequential view one index
//!    at a time ([`run_sequential`])
//!
//! With `threads == 0` phase 2 is skipped and phase 3 steps every device.
//! Both paths produce identical node series.

mod config;
mod pool;
mod queue;
mod sequential;
pub mod work;


use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use hydronet_foundation::Device;
use tracing::{debug, info, instrument};

use crate::dag::{NetworkGraph, Partition, analyze, step_order};
use crate::error::Result;
use crate::network::Network;

pub use config::RunConfig;
pub use pool::run_parallel;
pub use queue::{QueueDiscipline, SchedulerQueue, Ticket};
pub use sequential::run_sequential;

/// Everything derived from a network's topology and deploy modes.
#[derive(Debug)]
pub struct ExecutionPlan {
    revision: u64,
    graph: NetworkGraph,
    partition: Partition,
    queue: SchedulerQueue,
    sequential_order: Vec<Device>,
    full_order: Vec<Device>,
}

impl ExecutionPlan {
    /// Analyze `network` and build the queue and step orders.
    pub fn build(network: &Network, discipline: QueueDiscipline) -> Result<Self> {
        let graph = NetworkGraph::build(network)?;
        let partition = analyze(&graph);
        let queue = SchedulerQueue::from_partition(&graph, &partition, discipline)?;
        let sequential_order = step_order(&graph, partition.sequential_view())?;
        let all: BTreeSet<Device> = graph.devices().cloned().collect();
        let full_order = step_order(&graph, &all)?;

        info!(
            revision = network.revision(),
            partition = %partition.summary(),
            starters = queue.starters().len(),
            "execution plan built"
        );
        Ok(Self {
            revision: network.revision(),
            graph,
            partition,
            queue,
            sequential_order,
            full_order,
        })
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn graph(&self) -> &NetworkGraph {
        &self.graph
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn queue(&self) -> &SchedulerQueue {
        &self.queue
    }

    /// Step order of the sequential view.
    pub fn sequential_order(&self) -> &[Device] {
        &self.sequential_order
    }

    /// Step order of the whole network.
    pub fn full_order(&self) -> &[Device] {
        &self.full_order
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub parallel_devices: usize,
    pub sequential_devices: usize,
    pub transition_nodes: usize,
    pub threads: usize,
    pub elapsed: Duration,
}

/// Runs a network, reusing its execution plan between runs.
#[derive(Debug, Default)]
pub struct Simulator {
    config: RunConfig,
    plan: Option<ExecutionPlan>,
    rebuilds: usize,
}

impl Simulator {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            plan: None,
            rebuilds: 0,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Replace the configuration, keeping the current plan.
    pub fn set_config(&mut self, config: RunConfig) {
        if let Some(plan) = &mut self.plan
            && plan.queue.discipline() != config.discipline
        {
            plan.queue = plan.queue.with_discipline(config.discipline);
        }
        self.config = config;
    }

    /// The current plan, if one was built.
    pub fn plan(&self) -> Option<&ExecutionPlan> {
        self.plan.as_ref()
    }

    /// How many times a plan was built.
    pub fn plan_rebuilds(&self) -> usize {
        self.rebuilds
    }

    /// Simulate `network` over the configured window.
    ///
    /// On error the node series may hold partial results of this run.
    #[instrument(skip_all, fields(threads = self.config.threads))]
    pub fn simulate(&mut self, network: &mut Network) -> Result<RunReport> {
        let started = Instant::now();
        let window = self.config.validate(network.horizon())?;
        let threads = self.config.threads;
        let reset_conditions = self.config.reset_conditions;
        let plan = self.prepare(network)?;
        network.begin_run(window, reset_conditions);

        let network: &Network = network;
        if threads == 0 {
            run_sequential(network, &plan.full_order, window)?;
        } else {
            let queue = plan.queue.from_existing();
            run_parallel(&queue, network, window, threads)?;
            run_sequential(network, &plan.sequential_order, window)?;
        }

        let report = RunReport {
            parallel_devices: if threads == 0 { 0 } else { plan.queue.len() },
            sequential_devices: if threads == 0 {
                plan.full_order.len()
            } else {
                plan.sequential_order.len()
            },
            transition_nodes: plan.partition.transition().len(),
            threads,
            elapsed: started.elapsed(),
        };
        info!(
            start = window.start,
            end = window.end,
            elapsed = ?report.elapsed,
            "simulation finished"
        );
        Ok(report)
    }

    fn prepare(&mut self, network: &Network) -> Result<&ExecutionPlan> {
        let plan = match self.plan.take() {
            Some(plan) if plan.revision == network.revision() && !self.config.force_rebuild => {
                debug!(revision = plan.revision, "reusing execution plan");
                plan
            }
            _ => {
                let plan = ExecutionPlan::build(network, self.config.discipline)?;
                self.rebuilds += 1;
                plan
            }
        };
        Ok(self.plan.insert(plan))
    }
}
