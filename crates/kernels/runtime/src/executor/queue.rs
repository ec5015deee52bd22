//! Dependency-counted work queue.
//!
//! The queue structure (which devices start a run, how many same-step
//! dependencies each device has, whom to notify on completion) is computed
//! once per partition and shared between runs. The per-run state (waiting
//! counters, ready items, first error) lives behind one mutex and is reset by
//! [`SchedulerQueue::register`].
//!
//! # Protocol
//!
//! ```text
//! register() ─▶ workers: take() ─▶ complete()/fail() ─▶ ... ─▶ take() == None
//!           └─▶ caller:  join() ─▶ shutdown(workers)
//! ```

use std::cmp::Reverse;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use hydronet_foundation::Device;

use crate::dag::{NetworkGraph, Partition};
use crate::error::{Error, Result};

/// Order in which ready devices are handed to workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueDiscipline {
    /// Oldest ready device first. Starters go out in descending descendant
    /// count.
    #[default]
    Fifo,
    /// Most recently readied device first.
    Lifo,
}

/// Run ids are unique across all queues, so a ticket cannot be redeemed in a
/// later run or on a sibling queue sharing the same structure.
static NEXT_RUN: AtomicU64 = AtomicU64::new(1);

/// A device handed out by [`SchedulerQueue::take`].
///
/// Must be given back through exactly one of `complete` or `fail`, both of
/// which consume it.
#[derive(Debug)]
pub struct Ticket {
    slot: usize,
    run: u64,
    device: Device,
}

impl Ticket {
    pub fn device(&self) -> &Device {
        &self.device
    }
}

#[derive(Debug)]
struct QueueStructure {
    devices: IndexSet<Device>,
    starters: Vec<usize>,
    dependencies: Vec<usize>,
    downstream: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Device(usize),
    Shutdown,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Slot>,
    waiting: Vec<usize>,
    unfinished: usize,
    running: usize,
    first_error: Option<Error>,
    run: u64,
    registered: bool,
    aborted: bool,
}

impl QueueState {
    fn settled(&self) -> bool {
        self.unfinished == 0 || (self.aborted && self.running == 0)
    }

    /// Account for a ticket coming back, in either direction.
    fn retire(&mut self, ticket: &Ticket) -> std::result::Result<(), String> {
        if ticket.run != self.run {
            return Err(format!("{} was handed out by another run", ticket.device));
        }
        self.running = self
            .running
            .checked_sub(1)
            .ok_or_else(|| format!("{} returned with no device running", ticket.device))?;
        Ok(())
    }
}

/// Blocking work queue over the parallel view of a partition.
#[derive(Debug)]
pub struct SchedulerQueue {
    structure: Arc<QueueStructure>,
    discipline: QueueDiscipline,
    state: Mutex<QueueState>,
    ready: Condvar,
    idle: Condvar,
}

impl SchedulerQueue {
    /// Precompute the queue structure for `partition`'s parallel view.
    ///
    /// A device depends on each distinct direct predecessor inside the view
    /// that forwards fresh values. A fresh predecessor outside the view means
    /// the partition does not belong to `graph` and is reported as
    /// [`Error::QueueMisuse`]; a dependency loop inside the view is reported
    /// as [`Error::CycleDetected`].
    pub fn from_partition(
        graph: &NetworkGraph,
        partition: &Partition,
        discipline: QueueDiscipline,
    ) -> Result<Self> {
        let view = partition.parallel_view();
        let devices: IndexSet<Device> = graph
            .devices()
            .filter(|device| view.contains(*device))
            .cloned()
            .collect();

        let mut dependencies = vec![0; devices.len()];
        let mut downstream = vec![Vec::new(); devices.len()];
        let mut descendants = vec![0; devices.len()];
        for (slot, device) in devices.iter().enumerate() {
            let idx = graph
                .index_of(device)
                .ok_or_else(|| Error::NotFound(device.clone()))?;
            descendants[slot] = graph.descendant_count(idx);
            let upstream: BTreeSet<usize> = graph
                .predecessor_edges(idx)
                .iter()
                .map(|edge| edge.vertex)
                .filter(|&pred| graph.forwards_fresh(pred))
                .collect();
            for pred in upstream {
                let pred_device = graph.device(pred);
                let Some(pred_slot) = devices.get_index_of(pred_device) else {
                    return Err(Error::QueueMisuse(format!(
                        "{device} depends on {pred_device}, which is outside the parallel view"
                    )));
                };
                dependencies[slot] += 1;
                downstream[pred_slot].push(slot);
            }
        }

        let mut starters: Vec<usize> = (0..devices.len())
            .filter(|&slot| dependencies[slot] == 0)
            .collect();
        starters.sort_by_key(|&slot| (Reverse(descendants[slot]), slot));

        let structure = QueueStructure {
            devices,
            starters,
            dependencies,
            downstream,
        };
        structure.check_acyclic()?;

        debug!(
            devices = structure.devices.len(),
            starters = structure.starters.len(),
            ?discipline,
            "scheduler queue built"
        );
        Ok(Self::with_structure(Arc::new(structure), discipline))
    }

    /// A queue sharing this queue's structure, with fresh run state.
    pub fn from_existing(&self) -> Self {
        Self::with_structure(Arc::clone(&self.structure), self.discipline)
    }

    /// Same structure, different discipline.
    pub fn with_discipline(&self, discipline: QueueDiscipline) -> Self {
        Self::with_structure(Arc::clone(&self.structure), discipline)
    }

    fn with_structure(structure: Arc<QueueStructure>, discipline: QueueDiscipline) -> Self {
        Self {
            structure,
            discipline,
            state: Mutex::new(QueueState::default()),
            ready: Condvar::new(),
            idle: Condvar::new(),
        }
    }

    pub fn discipline(&self) -> QueueDiscipline {
        self.discipline
    }

    /// Number of devices in the parallel view.
    pub fn len(&self) -> usize {
        self.structure.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structure.devices.is_empty()
    }

    /// Devices without same-step dependencies, in hand-out order for FIFO.
    pub fn starters(&self) -> Vec<&Device> {
        self.structure
            .starters
            .iter()
            .map(|&slot| &self.structure.devices[slot])
            .collect()
    }

    /// Same-step dependency count of `device`, if it is queued at all.
    pub fn dependencies(&self, device: &Device) -> Option<usize> {
        self.structure
            .devices
            .get_index_of(device)
            .map(|slot| self.structure.dependencies[slot])
    }

    /// Devices notified when `device` completes.
    pub fn downstream(&self, device: &Device) -> Vec<&Device> {
        self.structure
            .devices
            .get_index_of(device)
            .map(|slot| {
                self.structure.downstream[slot]
                    .iter()
                    .map(|&next| &self.structure.devices[next])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Reset the run state and enqueue the starters.
    pub fn register(&self) {
        let mut state = self.state.lock();
        state.waiting.clone_from(&self.structure.dependencies);
        state.ready = self
            .structure
            .starters
            .iter()
            .map(|&slot| Slot::Device(slot))
            .collect();
        state.unfinished = self.structure.devices.len();
        state.running = 0;
        state.first_error = None;
        state.run = NEXT_RUN.fetch_add(1, Ordering::Relaxed);
        state.registered = true;
        state.aborted = false;
        trace!(starters = state.ready.len(), "queue registered");
        drop(state);
        self.ready.notify_all();
    }

    /// Block until a device is ready or the queue is shut down.
    ///
    /// Returns `None` on shutdown.
    pub fn take(&self) -> Option<Ticket> {
        let mut state = self.state.lock();
        loop {
            let slot = match self.discipline {
                QueueDiscipline::Fifo => state.ready.pop_front(),
                QueueDiscipline::Lifo => state.ready.pop_back(),
            };
            match slot {
                Some(Slot::Device(slot)) => {
                    state.running += 1;
                    return Some(Ticket {
                        slot,
                        run: state.run,
                        device: self.structure.devices[slot].clone(),
                    });
                }
                Some(Slot::Shutdown) => return None,
                None => self.ready.wait(&mut state),
            }
        }
    }

    /// Mark a ticket's device as done and release its downstream devices.
    ///
    /// A ticket from another run, a downstream counter that would drop below
    /// zero, or a run with nothing left to finish is reported as
    /// [`Error::QueueMisuse`]. The misuse also aborts the run, so `join`
    /// returns it instead of settling early.
    pub fn complete(&self, ticket: Ticket) -> Result<()> {
        let mut state = self.state.lock();
        if let Err(message) = state.retire(&ticket) {
            return Err(self.misuse(&mut state, message));
        }
        let Some(unfinished) = state.unfinished.checked_sub(1) else {
            let message = format!("{} completed after the run finished", ticket.device);
            return Err(self.misuse(&mut state, message));
        };
        state.unfinished = unfinished;

        let downstream = &self.structure.downstream[ticket.slot];
        if !state.aborted {
            if let Some(&next) = downstream.iter().find(|&&next| state.waiting[next] == 0) {
                let message = format!(
                    "completing {} would release {} twice",
                    ticket.device, self.structure.devices[next]
                );
                return Err(self.misuse(&mut state, message));
            }
            let mut released = 0;
            for &next in downstream {
                state.waiting[next] -= 1;
                if state.waiting[next] == 0 {
                    state.ready.push_back(Slot::Device(next));
                    released += 1;
                }
            }
            if released > 0 {
                self.ready.notify_all();
            }
        }
        trace!(device = %ticket.device, unfinished = state.unfinished, "device complete");
        if state.settled() {
            self.idle.notify_all();
        }
        Ok(())
    }

    /// Record a failure for a ticket's device and abort the run.
    ///
    /// Only the first recorded error is kept. Devices not yet handed out are
    /// dropped; devices already running finish on their own.
    pub fn fail(&self, ticket: Ticket, error: Error) {
        let mut state = self.state.lock();
        if let Err(message) = state.retire(&ticket) {
            self.misuse(&mut state, message);
        }
        debug!(device = %ticket.device, %error, "device failed");
        self.record(&mut state, error);
    }

    fn misuse(&self, state: &mut QueueState, message: String) -> Error {
        warn!(%message, "scheduler queue misuse");
        self.record(state, Error::QueueMisuse(message.clone()));
        Error::QueueMisuse(message)
    }

    /// Abort the run without a ticket, e.g. when a worker could not start.
    pub fn abort(&self, error: Error) {
        let mut state = self.state.lock();
        self.record(&mut state, error);
    }

    fn record(&self, state: &mut QueueState, error: Error) {
        if state.first_error.is_none() {
            state.first_error = Some(error);
        }
        state.aborted = true;
        state.ready.retain(|slot| matches!(slot, Slot::Shutdown));
        self.idle.notify_all();
    }

    /// Block until the run settles, then return its first error, if any.
    ///
    /// A run settles when every device completed, or when it was aborted and
    /// no device is running any more.
    pub fn join(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.registered {
            return Err(Error::QueueMisuse("join() called before register()".into()));
        }
        while !state.settled() {
            self.idle.wait(&mut state);
        }
        state.registered = false;
        match state.first_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Release `workers` blocked or future `take` calls.
    pub fn shutdown(&self, workers: usize) {
        let mut state = self.state.lock();
        state
            .ready
            .extend(std::iter::repeat_n(Slot::Shutdown, workers));
        drop(state);
        self.ready.notify_all();
    }
}

impl QueueStructure {
    fn check_acyclic(&self) -> Result<()> {
        let mut waiting = self.dependencies.clone();
        let mut ready: Vec<usize> = self.starters.clone();
        let mut seen = 0;
        while let Some(slot) = ready.pop() {
            seen += 1;
            for &next in &self.downstream[slot] {
                waiting[next] -= 1;
                if waiting[next] == 0 {
                    ready.push(next);
                }
            }
        }
        if seen == self.devices.len() {
            return Ok(());
        }
        let devices = (0..self.devices.len())
            .filter(|&slot| waiting[slot] > 0)
            .map(|slot| self.devices[slot].clone())
            .collect();
        Err(Error::CycleDetected { devices })
    }
}
