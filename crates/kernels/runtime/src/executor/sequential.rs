//! Sequential stepping on the calling thread.

use std::time::Instant;

use hydronet_foundation::{Device, IndexWindow};
use tracing::{debug, instrument};

use super::work;
use crate::error::Result;
use crate::network::Network;

/// Step `order` through `window` one index at a time.
///
/// For every step, each device runs over `[t, t + 1)` in the given order, so
/// a receiver sees values its upstream devices produced in the same step.
#[instrument(skip_all, name = "sequential", fields(devices = order.len(), start = window.start, end = window.end))]
pub fn run_sequential(network: &Network, order: &[Device], window: IndexWindow) -> Result<()> {
    if order.is_empty() {
        return Ok(());
    }
    let started = Instant::now();
    for t in window.range() {
        let step = IndexWindow::step(t);
        for device in order {
            work::process(network, device, step)?;
        }
    }
    debug!(elapsed = ?started.elapsed(), "sequential stepping finished");
    Ok(())
}
