//! Worker pool for the parallel view.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use hydronet_foundation::IndexWindow;
use tracing::{debug, error, info, instrument};

use super::queue::SchedulerQueue;
use super::work;
use crate::error::{Error, Result};
use crate::network::Network;

/// Process every device of `queue` over `window` on `threads` workers.
///
/// Each device runs over the whole window at once, as soon as its same-step
/// dependencies have completed. Returns the first error any worker
/// recorded. A panicking model surfaces as [`Error::WorkerPanicked`]; other
/// workers finish the device they are on and then stop.
#[instrument(skip_all, name = "parallel", fields(devices = queue.len(), threads = threads))]
pub fn run_parallel(
    queue: &SchedulerQueue,
    network: &Network,
    window: IndexWindow,
    threads: usize,
) -> Result<()> {
    if threads == 0 {
        return Err(Error::InvalidConfig(
            "the worker pool needs at least one thread".into(),
        ));
    }
    if queue.is_empty() {
        return Ok(());
    }

    let started = Instant::now();
    queue.register();
    let outcome = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(threads);
        for worker in 0..threads {
            let spawned = thread::Builder::new()
                .name(format!("hydronet-worker-{worker}"))
                .spawn_scoped(scope, move || work_loop(queue, network, window, worker));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    error!(worker, %err, "failed to spawn worker thread");
                    queue.abort(Error::InvalidConfig(format!(
                        "failed to spawn worker thread: {err}"
                    )));
                    break;
                }
            }
        }

        let outcome = queue.join();
        queue.shutdown(handles.len());
        for handle in handles {
            if handle.join().is_err() {
                error!("worker thread panicked outside of device processing");
            }
        }
        outcome
    });

    match &outcome {
        Ok(()) => info!(elapsed = ?started.elapsed(), "parallel run finished"),
        Err(err) => error!(%err, "parallel run failed"),
    }
    outcome
}

fn work_loop(queue: &SchedulerQueue, network: &Network, window: IndexWindow, worker: usize) {
    let mut processed = 0usize;
    while let Some(ticket) = queue.take() {
        let device = ticket.device();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            work::process(network, device, window)
        }))
        .unwrap_or_else(|payload| {
            Err(Error::WorkerPanicked {
                device: device.clone(),
                message: panic_message(payload.as_ref()),
            })
        });

        match result {
            Ok(()) => {
                // A rejected completion has already aborted the run.
                if queue.complete(ticket).is_err() {
                    break;
                }
            }
            Err(err) => {
                queue.fail(ticket, err);
                break;
            }
        }
        processed += 1;
    }
    debug!(worker, processed, "worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
