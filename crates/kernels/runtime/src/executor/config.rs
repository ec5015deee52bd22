//! Run configuration.

use std::thread;

use hydronet_foundation::IndexWindow;
use serde::{Deserialize, Serialize};

use super::queue::QueueDiscipline;
use crate::error::{Error, Result};

/// Settings for one [`Simulator`](super::Simulator).
///
/// Passed in explicitly; nothing is read from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Worker threads. `0` steps the whole network on the calling thread.
    pub threads: usize,
    /// Index window to simulate. `None` means the full horizon.
    pub window: Option<IndexWindow>,
    /// Hand-out order of ready devices.
    pub discipline: QueueDiscipline,
    /// Reset model conditions before each run.
    pub reset_conditions: bool,
    /// Rebuild graph, partition, and queue even if the network is unchanged.
    pub force_rebuild: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            window: None,
            discipline: QueueDiscipline::default(),
            reset_conditions: true,
            force_rebuild: false,
        }
    }
}

impl RunConfig {
    /// Step everything on the calling thread.
    pub fn sequential() -> Self {
        Self::default()
    }

    /// One worker per available core.
    pub fn auto() -> Self {
        let threads = thread::available_parallelism().map_or(1, usize::from);
        Self::default().with_threads(threads)
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_window(mut self, window: IndexWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_discipline(mut self, discipline: QueueDiscipline) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_reset_conditions(mut self, reset: bool) -> Self {
        self.reset_conditions = reset;
        self
    }

    pub fn with_force_rebuild(mut self, force: bool) -> Self {
        self.force_rebuild = force;
        self
    }

    /// Check the configuration against a network horizon and return the
    /// window to simulate.
    pub fn validate(&self, horizon: usize) -> Result<IndexWindow> {
        let window = self.window.unwrap_or_else(|| IndexWindow::full(horizon));
        if window.start > window.end {
            return Err(Error::InvalidConfig(format!(
                "window start {} is after its end {}",
                window.start, window.end
            )));
        }
        if !window.fits(horizon) {
            return Err(Error::InvalidConfig(format!(
                "window {}..{} exceeds horizon {horizon}",
                window.start, window.end
            )));
        }
        Ok(window)
    }
}
