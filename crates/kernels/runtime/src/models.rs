//! Reference models.
//!
//! Minimal causal models used by harnesses, benches and the demo binary. They
//! exercise every connection role without pretending to be physically
//! meaningful.

use std::collections::VecDeque;

use hydronet_foundation::IndexWindow;

use crate::error::ModelError;
use crate::network::{Model, Role, Sequences};

/// Errors raised by the reference models.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReferenceModelError {
    #[error("recession coefficient {0} outside [0, 1]")]
    InvalidCoefficient(f64),
}

/// Linear reservoir.
///
/// Each step the storage gains the summed inlet and input values, loses the
/// demand read through receivers (bounded by what is stored) and releases the
/// fraction `k` of the remainder:
///
/// - outlets share the release equally
/// - senders report the storage left after the release
/// - outputs report the amount withdrawn for the receivers' demand
#[derive(Debug, Clone)]
pub struct LinearStorage {
    k: f64,
    initial: f64,
    storage: f64,
}

impl LinearStorage {
    pub fn new(k: f64) -> Self {
        Self::with_storage(k, 0.0)
    }

    pub fn with_storage(k: f64, initial: f64) -> Self {
        Self {
            k,
            initial,
            storage: initial,
        }
    }

    pub fn storage(&self) -> f64 {
        self.storage
    }
}

impl Model for LinearStorage {
    fn simulate(
        &mut self,
        sequences: &mut Sequences,
        window: IndexWindow,
    ) -> Result<(), ModelError> {
        if !(0.0..=1.0).contains(&self.k) {
            return Err(ReferenceModelError::InvalidCoefficient(self.k).into());
        }
        let outlets = sequences.count(Role::Outlet);
        for t in window.range() {
            self.storage += sequences.sum(Role::Inlet, t) + sequences.sum(Role::Input, t);

            // NaN demand (missing external data) counts as no demand.
            let demand = sequences.sum(Role::Receiver, t).max(0.0);
            let withdrawn = demand.min(self.storage.max(0.0));
            self.storage -= withdrawn;

            let release = self.k * self.storage;
            self.storage -= release;

            if outlets > 0 {
                sequences.fill(Role::Outlet, t, release / outlets as f64);
            }
            sequences.fill(Role::Sender, t, self.storage);
            sequences.fill(Role::Output, t, withdrawn);
        }
        Ok(())
    }

    fn reset_conditions(&mut self) {
        self.storage = self.initial;
    }
}

/// Pure delay: the summed inlet and input values leave through the outlets
/// `delay` steps later.
#[derive(Debug, Clone)]
pub struct Lag {
    delay: usize,
    pipe: VecDeque<f64>,
}

impl Lag {
    pub fn new(delay: usize) -> Self {
        Self {
            delay,
            pipe: VecDeque::from(vec![0.0; delay]),
        }
    }
}

impl Model for Lag {
    fn simulate(
        &mut self,
        sequences: &mut Sequences,
        window: IndexWindow,
    ) -> Result<(), ModelError> {
        let outlets = sequences.count(Role::Outlet);
        for t in window.range() {
            let inflow = sequences.sum(Role::Inlet, t) + sequences.sum(Role::Input, t);
            self.pipe.push_back(inflow);
            let released = self.pipe.pop_front().unwrap_or(inflow);
            if outlets > 0 {
                sequences.fill(Role::Outlet, t, released / outlets as f64);
            }
            sequences.fill(Role::Output, t, inflow);
        }
        Ok(())
    }

    fn reset_conditions(&mut self) {
        self.pipe = VecDeque::from(vec![0.0; self.delay]);
    }
}
