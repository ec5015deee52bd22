//! Simulation index windows.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Half-open range `[start, end)` of time-step indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IndexWindow {
    pub start: usize,
    pub end: usize,
}

impl IndexWindow {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Window covering a whole horizon of `len` steps.
    pub fn full(len: usize) -> Self {
        Self { start: 0, end: len }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Single-step window starting at `index`.
    pub fn step(index: usize) -> Self {
        Self {
            start: index,
            end: index + 1,
        }
    }

    /// Whether the window lies within a horizon of `len` steps.
    pub fn fits(&self, len: usize) -> bool {
        self.start <= self.end && self.end <= len
    }
}

impl From<Range<usize>> for IndexWindow {
    fn from(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}
