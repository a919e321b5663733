//! Time-indexed value history for nodes and storage elements.

use std::collections::VecDeque;

use super::types::Sample;
use crate::error::{Result, SimError};

/// Append-only sequence of per-step values.
///
/// Index 0 is the initial condition; every committed step appends one value.
/// With a capacity the oldest values are evicted, but indices stay absolute:
/// after `k` pushes the latest value is always at index `k`.
#[derive(Debug, Clone)]
pub struct History {
    values: VecDeque<f64>,
    /// Absolute index of `values[0]`
    first: usize,
    capacity: Option<usize>,
}

impl History {
    /// Create an unbounded history holding only the initial value.
    pub fn new(initial: f64) -> Self {
        Self::with_capacity(initial, None)
    }

    /// Create a history that keeps at most `capacity` values (minimum 1).
    pub fn with_capacity(initial: f64, capacity: Option<usize>) -> Self {
        let capacity = capacity.map(|c| c.max(1));
        let mut values = VecDeque::with_capacity(capacity.unwrap_or(16).min(1024));
        values.push_back(initial);
        Self {
            values,
            first: 0,
            capacity,
        }
    }

    /// Append the value for the next step.
    pub fn push(&mut self, value: f64) {
        if let Some(cap) = self.capacity {
            while self.values.len() >= cap {
                self.values.pop_front();
                self.first += 1;
            }
        }
        self.values.push_back(value);
    }

    /// The most recently appended value.
    pub fn latest(&self) -> f64 {
        // Never empty: constructed with the initial value and never drained below one.
        self.values.back().copied().unwrap_or(0.0)
    }

    /// Absolute index of the latest value.
    pub fn last_index(&self) -> usize {
        self.first + self.values.len() - 1
    }

    /// Absolute index of the oldest retained value.
    pub fn first_index(&self) -> usize {
        self.first
    }

    /// Number of values currently retained.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false: a history holds at least its initial value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at an absolute index, if retained.
    pub fn get(&self, index: usize) -> Option<f64> {
        index
            .checked_sub(self.first)
            .and_then(|offset| self.values.get(offset))
            .copied()
    }

    /// Resolve a query against this history.
    pub fn at(&self, sample: Sample) -> Result<f64> {
        match sample {
            Sample::Latest => Ok(self.latest()),
            Sample::Step(index) => self.get(index).ok_or(SimError::QueryOutOfRange {
                index,
                first: self.first_index(),
                last: self.last_index(),
            }),
        }
    }

    /// Iterate over retained values, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}
