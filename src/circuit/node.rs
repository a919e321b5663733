//! Circuit nodes.

use super::history::History;
use super::types::{NodeId, Sample};
use crate::error::Result;

/// An electrical node with its solved voltage history.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    voltages: History,
}

impl Node {
    /// Create a node whose history starts at 0 V.
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            voltages: History::new(0.0),
        }
    }

    /// Whether this is the ground node.
    pub fn is_ground(&self) -> bool {
        self.id.is_ground()
    }

    /// Voltage at the requested history entry.
    pub fn voltage(&self, at: Sample) -> Result<f64> {
        self.voltages.at(at)
    }

    /// Most recently committed voltage.
    pub fn latest_voltage(&self) -> f64 {
        self.voltages.latest()
    }

    /// The full voltage history.
    pub fn history(&self) -> &History {
        &self.voltages
    }

    pub(crate) fn set_history_limit(&mut self, limit: Option<usize>) {
        self.voltages = History::with_capacity(self.voltages.latest(), limit);
    }

    /// Append the voltage solved for the next step. Ground always records 0.
    pub(crate) fn push_voltage(&mut self, voltage: f64) {
        let v = if self.is_ground() { 0.0 } else { voltage };
        self.voltages.push(v);
    }
}
