//! Core types for circuit representation.

use std::fmt;

/// A unique identifier for a node in the circuit.
/// Node 0 is always ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The ground node (always index 0).
    pub const GROUND: NodeId = NodeId(0);

    /// Check if this is the ground node.
    pub fn is_ground(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "N{}", self.0)
        }
    }
}

/// A unique identifier for an element in the circuit.
/// Equal to the element's position in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Index of an auxiliary branch-current unknown (one per voltage source).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchId(pub usize);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I{}", self.0)
    }
}

/// Variable index in the MNA solution vector.
/// Can be either a node voltage or a branch current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarIndex {
    /// Node voltage variable
    Voltage(NodeId),
    /// Branch current variable (voltage sources)
    Current(BranchId),
}

impl VarIndex {
    /// Get the raw index into the solution vector.
    /// Node voltages come first (excluding ground), then branch currents.
    ///
    /// `num_nodes` counts every node including ground.
    pub fn to_index(&self, num_nodes: usize) -> usize {
        match self {
            // Node 0 (ground) is not in the matrix, so subtract 1
            VarIndex::Voltage(NodeId(n)) => {
                debug_assert!(*n > 0, "Ground node should not be in solution vector");
                n - 1
            }
            // Branch currents come after node voltages
            VarIndex::Current(BranchId(b)) => (num_nodes - 1) + b,
        }
    }
}

/// Which entry of a time-indexed history a query refers to.
///
/// `Latest` is the default query mode used by reporting code. `Step(0)` is the
/// initial condition before the first step; `Step(k)` is the state solved at
/// time `k * dt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sample {
    /// The most recently committed value.
    #[default]
    Latest,
    /// An absolute history index.
    Step(usize),
}

impl Sample {
    /// Convert a signed step index where `-1` means "latest".
    ///
    /// Returns `None` for any other negative value.
    pub fn from_signed(index: i64) -> Option<Self> {
        match index {
            -1 => Some(Sample::Latest),
            i if i >= 0 => Some(Sample::Step(i as usize)),
            _ => None,
        }
    }
}

impl From<usize> for Sample {
    fn from(index: usize) -> Self {
        Sample::Step(index)
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sample::Latest => write!(f, "latest"),
            Sample::Step(k) => write!(f, "step {}", k),
        }
    }
}
