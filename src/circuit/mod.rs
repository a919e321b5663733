//! Circuit topology and validation.
//!
//! This module provides the internal representation of a circuit: the
//! [`Circuit`] struct owns all nodes and elements, and each node and storage
//! element carries the [`History`] of its solved values.

mod graph;
mod history;
mod node;
mod types;
mod validate;

pub use graph::{Circuit, CircuitBuilder};
pub use history::History;
pub use node::Node;
pub use types::*;
pub use validate::validate_circuit;
