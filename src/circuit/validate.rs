//! Circuit validation.

use crate::error::{Result, SimError};

use super::Circuit;

/// Validate a circuit for simulation.
///
/// Checks:
/// - The circuit has at least one element
/// - Every node is connected to ground through some chain of elements
///
/// The simulator does not require this; a floating node is otherwise reported
/// as a singular matrix at the first step.
pub fn validate_circuit(circuit: &Circuit) -> Result<()> {
    if circuit.elements().is_empty() {
        return Err(SimError::InvalidTopology {
            message: "Circuit has no elements".to_string(),
        });
    }

    // Flood fill from ground over the element graph
    let num_nodes = circuit.num_nodes();
    let mut adjacency = vec![Vec::new(); num_nodes];
    for element in circuit.elements() {
        let [a, b] = element.nodes();
        adjacency[a.0].push(b.0);
        adjacency[b.0].push(a.0);
    }

    let mut reached = vec![false; num_nodes];
    let mut stack = vec![0usize];
    reached[0] = true;
    while let Some(n) = stack.pop() {
        for &next in &adjacency[n] {
            if !reached[next] {
                reached[next] = true;
                stack.push(next);
            }
        }
    }

    if let Some(floating) = reached.iter().position(|r| !r) {
        return Err(SimError::FloatingNode {
            node: circuit.nodes()[floating].name.clone(),
        });
    }

    Ok(())
}
