//! MNA (Modified Nodal Analysis) transient solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Modified Nodal Analysis
//!
//! Each step assembles a system of equations Ax = z where:
//! - x contains node voltages and voltage-source branch currents
//! - A is the conductance/coefficient matrix
//! - z is the source vector
//!
//! With n non-ground nodes and m voltage sources the matrix is (n+m)×(n+m):
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ C   0 ] [ j ] = [ e ]
//! ```
//!
//! where:
//! - G is the conductance matrix (resistors and companion models)
//! - B, C connect voltage sources to nodes (C = Bᵀ)
//! - v holds node voltages, node id k at row k-1 (ground is not an unknown)
//! - j holds voltage source currents, in source creation order
//! - i is the sum of current injections into each node
//! - e is the vector of voltage source values at the step time
//!
//! Capacitors and inductors are replaced by a conductance in parallel with
//! a current source (the companion model) derived from the previous step.

mod lu;
mod mna;
mod simulator;

pub use lu::{solve, SingularSystem};
pub use mna::{companion_of, previous_voltage, stamp_elements, MnaSystem, StampContext};
pub use simulator::{SimState, Simulator, SimulatorConfig};

/// Relative pivot threshold: a pivot no larger than this times the largest
/// entry of its column marks the system as singular.
pub const PIVOT_TOLERANCE: f64 = 1e-13;
