//! # Stepspice Core
//!
//! A fixed-step transient circuit simulator built on Modified Nodal Analysis.
//!
//! This library provides:
//! - A circuit graph of nodes and two-terminal elements (R, C, L, V, I)
//! - DC and piecewise-linear (PWL) independent sources
//! - Backward-Euler and trapezoidal companion models for capacitors and inductors
//! - Per-node and per-element result histories, optionally capped
//! - A SPICE-like netlist loader and textual reporting
//!
//! ## Architecture
//!
//! - [`netlist`] - Parser for the netlist format
//! - [`circuit`] - Circuit graph, node/element histories and validation
//! - [`elements`] - Element models and source waveforms
//! - [`solver`] - MNA assembly, dense LU solve and the stepping engine
//! - [`report`] - Node/element summaries and the per-step table writer
//!
//! ## Usage
//!
//! ```
//! use stepspice_core::{Circuit, Simulator, SimulatorConfig};
//! use stepspice_core::circuit::Sample;
//! use stepspice_core::elements::Waveform;
//!
//! let mut b = Circuit::builder();
//! let gnd = b.ground();
//! let n1 = b.node(1, "out");
//! b.voltage_source("V1", n1, gnd, Waveform::dc(5.0))?;
//! b.resistor("R1", n1, gnd, 10.0)?;
//!
//! let mut sim = Simulator::with_config(b.build()?, SimulatorConfig::new(1e-6))?;
//! sim.run(10)?;
//! assert!((sim.node_voltage(n1, Sample::Latest)? - 5.0).abs() < 1e-9);
//! # Ok::<(), stepspice_core::SimError>(())
//! ```
//!
//! ## Simulation Method
//!
//! For each step k at time k·dt:
//!
//! 1. Assemble the system matrix A and source vector z from the latest
//!    committed node voltages and element currents
//! 2. Solve Ax = z for node voltages and voltage-source branch currents
//! 3. Append the results to every node and storage element history
//!
//! A step that hits a singular matrix commits nothing and halts the simulator.

pub mod circuit;
pub mod elements;
pub mod error;
pub mod netlist;
pub mod report;
pub mod solver;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use error::{Result, SimError};
pub use solver::{Simulator, SimulatorConfig};

/// Default time step in seconds
pub const DEFAULT_TIME_STEP: f64 = 1e-6;

/// Default number of steps run by the CLI when neither `.tran` nor `--steps` gives one
pub const DEFAULT_STEPS: usize = 1000;
