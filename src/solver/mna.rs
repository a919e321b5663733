//! MNA system assembly.

use crate::circuit::{Circuit, NodeId};
use crate::elements::{Companion, Element, IntegrationMethod};

/// Per-step inputs to the stamping pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampContext {
    /// Index of the step being assembled (1 for the first step)
    pub step: usize,
    /// Fixed time step
    pub dt: f64,
    /// Simulated time of the step being assembled
    pub time: f64,
    /// Companion-model integration rule
    pub method: IntegrationMethod,
}

/// MNA linear system Ax = z.
#[derive(Debug, Clone, PartialEq)]
pub struct MnaSystem {
    /// System matrix A (row-major)
    pub a: Vec<f64>,
    /// Source vector z
    pub z: Vec<f64>,
    /// Matrix dimension
    pub size: usize,
}

impl MnaSystem {
    /// Create a zeroed system of the given dimension.
    pub fn new(size: usize) -> Self {
        Self {
            a: vec![0.0; size * size],
            z: vec![0.0; size],
            size,
        }
    }

    /// Assemble the system for one step of `circuit`.
    pub fn assemble(circuit: &Circuit, ctx: &StampContext) -> Self {
        let mut system = Self::new(circuit.matrix_size());
        stamp_elements(circuit, &mut system, ctx);
        system
    }

    /// Get matrix element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.a[row * self.size + col]
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.a[row * self.size + col] += value;
    }

    /// Add to source vector element.
    pub fn add_source(&mut self, row: usize, value: f64) {
        self.z[row] += value;
    }

    /// Stamp a conductance between two nodes.
    /// For a conductance G between nodes n1 and n2:
    ///   A[n1,n1] += G
    ///   A[n2,n2] += G
    ///   A[n1,n2] -= G
    ///   A[n2,n1] -= G
    pub fn stamp_conductance(&mut self, n1: Option<usize>, n2: Option<usize>, g: f64) {
        if let Some(i) = n1 {
            self.add(i, i, g);
        }
        if let Some(j) = n2 {
            self.add(j, j, g);
        }
        if let (Some(i), Some(j)) = (n1, n2) {
            self.add(i, j, -g);
            self.add(j, i, -g);
        }
    }

    /// Stamp a voltage source between two nodes with branch current at index br.
    /// V[n+] - V[n-] = E
    pub fn stamp_voltage_source(&mut self, n_pos: Option<usize>, n_neg: Option<usize>, br: usize, voltage: f64) {
        if let Some(i) = n_pos {
            self.add(br, i, 1.0);
            self.add(i, br, 1.0);
        }
        if let Some(j) = n_neg {
            self.add(br, j, -1.0);
            self.add(j, br, -1.0);
        }
        self.z[br] = voltage;
    }

    /// Stamp a current source between two nodes.
    /// Current flows from n+ through the source to n-.
    pub fn stamp_current_source(&mut self, n_pos: Option<usize>, n_neg: Option<usize>, current: f64) {
        // Current leaves n+ and enters n-
        if let Some(i) = n_pos {
            self.add_source(i, -current);
        }
        if let Some(j) = n_neg {
            self.add_source(j, current);
        }
    }
}

/// Voltage across an element at the latest committed step.
///
/// A capacitor that has not been stepped yet reports its initial voltage.
pub fn previous_voltage(circuit: &Circuit, element: &Element) -> f64 {
    if let Element::Capacitor(c) = element {
        if c.history().last_index() == 0 {
            return c.initial_voltage;
        }
    }
    let [a, b] = element.nodes();
    latest(circuit, a) - latest(circuit, b)
}

fn latest(circuit: &Circuit, node: NodeId) -> f64 {
    circuit.node(node).map(|n| n.latest_voltage()).unwrap_or(0.0)
}

/// Companion model of a storage element for the step described by `ctx`.
/// `None` for elements without one.
///
/// The trapezoidal rule needs the current at the previous step, which is not
/// known before the first step, so the first step always uses backward Euler.
pub fn companion_of(circuit: &Circuit, element: &Element, ctx: &StampContext) -> Option<Companion> {
    let method = if ctx.step <= 1 {
        IntegrationMethod::BackwardEuler
    } else {
        ctx.method
    };
    match element {
        Element::Capacitor(c) => Some(c.companion(ctx.dt, method, previous_voltage(circuit, element))),
        Element::Inductor(l) => Some(l.companion(ctx.dt, method, previous_voltage(circuit, element))),
        _ => None,
    }
}

/// Stamp every element into the MNA system, in creation order.
pub fn stamp_elements(circuit: &Circuit, system: &mut MnaSystem, ctx: &StampContext) {
    for element in circuit.elements() {
        let [a, b] = element.nodes();
        let n1 = circuit.node_index(a);
        let n2 = circuit.node_index(b);

        match element {
            Element::Resistor(r) => {
                system.stamp_conductance(n1, n2, r.conductance());
            }

            Element::Capacitor(_) | Element::Inductor(_) => {
                if let Some(model) = companion_of(circuit, element, ctx) {
                    system.stamp_conductance(n1, n2, model.conductance);
                    system.stamp_current_source(n1, n2, model.source);
                }
            }

            Element::VoltageSource(v) => {
                let br = circuit.branch_index(v.branch);
                system.stamp_voltage_source(n1, n2, br, v.voltage_at(ctx.time));
            }

            Element::CurrentSource(i) => {
                system.stamp_current_source(n1, n2, i.current_at(ctx.time));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::Waveform;
    use approx::assert_relative_eq;

    fn ctx() -> StampContext {
        StampContext {
            step: 1,
            dt: 1e-3,
            time: 1e-3,
            method: IntegrationMethod::BackwardEuler,
        }
    }

    #[test]
    fn test_resistor_stamp_pattern() {
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "a");
        let n2 = b.node(2, "b");
        b.resistor("R1", n1, n2, 2.0).unwrap();
        b.resistor("R2", n2, gnd, 4.0).unwrap();
        let sys = MnaSystem::assemble(&b.build().unwrap(), &ctx());

        assert_eq!(sys.size, 2);
        assert_relative_eq!(sys.get(0, 0), 0.5);
        assert_relative_eq!(sys.get(0, 1), -0.5);
        assert_relative_eq!(sys.get(1, 0), -0.5);
        assert_relative_eq!(sys.get(1, 1), 0.75);
        assert!(sys.z.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_voltage_source_stamp() {
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "a");
        b.voltage_source("V1", n1, gnd, Waveform::dc(5.0)).unwrap();
        b.resistor("R1", n1, gnd, 10.0).unwrap();
        let sys = MnaSystem::assemble(&b.build().unwrap(), &ctx());

        // [ g  1 ] [v1]   [0]
        // [ 1  0 ] [ j] = [5]
        assert_eq!(sys.size, 2);
        assert_relative_eq!(sys.get(0, 0), 0.1);
        assert_relative_eq!(sys.get(0, 1), 1.0);
        assert_relative_eq!(sys.get(1, 0), 1.0);
        assert_relative_eq!(sys.get(1, 1), 0.0);
        assert_relative_eq!(sys.z[1], 5.0);
    }

    #[test]
    fn test_current_source_and_pwl_time() {
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "a");
        b.current_source("I1", gnd, n1, Waveform::pwl(vec![(0.0, 0.0), (2e-3, 4.0)]))
            .unwrap();
        b.resistor("R1", n1, gnd, 1.0).unwrap();
        let sys = MnaSystem::assemble(&b.build().unwrap(), &ctx());

        // 2 A injected into node a at t = 1 ms
        assert_relative_eq!(sys.z[0], 2.0);
    }

    #[test]
    fn test_capacitor_companion_uses_initial_voltage() {
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "a");
        b.capacitor("C1", n1, gnd, 1e-3, 3.0).unwrap();
        b.resistor("R1", n1, gnd, 1.0).unwrap();
        let sys = MnaSystem::assemble(&b.build().unwrap(), &ctx());

        // g_eq = C/dt = 1, i_eq = -3 -> z[a] = +3
        assert_relative_eq!(sys.get(0, 0), 2.0);
        assert_relative_eq!(sys.z[0], 3.0);
    }

    #[test]
    fn test_trapezoidal_after_first_step() {
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "a");
        b.capacitor("C1", n1, gnd, 1e-3, 0.0).unwrap();
        b.resistor("R1", n1, gnd, 1.0).unwrap();
        let circuit = b.build().unwrap();

        let mut trap = StampContext {
            method: IntegrationMethod::Trapezoidal,
            ..ctx()
        };
        assert_relative_eq!(MnaSystem::assemble(&circuit, &trap).get(0, 0), 2.0);
        trap.step = 2;
        assert_relative_eq!(MnaSystem::assemble(&circuit, &trap).get(0, 0), 3.0);
    }

    #[test]
    fn test_ground_row_never_written() {
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "a");
        b.current_source("I1", n1, gnd, Waveform::dc(1.0)).unwrap();
        b.resistor("R1", gnd, n1, 1.0).unwrap();
        let sys = MnaSystem::assemble(&b.build().unwrap(), &ctx());
        assert_eq!(sys.a.len(), 1);
        assert_relative_eq!(sys.z[0], -1.0);
    }
}
