//! Main simulator interface.

use std::fmt;

use crate::circuit::{Circuit, ElementId, NodeId, Sample};
use crate::elements::{Element, IntegrationMethod};
use crate::error::{Result, SimError};

use super::lu;
use super::mna::{companion_of, MnaSystem, StampContext};
use crate::DEFAULT_TIME_STEP;

/// Configuration for the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Fixed time step in seconds, shared by the whole simulation.
    pub time_step: f64,
    /// Integration rule for capacitor and inductor companion models.
    pub method: IntegrationMethod,
    /// Maximum number of history entries kept per node/element.
    /// `None` keeps everything.
    pub history_limit: Option<usize>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            time_step: DEFAULT_TIME_STEP,
            method: IntegrationMethod::default(),
            history_limit: None,
        }
    }
}

impl SimulatorConfig {
    /// Create a new configuration with the given time step.
    pub fn new(time_step: f64) -> Self {
        Self {
            time_step,
            ..Self::default()
        }
    }

    /// Set the integration method.
    pub fn with_method(mut self, method: IntegrationMethod) -> Self {
        self.method = method;
        self
    }

    /// Keep at most `limit` history entries per node/element.
    ///
    /// Companion models only read the latest entry, so any limit >= 1 gives
    /// the same simulation results; older steps just stop being queryable.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(SimError::InvalidSimulationParam {
                message: format!("time step must be positive and finite, got {}", self.time_step),
            });
        }
        if self.history_limit == Some(0) {
            return Err(SimError::InvalidSimulationParam {
                message: "history limit must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Lifecycle of a simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    /// No step has been taken; histories hold only initial conditions.
    Uninitialized,
    /// At least one step has completed.
    Stepping,
    /// A step failed; committed results stay queryable but no further steps run.
    Halted { step: usize },
}

impl fmt::Display for SimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimState::Uninitialized => write!(f, "uninitialized"),
            SimState::Stepping => write!(f, "stepping"),
            SimState::Halted { step } => write!(f, "halted at step {}", step),
        }
    }
}

/// The transient circuit simulator.
///
/// Each [`Simulator::step`] assembles the MNA system from the latest
/// committed state, solves it, and appends the results to every node and
/// storage element. A step either commits completely or not at all.
#[derive(Debug, Clone)]
pub struct Simulator {
    /// The circuit being simulated
    circuit: Circuit,
    /// Simulation settings
    config: SimulatorConfig,
    /// Number of completed steps
    step_count: usize,
    /// Lifecycle state
    state: SimState,
    /// Solution vector of the latest step
    solution: Vec<f64>,
}

impl Simulator {
    /// Create a simulator with the default configuration.
    pub fn new(circuit: Circuit) -> Result<Self> {
        Self::with_config(circuit, SimulatorConfig::default())
    }

    /// Create a simulator with a custom configuration.
    pub fn with_config(mut circuit: Circuit, config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        if config.history_limit.is_some() {
            circuit.set_history_limit(config.history_limit);
        }

        log::info!(
            "simulator ready: {} nodes, {} voltage sources, {} unknowns, dt={:e}s, {}",
            circuit.num_unknown_nodes(),
            circuit.num_voltage_sources(),
            circuit.matrix_size(),
            config.time_step,
            config.method
        );

        Ok(Self {
            circuit,
            config,
            step_count: 0,
            state: SimState::Uninitialized,
            solution: Vec::new(),
        })
    }

    /// Advance the simulation by one time step.
    pub fn step(&mut self) -> Result<()> {
        if let SimState::Halted { step } = self.state {
            return Err(SimError::Halted { step });
        }

        let step = self.step_count + 1;
        let ctx = StampContext {
            step,
            dt: self.config.time_step,
            time: self.time_at(step),
            method: self.config.method,
        };

        // Assemble and solve
        let system = MnaSystem::assemble(&self.circuit, &ctx);
        let x = match lu::solve(&system) {
            Ok(x) => x,
            Err(e) => {
                log::warn!("step {} failed at t={:e}s: {}", step, ctx.time, e);
                self.state = SimState::Halted { step };
                return Err(SimError::SingularMatrix { step });
            }
        };

        // New element currents depend on the previous state, so compute them
        // before any history is appended.
        let currents: Vec<Option<f64>> = self
            .circuit
            .elements()
            .iter()
            .map(|element| match element {
                Element::Capacitor(_) | Element::Inductor(_) => {
                    let model = companion_of(&self.circuit, element, &ctx)?;
                    let [a, b] = element.nodes();
                    let v = solved_voltage(&self.circuit, &x, a) - solved_voltage(&self.circuit, &x, b);
                    Some(model.current(v))
                }
                Element::VoltageSource(v) => Some(x[self.circuit.branch_index(v.branch)]),
                Element::Resistor(_) | Element::CurrentSource(_) => None,
            })
            .collect();

        // Commit node voltages (ground records 0)
        let num_unknown = self.circuit.num_unknown_nodes();
        for node in self.circuit.nodes_mut() {
            let v = if node.is_ground() || node.id.0 > num_unknown {
                0.0
            } else {
                x[node.id.0 - 1]
            };
            node.push_voltage(v);
        }

        // Commit storage and source currents
        for (element, current) in self.circuit.elements_mut().iter_mut().zip(currents) {
            let Some(i) = current else { continue };
            match element {
                Element::Capacitor(c) => c.push_current(i),
                Element::Inductor(l) => l.push_current(i),
                Element::VoltageSource(v) => v.push_current(i),
                Element::Resistor(_) | Element::CurrentSource(_) => {}
            }
        }

        self.solution = x;
        self.step_count = step;
        self.state = SimState::Stepping;
        log::debug!("step {} done at t={:e}s", step, ctx.time);

        Ok(())
    }

    /// Run `steps` steps, stopping at the first failure.
    pub fn run(&mut self, steps: usize) -> Result<()> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// Number of completed steps.
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Lifecycle state.
    pub fn state(&self) -> SimState {
        self.state
    }

    /// Simulated time of the latest committed step.
    pub fn time(&self) -> f64 {
        self.time_at(self.step_count)
    }

    /// Simulated time of history index `step`.
    pub fn time_at(&self, step: usize) -> f64 {
        step as f64 * self.config.time_step
    }

    /// The simulation settings.
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Get a reference to the circuit.
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// Solution vector of the latest step: non-ground node voltages, then
    /// voltage-source branch currents. Empty before the first step.
    pub fn solution(&self) -> &[f64] {
        &self.solution
    }

    /// Resolve a sample to an absolute step index and check it is retained.
    pub fn resolve(&self, at: Sample) -> Result<usize> {
        let history = self.circuit.nodes()[0].history();
        match at {
            Sample::Latest => Ok(self.step_count),
            Sample::Step(index) if index >= history.first_index() && index <= self.step_count => Ok(index),
            Sample::Step(index) => Err(SimError::QueryOutOfRange {
                index,
                first: history.first_index(),
                last: self.step_count,
            }),
        }
    }

    /// Voltage at a node.
    pub fn node_voltage(&self, node: NodeId, at: Sample) -> Result<f64> {
        self.circuit.node_voltage(node, at)
    }

    /// Voltage at a node looked up by name.
    pub fn node_voltage_by_name(&self, name: &str, at: Sample) -> Result<f64> {
        let node = self.circuit.find_node(name).ok_or_else(|| SimError::UnknownNode {
            node: name.to_string(),
        })?;
        self.node_voltage(node, at)
    }

    /// Voltage across an element, V(a) - V(b).
    ///
    /// Before the first step a capacitor reports its initial voltage.
    pub fn element_voltage(&self, id: ElementId, at: Sample) -> Result<f64> {
        let element = self.element(id)?;
        let index = self.resolve(at)?;
        if let Element::Capacitor(c) = element {
            if index == 0 {
                return Ok(c.initial_voltage);
            }
        }
        self.circuit.terminal_voltage(element.nodes(), Sample::Step(index))
    }

    /// Current through an element, flowing from terminal a to terminal b.
    pub fn element_current(&self, id: ElementId, at: Sample) -> Result<f64> {
        let element = self.element(id)?;
        let index = self.resolve(at)?;
        let at = Sample::Step(index);
        match element {
            Element::Resistor(r) => Ok(r.current(self.circuit.terminal_voltage(r.nodes, at)?)),
            Element::Capacitor(c) => c.current(at),
            Element::Inductor(l) => l.current(at),
            Element::VoltageSource(v) => v.current(at),
            Element::CurrentSource(i) => Ok(i.current_at(self.time_at(index))),
        }
    }

    /// Element voltage looked up by element name.
    pub fn element_voltage_by_name(&self, name: &str, at: Sample) -> Result<f64> {
        self.element_voltage(self.find_element(name)?, at)
    }

    /// Element current looked up by element name.
    pub fn element_current_by_name(&self, name: &str, at: Sample) -> Result<f64> {
        self.element_current(self.find_element(name)?, at)
    }

    /// Net current leaving a node through all connected elements.
    ///
    /// Zero (to rounding) at every non-ground node of every solved step.
    pub fn current_balance(&self, node: NodeId, at: Sample) -> Result<f64> {
        let mut total = 0.0;
        for element in self.circuit.elements() {
            let [a, b] = element.nodes();
            if a == node {
                total += self.element_current(element.id(), at)?;
            } else if b == node {
                total -= self.element_current(element.id(), at)?;
            }
        }
        Ok(total)
    }

    fn element(&self, id: ElementId) -> Result<&Element> {
        self.circuit.element(id).ok_or_else(|| SimError::UnknownElement {
            element: id.to_string(),
        })
    }

    fn find_element(&self, name: &str) -> Result<ElementId> {
        self.circuit.find_element(name).ok_or_else(|| SimError::UnknownElement {
            element: name.to_string(),
        })
    }
}

fn solved_voltage(circuit: &Circuit, x: &[f64], node: NodeId) -> f64 {
    circuit.node_index(node).map(|i| x[i]).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::Waveform;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    /// 5 V source across a 10 ohm resistor, node 1 to ground.
    fn source_and_resistor() -> Circuit {
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "1");
        b.voltage_source("V1", n1, gnd, Waveform::dc(5.0)).unwrap();
        b.resistor("R1", n1, gnd, 10.0).unwrap();
        b.build().unwrap()
    }

    /// V -- R -- C to ground, capacitor starting at `v0`.
    fn rc(v: f64, r: f64, c: f64, v0: f64) -> Circuit {
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "in");
        let n2 = b.node(2, "out");
        b.voltage_source("V1", n1, gnd, Waveform::dc(v)).unwrap();
        b.resistor("R1", n1, n2, r).unwrap();
        b.capacitor("C1", n2, gnd, c, v0).unwrap();
        b.build().unwrap()
    }

    fn assert_kcl(sim: &Simulator) {
        for step in 1..=sim.step_count() {
            for node in sim.circuit().nodes().iter().filter(|n| !n.is_ground()) {
                let balance = sim.current_balance(node.id, Sample::Step(step)).unwrap();
                assert_abs_diff_eq!(balance, 0.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_source_resistor_every_step_any_dt() {
        for dt in [1e-9, 1e-3, 1.0] {
            let mut sim = Simulator::with_config(source_and_resistor(), SimulatorConfig::new(dt)).unwrap();
            for _ in 0..5 {
                sim.step().unwrap();
                assert_relative_eq!(sim.node_voltage(NodeId(1), Sample::Latest).unwrap(), 5.0, epsilon = 1e-12);
                assert_relative_eq!(sim.element_current_by_name("R1", Sample::Latest).unwrap(), 0.5, epsilon = 1e-12);
                // The source delivers power, so its a-to-b current is negative
                assert_relative_eq!(sim.element_current_by_name("V1", Sample::Latest).unwrap(), -0.5, epsilon = 1e-12);
            }
            assert_kcl(&sim);
        }
    }

    #[test]
    fn test_state_transitions() {
        let mut sim = Simulator::new(source_and_resistor()).unwrap();
        assert_eq!(sim.state(), SimState::Uninitialized);
        assert!(sim.solution().is_empty());
        sim.step().unwrap();
        assert_eq!(sim.state(), SimState::Stepping);
        assert_eq!(sim.step_count(), 1);
        assert_eq!(sim.solution().len(), 2);
        sim.run(3).unwrap();
        assert_eq!(sim.step_count(), 4);
        assert_relative_eq!(sim.time(), 4.0 * DEFAULT_TIME_STEP);
    }

    #[test]
    fn test_ground_is_zero_at_every_step() {
        let mut sim = Simulator::new(rc(5.0, 1e3, 1e-6, 0.0)).unwrap();
        sim.run(10).unwrap();
        let ground = &sim.circuit().nodes()[0];
        assert_eq!(ground.history().len(), 11);
        assert!(ground.history().iter().all(|v| v == 0.0));
        assert_eq!(sim.node_voltage(NodeId::GROUND, Sample::Latest).unwrap(), 0.0);
    }

    #[test]
    fn test_ohms_law_and_kcl_in_rc_circuit() {
        let mut sim = Simulator::with_config(rc(5.0, 1e3, 1e-6, 0.0), SimulatorConfig::new(1e-5)).unwrap();
        sim.run(50).unwrap();

        let r = sim.circuit().find_element("R1").unwrap();
        for step in 1..=50 {
            let at = Sample::Step(step);
            let v = sim.node_voltage(NodeId(1), at).unwrap() - sim.node_voltage(NodeId(2), at).unwrap();
            assert_relative_eq!(sim.element_current(r, at).unwrap(), v / 1e3, epsilon = 1e-12);
        }
        assert_kcl(&sim);
    }

    #[test]
    fn test_capacitor_charging_follows_exponential() {
        let (v, r, c, dt): (f64, f64, f64, f64) = (5.0, 1e3, 1e-6, 1e-5);
        let tau = r * c;
        let mut sim = Simulator::with_config(rc(v, r, c, 0.0), SimulatorConfig::new(dt)).unwrap();

        for k in 1..=500usize {
            sim.step().unwrap();
            let expected = v * (1.0 - (-(k as f64) * dt / tau).exp());
            let actual = sim.node_voltage_by_name("out", Sample::Latest).unwrap();
            // Backward Euler lags the exact response by O(dt/tau)
            assert_abs_diff_eq!(actual, expected, epsilon = 0.02 * v);
        }
        // 5 time constants in: within 1% of the source
        assert_abs_diff_eq!(sim.node_voltage(NodeId(2), Sample::Latest).unwrap(), v, epsilon = 0.01 * v);
    }

    #[test]
    fn test_trapezoidal_charging_is_more_accurate() {
        let (v, r, c, dt): (f64, f64, f64, f64) = (1.0, 1e3, 1e-6, 1e-4);
        let exact = v * (1.0 - (-10.0 * dt / (r * c)).exp());

        let mut be = Simulator::with_config(rc(v, r, c, 0.0), SimulatorConfig::new(dt)).unwrap();
        let mut tr = Simulator::with_config(
            rc(v, r, c, 0.0),
            SimulatorConfig::new(dt).with_method(IntegrationMethod::Trapezoidal),
        )
        .unwrap();
        be.run(10).unwrap();
        tr.run(10).unwrap();

        let err_be = (be.node_voltage(NodeId(2), Sample::Latest).unwrap() - exact).abs();
        let err_tr = (tr.node_voltage(NodeId(2), Sample::Latest).unwrap() - exact).abs();
        assert!(err_tr < err_be, "trapezoidal {} vs backward Euler {}", err_tr, err_be);
        assert_kcl(&tr);
    }

    #[test]
    fn test_capacitor_initial_voltage_discharges() {
        // Capacitor at 2 V discharging through 1 kohm
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "top");
        let c = b.capacitor("C1", n1, gnd, 1e-6, 2.0).unwrap();
        b.resistor("R1", n1, gnd, 1e3).unwrap();
        let mut sim = Simulator::with_config(b.build().unwrap(), SimulatorConfig::new(1e-5)).unwrap();

        assert_eq!(sim.element_voltage(c, Sample::Latest).unwrap(), 2.0);
        assert_eq!(sim.element_current(c, Sample::Latest).unwrap(), 0.0);

        sim.run(300).unwrap();
        let v = sim.node_voltage(NodeId(1), Sample::Latest).unwrap();
        let expected = 2.0 * (-300.0 * 1e-5 / 1e-3f64).exp();
        assert_abs_diff_eq!(v, expected, epsilon = 0.01);
        // Discharge current flows out of the top plate: negative a-to-b current
        assert!(sim.element_current(c, Sample::Latest).unwrap() < 0.0);
        assert_kcl(&sim);
    }

    /// V -- R -- L to ground, inductor starting at 0 A.
    fn rl(v: f64, r: f64, l: f64) -> (Circuit, ElementId) {
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "in");
        let n2 = b.node(2, "mid");
        b.voltage_source("V1", n1, gnd, Waveform::dc(v)).unwrap();
        b.resistor("R1", n1, n2, r).unwrap();
        let ind = b.inductor("L1", n2, gnd, l, 0.0).unwrap();
        (b.build().unwrap(), ind)
    }

    #[test]
    fn test_rl_current_rise() {
        let (v, r, l, dt): (f64, f64, f64, f64) = (1.0, 10.0, 1e-3, 1e-6);
        let tau = l / r;
        let (circuit, ind) = rl(v, r, l);
        let mut sim = Simulator::with_config(circuit, SimulatorConfig::new(dt)).unwrap();

        sim.run(500).unwrap();
        let expected = v / r * (1.0 - (-500.0 * dt / tau).exp());
        assert_abs_diff_eq!(sim.element_current(ind, Sample::Latest).unwrap(), expected, epsilon = 1e-3);
        assert_kcl(&sim);

        sim.run(5000).unwrap();
        assert_abs_diff_eq!(sim.element_current(ind, Sample::Latest).unwrap(), v / r, epsilon = 1e-6);
    }

    #[test]
    fn test_rl_current_rise_trapezoidal() {
        let (v, r, l, dt): (f64, f64, f64, f64) = (1.0, 10.0, 1e-3, 1e-6);
        let tau = l / r;
        let (circuit, ind) = rl(v, r, l);
        let config = SimulatorConfig::new(dt).with_method(IntegrationMethod::Trapezoidal);
        let mut sim = Simulator::with_config(circuit, config).unwrap();

        for k in 1..=300usize {
            sim.step().unwrap();
            let expected = v / r * (1.0 - (-(k as f64) * dt / tau).exp());
            assert_abs_diff_eq!(sim.element_current(ind, Sample::Latest).unwrap(), expected, epsilon = 2e-5);
        }
        // Inductor voltage is what the resistor leaves over
        let v_l = sim.element_voltage(ind, Sample::Latest).unwrap();
        let i_r = sim.element_current_by_name("R1", Sample::Latest).unwrap();
        assert_relative_eq!(v_l, v - i_r * r, epsilon = 1e-9);
        assert_kcl(&sim);
    }

    #[test]
    fn test_inductor_initial_current_circulates() {
        // Inductor loaded by a resistor: initial current decays as exp(-tR/L)
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "a");
        let ind = b.inductor("L1", n1, gnd, 1e-3, 0.1).unwrap();
        b.resistor("R1", n1, gnd, 1.0).unwrap();
        let mut sim = Simulator::with_config(b.build().unwrap(), SimulatorConfig::new(1e-6)).unwrap();

        assert_eq!(sim.element_current(ind, Sample::Step(0)).unwrap(), 0.1);
        sim.run(1000).unwrap();
        let expected = 0.1 * (-1000.0 * 1e-6 / 1e-3f64).exp();
        assert_abs_diff_eq!(sim.element_current(ind, Sample::Latest).unwrap(), expected, epsilon = 1e-3);
        assert_kcl(&sim);
    }

    #[test]
    fn test_pwl_source_tracks_breakpoints() {
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "a");
        b.voltage_source("V1", n1, gnd, Waveform::pwl(vec![(0.0, 0.0), (1.0, 10.0)]))
            .unwrap();
        b.resistor("R1", n1, gnd, 1.0).unwrap();
        let mut sim = Simulator::with_config(b.build().unwrap(), SimulatorConfig::new(0.25)).unwrap();

        sim.run(6).unwrap();
        let expected = [0.0, 2.5, 5.0, 7.5, 10.0, 10.0, 10.0];
        for (k, want) in expected.iter().enumerate().skip(1) {
            assert_relative_eq!(sim.node_voltage(NodeId(1), Sample::Step(k)).unwrap(), *want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_current_source_into_resistor() {
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "a");
        let src = b.current_source("I1", gnd, n1, Waveform::pwl(vec![(0.0, 0.0), (1.0, 2.0)]))
            .unwrap();
        b.resistor("R1", n1, gnd, 3.0).unwrap();
        let mut sim = Simulator::with_config(b.build().unwrap(), SimulatorConfig::new(0.5)).unwrap();

        sim.run(2).unwrap();
        assert_relative_eq!(sim.node_voltage(NodeId(1), Sample::Step(1)).unwrap(), 3.0);
        assert_relative_eq!(sim.node_voltage(NodeId(1), Sample::Step(2)).unwrap(), 6.0);
        assert_relative_eq!(sim.element_current(src, Sample::Step(1)).unwrap(), 1.0);
        assert_kcl(&sim);
    }

    #[test]
    fn test_floating_node_is_singular() {
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "a");
        let n2 = b.node(2, "floating");
        b.voltage_source("V1", n1, gnd, Waveform::dc(1.0)).unwrap();
        b.resistor("R1", n1, gnd, 1.0).unwrap();
        b.current_source("I1", n2, gnd, Waveform::dc(0.0)).unwrap();
        let mut sim = Simulator::new(b.build().unwrap()).unwrap();

        assert!(matches!(sim.step(), Err(SimError::SingularMatrix { step: 1 })));
        assert_eq!(sim.state(), SimState::Halted { step: 1 });
        assert_eq!(sim.step_count(), 0);
        assert!(matches!(sim.step(), Err(SimError::Halted { step: 1 })));
    }

    #[test]
    fn test_wide_resistance_spread_solves() {
        // 1 mohm next to 1 Tohm in the same circuit
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let vin = b.node(1, "in");
        let a = b.node(2, "a");
        let n3 = b.node(3, "b");
        b.voltage_source("V1", vin, gnd, Waveform::dc(1.0)).unwrap();
        b.resistor("R1", vin, a, 1e-3).unwrap();
        b.resistor("R2", a, gnd, 1.0).unwrap();
        b.resistor("R3", a, n3, 1e11).unwrap();
        b.resistor("R4", n3, gnd, 1e12).unwrap();
        let mut sim = Simulator::new(b.build().unwrap()).unwrap();

        sim.step().unwrap();
        let v_a = sim.node_voltage(a, Sample::Latest).unwrap();
        let v_b = sim.node_voltage(n3, Sample::Latest).unwrap();
        assert_relative_eq!(v_a, 1.0 / 1.001, max_relative = 1e-9);
        assert_relative_eq!(v_b, v_a / 1.1, max_relative = 1e-9);
        assert_kcl(&sim);
    }

    #[test]
    fn test_failed_first_step_keeps_initial_state() {
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "a");
        let n2 = b.node(2, "floating");
        let cap = b.capacitor("C1", n1, gnd, 1e-6, 1.5).unwrap();
        b.resistor("R1", n1, gnd, 1.0).unwrap();
        b.current_source("I1", n2, gnd, Waveform::dc(1e-3)).unwrap();
        let mut sim = Simulator::new(b.build().unwrap()).unwrap();

        assert!(matches!(sim.step(), Err(SimError::SingularMatrix { step: 1 })));
        // Nothing from the failed step was committed
        assert_eq!(sim.circuit().nodes()[1].history().len(), 1);
        assert_eq!(sim.element_voltage(cap, Sample::Latest).unwrap(), 1.5);
        assert_eq!(sim.node_voltage(n2, Sample::Step(0)).unwrap(), 0.0);
        assert!(matches!(
            sim.node_voltage(n1, Sample::Step(1)),
            Err(SimError::QueryOutOfRange { .. })
        ));
        assert!(matches!(sim.run(3), Err(SimError::Halted { step: 1 })));
    }

    #[test]
    fn test_halted_guard_keeps_committed_results() {
        let mut b = Circuit::builder();
        let gnd = b.ground();
        let n1 = b.node(1, "a");
        b.voltage_source("V1", n1, gnd, Waveform::dc(1.0)).unwrap();
        b.resistor("R1", n1, gnd, 1.0).unwrap();
        let mut sim = Simulator::new(b.build().unwrap()).unwrap();
        sim.run(3).unwrap();
        let before = sim.node_voltage(NodeId(1), Sample::Step(2)).unwrap();

        // A linear circuit that solved once solves at every step, so the halted
        // state is set directly here
        sim.state = SimState::Halted { step: 4 };
        assert!(matches!(sim.step(), Err(SimError::Halted { step: 4 })));
        assert_eq!(sim.step_count(), 3);
        assert_eq!(sim.node_voltage(NodeId(1), Sample::Step(2)).unwrap(), before);
    }

    #[test]
    fn test_queries_are_idempotent() {
        let mut sim = Simulator::new(rc(5.0, 1e3, 1e-6, 0.0)).unwrap();
        sim.run(20).unwrap();

        let a = sim.node_voltage(NodeId(2), Sample::Step(7)).unwrap();
        let b = sim.node_voltage(NodeId(2), Sample::Step(7)).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
        let c1 = sim.element_current_by_name("C1", Sample::Latest).unwrap();
        let c2 = sim.element_current_by_name("C1", Sample::Latest).unwrap();
        assert_eq!(c1.to_bits(), c2.to_bits());
        assert_eq!(sim.step_count(), 20);
    }

    #[test]
    fn test_query_out_of_range() {
        let mut sim = Simulator::new(source_and_resistor()).unwrap();
        sim.run(2).unwrap();
        assert!(matches!(
            sim.node_voltage(NodeId(1), Sample::Step(3)),
            Err(SimError::QueryOutOfRange { index: 3, .. })
        ));
        assert!(matches!(
            sim.element_current_by_name("R1", Sample::Step(9)),
            Err(SimError::QueryOutOfRange { .. })
        ));
        // Still steppable afterwards
        sim.step().unwrap();
        assert!(sim.node_voltage(NodeId(1), Sample::Step(3)).is_ok());
        assert!(matches!(
            sim.node_voltage_by_name("nope", Sample::Latest),
            Err(SimError::UnknownNode { .. })
        ));
    }

    #[test]
    fn test_history_limit_keeps_results_identical() {
        let mut full = Simulator::with_config(rc(5.0, 1e3, 1e-6, 0.0), SimulatorConfig::new(1e-5)).unwrap();
        let mut capped = Simulator::with_config(
            rc(5.0, 1e3, 1e-6, 0.0),
            SimulatorConfig::new(1e-5).with_history_limit(4),
        )
        .unwrap();
        full.run(40).unwrap();
        capped.run(40).unwrap();

        assert_eq!(
            full.node_voltage(NodeId(2), Sample::Latest).unwrap(),
            capped.node_voltage(NodeId(2), Sample::Latest).unwrap()
        );
        assert!(capped.node_voltage(NodeId(2), Sample::Step(37)).is_ok());
        assert!(matches!(
            capped.node_voltage(NodeId(2), Sample::Step(10)),
            Err(SimError::QueryOutOfRange { first: 37, last: 40, .. })
        ));
        assert!(capped.element_current_by_name("R1", Sample::Step(10)).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        for dt in [0.0, -1e-6, f64::NAN] {
            assert!(matches!(
                Simulator::with_config(source_and_resistor(), SimulatorConfig::new(dt)),
                Err(SimError::InvalidSimulationParam { .. })
            ));
        }
        let cfg = SimulatorConfig {
            history_limit: Some(0),
            ..SimulatorConfig::default()
        };
        assert!(Simulator::with_config(source_and_resistor(), cfg).is_err());
    }

    #[test]
    fn test_independent_simulators_do_not_interfere() {
        let circuit = rc(5.0, 1e3, 1e-6, 0.0);
        let mut a = Simulator::with_config(circuit.clone(), SimulatorConfig::new(1e-5)).unwrap();
        let mut b = Simulator::with_config(circuit, SimulatorConfig::new(1e-4)).unwrap();
        a.run(10).unwrap();
        b.run(1).unwrap();
        assert_eq!(a.step_count(), 10);
        assert_eq!(b.step_count(), 1);
        assert!(a.node_voltage(NodeId(2), Sample::Latest).unwrap() != b.node_voltage(NodeId(2), Sample::Latest).unwrap());
    }
}
