//! Linear passive elements: Resistor, Capacitor, Inductor.

use std::fmt;

use crate::circuit::{ElementId, History, NodeId, Sample};
use crate::error::{Result, SimError};

/// Reject zero, negative and non-finite values for a physical parameter.
pub(crate) fn check_positive(element: &str, param: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(SimError::invalid_parameter(element, param, "value must be finite"));
    }
    if value <= 0.0 {
        return Err(SimError::invalid_parameter(
            element,
            param,
            format!("value must be positive, got {}", value),
        ));
    }
    Ok(())
}

pub(crate) fn check_finite(element: &str, param: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::invalid_parameter(element, param, "value must be finite"))
    }
}

/// Numerical integration rule used to discretize storage elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrationMethod {
    /// First order, L-stable. No ringing on step inputs.
    #[default]
    BackwardEuler,
    /// Second order, A-stable. More accurate for smooth waveforms.
    Trapezoidal,
}

impl IntegrationMethod {
    /// Parse a method name (`be`, `euler`, `trap`, `trapezoidal`).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "be" | "euler" | "backward-euler" | "backward_euler" => Some(Self::BackwardEuler),
            "trap" | "trapezoidal" => Some(Self::Trapezoidal),
            _ => None,
        }
    }
}

impl fmt::Display for IntegrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrationMethod::BackwardEuler => write!(f, "backward-euler"),
            IntegrationMethod::Trapezoidal => write!(f, "trapezoidal"),
        }
    }
}

/// Companion model of a storage element for one time step.
///
/// The element behaves as a conductance in parallel with a current source,
/// so that the current from terminal a to terminal b is `g * v + i_eq`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Companion {
    /// Equivalent conductance g_eq
    pub conductance: f64,
    /// Equivalent current source i_eq, flowing from a to b
    pub source: f64,
}

impl Companion {
    /// Element current for a solved terminal voltage.
    pub fn current(&self, voltage: f64) -> f64 {
        self.conductance * voltage + self.source
    }
}

/// A resistor element.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub id: ElementId,
    pub name: String,
    pub nodes: [NodeId; 2], // [a, b]
    pub resistance: f64,
}

impl Resistor {
    /// Create a new resistor. Resistance must be positive.
    pub fn new(id: ElementId, name: String, nodes: [NodeId; 2], resistance: f64) -> Result<Self> {
        check_positive(&name, "resistance", resistance)?;
        Ok(Self {
            id,
            name,
            nodes,
            resistance,
        })
    }

    /// Get the conductance (1/R).
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }

    /// Ohm's law: current from a to b for a terminal voltage.
    pub fn current(&self, voltage: f64) -> f64 {
        voltage / self.resistance
    }
}

/// A capacitor element.
///
/// Discretized with a companion model:
///
/// | method | g_eq | i_eq |
/// |--------|------|------|
/// | backward Euler | C/dt | -g_eq * v(n-1) |
/// | trapezoidal | 2C/dt | -(g_eq * v(n-1) + i(n-1)) |
///
/// The current history starts at 0 A; the capacitor is assumed to be at rest
/// with `initial_voltage` across it when the simulation starts.
#[derive(Debug, Clone)]
pub struct Capacitor {
    pub id: ElementId,
    pub name: String,
    pub nodes: [NodeId; 2],
    pub capacitance: f64,
    /// Voltage across the capacitor at t = 0
    pub initial_voltage: f64,
    currents: History,
}

impl Capacitor {
    /// Create a new capacitor.
    pub fn new(
        id: ElementId,
        name: String,
        nodes: [NodeId; 2],
        capacitance: f64,
        initial_voltage: f64,
    ) -> Result<Self> {
        check_positive(&name, "capacitance", capacitance)?;
        check_finite(&name, "ic", initial_voltage)?;
        Ok(Self {
            id,
            name,
            nodes,
            capacitance,
            initial_voltage,
            currents: History::new(0.0),
        })
    }

    /// Equivalent conductance of the companion model.
    pub fn conductance(&self, dt: f64, method: IntegrationMethod) -> f64 {
        match method {
            IntegrationMethod::BackwardEuler => self.capacitance / dt,
            IntegrationMethod::Trapezoidal => 2.0 * self.capacitance / dt,
        }
    }

    /// Companion model given the voltage across the capacitor at the previous step.
    pub fn companion(&self, dt: f64, method: IntegrationMethod, v_prev: f64) -> Companion {
        let g = self.conductance(dt, method);
        let source = match method {
            IntegrationMethod::BackwardEuler => -g * v_prev,
            IntegrationMethod::Trapezoidal => -(g * v_prev + self.currents.latest()),
        };
        Companion {
            conductance: g,
            source,
        }
    }

    /// Current at the requested history entry.
    pub fn current(&self, at: Sample) -> Result<f64> {
        self.currents.at(at)
    }

    /// The full current history.
    pub fn history(&self) -> &History {
        &self.currents
    }

    pub(crate) fn push_current(&mut self, current: f64) {
        self.currents.push(current);
    }

    pub(crate) fn set_history_limit(&mut self, limit: Option<usize>) {
        self.currents = History::with_capacity(self.currents.latest(), limit);
    }
}

/// An inductor element.
///
/// Discretized with a companion model:
///
/// | method | g_eq | i_eq |
/// |--------|------|------|
/// | backward Euler | dt/L | i(n-1) |
/// | trapezoidal | dt/(2L) | i(n-1) + g_eq * v(n-1) |
///
/// The current history starts at `initial_current`; the voltage across the
/// inductor before the first step is taken as 0 V.
#[derive(Debug, Clone)]
pub struct Inductor {
    pub id: ElementId,
    pub name: String,
    pub nodes: [NodeId; 2],
    pub inductance: f64,
    /// Current through the inductor at t = 0
    pub initial_current: f64,
    currents: History,
}

impl Inductor {
    /// Create a new inductor.
    pub fn new(
        id: ElementId,
        name: String,
        nodes: [NodeId; 2],
        inductance: f64,
        initial_current: f64,
    ) -> Result<Self> {
        check_positive(&name, "inductance", inductance)?;
        check_finite(&name, "ic", initial_current)?;
        Ok(Self {
            id,
            name,
            nodes,
            inductance,
            initial_current,
            currents: History::new(initial_current),
        })
    }

    /// Equivalent conductance of the companion model.
    pub fn conductance(&self, dt: f64, method: IntegrationMethod) -> f64 {
        match method {
            IntegrationMethod::BackwardEuler => dt / self.inductance,
            IntegrationMethod::Trapezoidal => dt / (2.0 * self.inductance),
        }
    }

    /// Companion model given the voltage across the inductor at the previous step.
    pub fn companion(&self, dt: f64, method: IntegrationMethod, v_prev: f64) -> Companion {
        let g = self.conductance(dt, method);
        let i_prev = self.currents.latest();
        let source = match method {
            IntegrationMethod::BackwardEuler => i_prev,
            IntegrationMethod::Trapezoidal => i_prev + g * v_prev,
        };
        Companion {
            conductance: g,
            source,
        }
    }

    /// Current at the requested history entry.
    pub fn current(&self, at: Sample) -> Result<f64> {
        self.currents.at(at)
    }

    /// The full current history.
    pub fn history(&self) -> &History {
        &self.currents
    }

    pub(crate) fn push_current(&mut self, current: f64) {
        self.currents.push(current);
    }

    pub(crate) fn set_history_limit(&mut self, limit: Option<usize>) {
        self.currents = History::with_capacity(self.currents.latest(), limit);
    }
}
