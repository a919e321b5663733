//! Independent voltage and current sources.

use std::fmt;

use crate::circuit::{BranchId, ElementId, History, NodeId, Sample};
use crate::error::{Result, SimError};

/// Time dependence of an independent source.
#[derive(Debug, Clone, PartialEq)]
pub enum Waveform {
    /// Constant value
    Dc(f64),
    /// Piecewise linear: (time, value) breakpoints, strictly increasing in time
    Pwl(Vec<(f64, f64)>),
}

/// Waveform kind, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Dc,
    Pwl,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Dc => write!(f, "DC"),
            SourceKind::Pwl => write!(f, "PWL"),
        }
    }
}

impl Waveform {
    /// Create a DC waveform.
    pub fn dc(value: f64) -> Self {
        Waveform::Dc(value)
    }

    /// Create a piecewise linear waveform. Checked by [`Waveform::validate`].
    pub fn pwl(points: Vec<(f64, f64)>) -> Self {
        Waveform::Pwl(points)
    }

    /// The waveform kind.
    pub fn kind(&self) -> SourceKind {
        match self {
            Waveform::Dc(_) => SourceKind::Dc,
            Waveform::Pwl(_) => SourceKind::Pwl,
        }
    }

    /// Check that the waveform is usable: finite values and, for PWL, at least
    /// one breakpoint with strictly increasing times.
    pub fn validate(&self, element: &str) -> Result<()> {
        match self {
            Waveform::Dc(v) => {
                if v.is_finite() {
                    Ok(())
                } else {
                    Err(SimError::invalid_parameter(element, "dc", "value must be finite"))
                }
            }
            Waveform::Pwl(points) => {
                if points.is_empty() {
                    return Err(SimError::invalid_breakpoints(element, "at least one breakpoint is required"));
                }
                if let Some((t, v)) = points.iter().find(|(t, v)| !t.is_finite() || !v.is_finite()) {
                    return Err(SimError::invalid_breakpoints(
                        element,
                        format!("breakpoint ({}, {}) is not finite", t, v),
                    ));
                }
                if let Some(w) = points.windows(2).find(|w| w[1].0 <= w[0].0) {
                    return Err(SimError::invalid_breakpoints(
                        element,
                        format!("times must be strictly increasing ({} follows {})", w[1].0, w[0].0),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Evaluate the waveform at time `t`.
    ///
    /// PWL values are interpolated linearly between the bracketing breakpoints
    /// and clamped to the first/last value outside the breakpoint range.
    pub fn value_at(&self, t: f64) -> f64 {
        match self {
            Waveform::Dc(v) => *v,
            Waveform::Pwl(points) => eval_pwl(points, t),
        }
    }
}

fn eval_pwl(points: &[(f64, f64)], t: f64) -> f64 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return 0.0,
    };
    if t <= first.0 {
        if t < first.0 {
            log::trace!("PWL clamped to first breakpoint at t={}", t);
        }
        return first.1;
    }
    if t >= last.0 {
        return last.1;
    }

    // First breakpoint strictly after t; t > first.0 so idx >= 1
    let idx = points.partition_point(|&(time, _)| time <= t);
    let (t0, v0) = points[idx - 1];
    let (t1, v1) = points[idx];
    v0 + (v1 - v0) * (t - t0) / (t1 - t0)
}

/// An independent voltage source.
///
/// Voltage sources require an extra row/column in the MNA matrix for the
/// branch current. The source enforces: V(a) - V(b) = v(t)
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub id: ElementId,
    pub name: String,
    pub nodes: [NodeId; 2], // [positive, negative]
    pub waveform: Waveform,
    pub branch: BranchId,
    /// Solved branch currents, starting at 0 A
    currents: History,
}

impl VoltageSource {
    /// Create a new voltage source.
    pub fn new(
        id: ElementId,
        name: String,
        nodes: [NodeId; 2],
        waveform: Waveform,
        branch: BranchId,
    ) -> Result<Self> {
        waveform.validate(&name)?;
        Ok(Self {
            id,
            name,
            nodes,
            waveform,
            branch,
            currents: History::new(0.0),
        })
    }

    /// Source voltage at time `t`.
    pub fn voltage_at(&self, t: f64) -> f64 {
        self.waveform.value_at(t)
    }

    /// Branch current at the requested history entry.
    pub fn current(&self, at: Sample) -> Result<f64> {
        self.currents.at(at)
    }

    /// The full branch-current history.
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

/// An independent current source.
///
/// Current sources add directly to the RHS vector of the MNA equations.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    pub id: ElementId,
    pub name: String,
    pub nodes: [NodeId; 2], // current flows from a through the source to b
    pub waveform: Waveform,
}

impl CurrentSource {
    /// Create a new current source.
    pub fn new(id: ElementId, name: String, nodes: [NodeId; 2], waveform: Waveform) -> Result<Self> {
        waveform.validate(&name)?;
        Ok(Self {
            id,
            name,
            nodes,
            waveform,
        })
    }

    /// Source current at time `t`.
    pub fn current_at(&self, t: f64) -> f64 {
        self.waveform.value_at(t)
    }
}
