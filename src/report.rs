//! Textual reporting of simulation results.
//!
//! [`NodeSummary`] and [`ElementSummary`] are one-line snapshots that can be
//! printed after any step. [`StepTable`] writes a tab-separated table with one
//! row per step, suitable for plotting tools.

use std::fmt;
use std::io::Write;

use crate::circuit::{Circuit, ElementId, NodeId, Sample};
use crate::elements::{Element, ElementKind, SourceKind};
use crate::error::{Result, SimError};
use crate::solver::Simulator;

/// Snapshot of one node at one step.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSummary {
    pub id: NodeId,
    pub name: String,
    pub step: usize,
    pub time: f64,
    pub voltage: f64,
}

impl NodeSummary {
    /// Capture the state of `node` at `at`.
    pub fn new(sim: &Simulator, node: NodeId, at: Sample) -> Result<Self> {
        let step = sim.resolve(at)?;
        let name = sim
            .circuit()
            .node(node)
            .map(|n| n.name.clone())
            .ok_or_else(|| SimError::UnknownNode { node: node.to_string() })?;
        Ok(Self {
            id: node,
            name,
            step,
            time: sim.time_at(step),
            voltage: sim.node_voltage(node, Sample::Step(step))?,
        })
    }
}

impl fmt::Display for NodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node {} ({}) step {} t={:.6e}s: V={:.6} V",
            self.name, self.id, self.step, self.time, self.voltage
        )
    }
}

/// Snapshot of one element at one step.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSummary {
    pub id: ElementId,
    pub name: String,
    pub kind: ElementKind,
    /// Waveform kind, for sources
    pub source: Option<SourceKind>,
    pub nodes: [String; 2],
    pub step: usize,
    pub time: f64,
    pub voltage: f64,
    pub current: f64,
}

impl ElementSummary {
    /// Capture the state of `element` at `at`.
    pub fn new(sim: &Simulator, element: ElementId, at: Sample) -> Result<Self> {
        let step = sim.resolve(at)?;
        let circuit = sim.circuit();
        let el = circuit.element(element).ok_or_else(|| SimError::UnknownElement {
            element: element.to_string(),
        })?;
        let [a, b] = el.nodes();
        let at = Sample::Step(step);
        Ok(Self {
            id: element,
            name: el.name().to_string(),
            kind: el.kind(),
            source: match el {
                Element::VoltageSource(v) => Some(v.waveform.kind()),
                Element::CurrentSource(i) => Some(i.waveform.kind()),
                _ => None,
            },
            nodes: [circuit.node_name(a).to_string(), circuit.node_name(b).to_string()],
            step,
            time: sim.time_at(step),
            voltage: sim.element_voltage(element, at)?,
            current: sim.element_current(element, at)?,
        })
    }
}

impl fmt::Display for ElementSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)?;
        if let Some(source) = self.source {
            write!(f, " [{}]", source)?;
        }
        write!(
            f,
            " ({} -> {}) step {} t={:.6e}s: V={:.6} V I={:.6e} A",
            self.nodes[0], self.nodes[1], self.step, self.time, self.voltage, self.current
        )
    }
}

/// Summaries of every non-ground node and every element at `at`.
pub fn summarize(sim: &Simulator, at: Sample) -> Result<(Vec<NodeSummary>, Vec<ElementSummary>)> {
    let circuit = sim.circuit();
    let nodes = circuit
        .nodes()
        .iter()
        .filter(|n| !n.is_ground())
        .map(|n| NodeSummary::new(sim, n.id, at))
        .collect::<Result<Vec<_>>>()?;
    let elements = circuit
        .elements()
        .iter()
        .map(|e| ElementSummary::new(sim, e.id(), at))
        .collect::<Result<Vec<_>>>()?;
    Ok((nodes, elements))
}

/// Tab-separated per-step table of node voltages and element currents.
///
/// Columns are `step`, `time`, then `V(<node>)` for every non-ground node and
/// `I(<element>)` for every element, in creation order.
#[derive(Debug, Clone)]
pub struct StepTable {
    nodes: Vec<NodeId>,
    elements: Vec<ElementId>,
}

impl StepTable {
    /// Table covering every non-ground node and every element of `circuit`.
    pub fn new(circuit: &Circuit) -> Self {
        Self {
            nodes: circuit.nodes().iter().filter(|n| !n.is_ground()).map(|n| n.id).collect(),
            elements: circuit.elements().iter().map(|e| e.id()).collect(),
        }
    }

    /// Column names, in output order.
    pub fn columns(&self, circuit: &Circuit) -> Vec<String> {
        let mut columns = vec!["step".to_string(), "time".to_string()];
        columns.extend(self.nodes.iter().map(|&n| format!("V({})", circuit.node_name(n))));
        columns.extend(
            self.elements
                .iter()
                .filter_map(|&e| circuit.element(e))
                .map(|e| format!("I({})", e.name())),
        );
        columns
    }

    /// Write the header line.
    pub fn write_header<W: Write>(&self, out: &mut W, circuit: &Circuit) -> Result<()> {
        writeln!(out, "{}", self.columns(circuit).join("\t"))?;
        Ok(())
    }

    /// Write the row for one step.
    pub fn write_row<W: Write>(&self, out: &mut W, sim: &Simulator, at: Sample) -> Result<()> {
        let step = sim.resolve(at)?;
        let at = Sample::Step(step);

        let mut fields = vec![step.to_string(), format!("{:.6e}", sim.time_at(step))];
        for &node in &self.nodes {
            fields.push(format!("{:.9e}", sim.node_voltage(node, at)?));
        }
        for &element in &self.elements {
            fields.push(format!("{:.9e}", sim.element_current(element, at)?));
        }
        writeln!(out, "{}", fields.join("\t"))?;
        Ok(())
    }
}
