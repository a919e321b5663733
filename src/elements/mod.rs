//! Element models for circuit simulation.
//!
//! This module provides models for all supported two-terminal elements:
//! - Linear: Resistor, Capacitor, Inductor
//! - Sources: Voltage Source, Current Source (DC or piecewise linear)
//!
//! The set of element kinds is closed, so [`Element`] is an enum and the
//! assembler stamps it with one exhaustive match.

mod linear;
mod sources;

pub use linear::{Capacitor, Companion, Inductor, IntegrationMethod, Resistor};
pub use sources::{CurrentSource, SourceKind, VoltageSource, Waveform};

use std::fmt;

use crate::circuit::{ElementId, NodeId};

/// Element kinds, identified by their netlist prefix letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Resistor
    Resistor,
    /// Capacitor
    Capacitor,
    /// Inductor
    Inductor,
    /// Independent voltage source
    VoltageSource,
    /// Independent current source
    CurrentSource,
}

impl ElementKind {
    /// Parse an element kind from its netlist prefix.
    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix.to_ascii_uppercase() {
            'R' => Some(Self::Resistor),
            'C' => Some(Self::Capacitor),
            'L' => Some(Self::Inductor),
            'V' => Some(Self::VoltageSource),
            'I' => Some(Self::CurrentSource),
            _ => None,
        }
    }

    /// Whether this is an independent source (takes a DC value or PWL list).
    pub fn is_source(&self) -> bool {
        matches!(self, Self::VoltageSource | Self::CurrentSource)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resistor => "resistor",
            Self::Capacitor => "capacitor",
            Self::Inductor => "inductor",
            Self::VoltageSource => "voltage source",
            Self::CurrentSource => "current source",
        };
        write!(f, "{}", name)
    }
}

/// A circuit element.
#[derive(Debug, Clone)]
pub enum Element {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    VoltageSource(VoltageSource),
    CurrentSource(CurrentSource),
}

impl Element {
    /// Get the element ID.
    pub fn id(&self) -> ElementId {
        match self {
            Element::Resistor(r) => r.id,
            Element::Capacitor(c) => c.id,
            Element::Inductor(l) => l.id,
            Element::VoltageSource(v) => v.id,
            Element::CurrentSource(i) => i.id,
        }
    }

    /// Get the element name.
    pub fn name(&self) -> &str {
        match self {
            Element::Resistor(r) => &r.name,
            Element::Capacitor(c) => &c.name,
            Element::Inductor(l) => &l.name,
            Element::VoltageSource(v) => &v.name,
            Element::CurrentSource(i) => &i.name,
        }
    }

    /// The two terminal nodes `[a, b]`.
    pub fn nodes(&self) -> [NodeId; 2] {
        match self {
            Element::Resistor(r) => r.nodes,
            Element::Capacitor(c) => c.nodes,
            Element::Inductor(l) => l.nodes,
            Element::VoltageSource(v) => v.nodes,
            Element::CurrentSource(i) => i.nodes,
        }
    }

    /// The element kind.
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Resistor(_) => ElementKind::Resistor,
            Element::Capacitor(_) => ElementKind::Capacitor,
            Element::Inductor(_) => ElementKind::Inductor,
            Element::VoltageSource(_) => ElementKind::VoltageSource,
            Element::CurrentSource(_) => ElementKind::CurrentSource,
        }
    }

    /// Cap the element's current history, if it has one.
    pub(crate) fn set_history_limit(&mut self, limit: Option<usize>) {
        match self {
            Element::Capacitor(c) => c.set_history_limit(limit),
            Element::Inductor(l) => l.set_history_limit(limit),
            Element::VoltageSource(v) => v.set_history_limit(limit),
            Element::Resistor(_) | Element::CurrentSource(_) => {}
        }
    }
}
