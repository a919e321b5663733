//! Abstract Syntax Tree types for netlists.

use std::collections::HashMap;

use crate::elements::{ElementKind, IntegrationMethod};
use crate::error::{Result, SimError};

/// Complete AST representation of a parsed netlist.
#[derive(Debug, Clone, Default)]
pub struct NetlistAst {
    /// All element statements, in file order
    pub elements: Vec<ElementDef>,
    /// Referenced node names in order of first appearance (including ground aliases)
    pub nodes: Vec<String>,
    /// `.tran` directive, if present
    pub tran: Option<TranDef>,
    /// `.method` directive, if present
    pub method: Option<IntegrationMethod>,
}

impl NetlistAst {
    /// Create a new empty netlist AST.
    pub fn new() -> Self {
        Self::default()
    }
}

/// An element statement from the netlist.
#[derive(Debug, Clone)]
pub struct ElementDef {
    /// Element kind, from the first letter of the name
    pub kind: ElementKind,
    /// Unique element name
    pub name: String,
    /// Connected node names
    pub nodes: Vec<String>,
    /// Element value (resistance, capacitance, inductance, or DC source value)
    pub value: Option<f64>,
    /// PWL breakpoints for sources
    pub pwl: Option<Vec<(f64, f64)>>,
    /// Additional `key=value` parameters (lowercased keys)
    pub params: HashMap<String, f64>,
    /// Source line number for error reporting
    pub line: usize,
}

impl ElementDef {
    /// Reject parameters the element kind does not take.
    ///
    /// Only capacitors (`ic` = initial voltage) and inductors (`ic` = initial
    /// current) accept a parameter.
    pub fn check_params(&self) -> Result<()> {
        let mut keys: Vec<&String> = self.params.keys().collect();
        keys.sort();
        for key in keys {
            if key != "ic" {
                return Err(SimError::invalid_element(
                    &self.name,
                    self.line,
                    format!("unknown parameter '{}'", key),
                ));
            }
            if !matches!(self.kind, ElementKind::Capacitor | ElementKind::Inductor) {
                return Err(SimError::invalid_element(
                    &self.name,
                    self.line,
                    format!("parameter 'ic' is not accepted by a {}", self.kind),
                ));
            }
        }
        Ok(())
    }
}

/// Transient analysis settings from `.tran <dt> [steps]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranDef {
    /// Fixed time step in seconds
    pub time_step: f64,
    /// Number of steps to run
    pub steps: Option<usize>,
    /// Source line number
    pub line: usize,
}
