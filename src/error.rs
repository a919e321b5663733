//! Error types for the Stepspice circuit simulator.
//!
//! This module provides a unified error type [`SimError`] that covers
//! all error conditions that can occur during netlist loading, topology
//! construction, simulation and result queries.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Unified error type for all Stepspice operations.
#[derive(Error, Debug)]
pub enum SimError {
    // ============ Netlist Errors ============
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Invalid element statement
    #[error("Invalid element '{name}' at line {line}: {message}")]
    InvalidElement {
        name: String,
        line: usize,
        message: String,
    },

    /// Unknown element type prefix
    #[error("Unknown element type '{element_type}' at line {line}")]
    UnknownElementType { element_type: String, line: usize },

    /// Duplicate element name
    #[error("Duplicate element name '{name}'")]
    DuplicateElement { name: String },

    // ============ Topology Errors ============
    /// Element references a node that was never declared
    #[error("Node '{node}' not found in circuit")]
    NodeNotFound { node: String },

    /// Missing ground node
    #[error("Circuit has no ground node (use '0' or 'GND')")]
    MissingGround,

    /// Two nodes declared with the same index
    #[error("Node index {index} declared more than once")]
    DuplicateNode { index: usize },

    /// Node indices leave a gap
    #[error("Node indices must be dense: index {missing} is missing (highest is {highest})")]
    NonDenseNodes { missing: usize, highest: usize },

    /// Element connects a node to itself
    #[error("Element '{element}' connects node {node} to itself")]
    DegenerateElement { element: String, node: usize },

    /// Floating node (not connected to ground path)
    #[error("Floating node '{node}' detected - no path to ground")]
    FloatingNode { node: String },

    /// Invalid circuit topology
    #[error("Invalid circuit topology: {message}")]
    InvalidTopology { message: String },

    // ============ Parameter Errors ============
    /// Invalid parameter value
    #[error("Invalid parameter '{param}' for element '{element}': {message}")]
    InvalidParameter {
        element: String,
        param: String,
        message: String,
    },

    /// Piecewise-linear breakpoints are empty, non-finite or out of order
    #[error("Invalid PWL breakpoints for element '{element}': {message}")]
    InvalidBreakpoints { element: String, message: String },

    // ============ Simulation Errors ============
    /// Matrix is singular and cannot be solved
    #[error("Singular matrix at step {step} - circuit may have a floating node, a voltage source loop, or element values too far apart to solve")]
    SingularMatrix { step: usize },

    /// A previous step failed and the simulation cannot continue
    #[error("Simulation halted after failing at step {step}")]
    Halted { step: usize },

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    // ============ Query Errors ============
    /// Requested history index is not available
    #[error("Step {index} is not available (history holds steps {first}..={last})")]
    QueryOutOfRange {
        index: usize,
        first: usize,
        last: usize,
    },

    /// Node lookup failed
    #[error("Unknown node '{node}'")]
    UnknownNode { node: String },

    /// Element lookup failed
    #[error("Unknown element '{element}'")]
    UnknownElement { element: String },

    // ============ I/O Errors ============
    /// Error reading netlist file
    #[error("Failed to read netlist file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing simulation output
    #[error("Output error: {source}")]
    OutputError {
        #[from]
        source: std::io::Error,
    },
}

impl SimError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid element error
    pub fn invalid_element(name: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::InvalidElement {
            name: name.into(),
            line,
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        element: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            element: element.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an invalid breakpoints error
    pub fn invalid_breakpoints(element: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidBreakpoints {
            element: element.into(),
            message: message.into(),
        }
    }

    /// Whether this error was raised while building the topology or its parameters.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::NodeNotFound { .. }
                | Self::MissingGround
                | Self::DuplicateNode { .. }
                | Self::NonDenseNodes { .. }
                | Self::DegenerateElement { .. }
                | Self::FloatingNode { .. }
                | Self::InvalidTopology { .. }
                | Self::InvalidParameter { .. }
                | Self::InvalidBreakpoints { .. }
        )
    }
}
