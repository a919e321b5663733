//! Netlist loader.
//!
//! A small SPICE-like, line-oriented format for describing circuits built
//! from two-terminal elements.
//!
//! # Grammar Overview
//!
//! ```text
//! netlist     = { line }
//! line        = comment | directive | element | empty
//! comment     = ('#' | ';') { any_char } | '*' at column 1
//! directive   = ".tran" value [count] | ".method" ("be" | "trap") | ".end"
//! element     = name node node [value | source] { param }
//!
//! name        = ('R' | 'C' | 'L' | 'V' | 'I') { letter | digit | '_' }
//! node        = identifier | number       ("0" and "GND" are ground)
//! source      = ["DC"] value | "PWL" '(' value value { value value } ')'
//! param       = identifier '=' value      (e.g. ic=1.5)
//! value       = number [unit_suffix]
//! unit_suffix = 'p' | 'n' | 'u' | 'm' | 'k' | 'M' | 'G'
//! ```
//!
//! Commas are treated as whitespace, so `PWL(0 0, 1m 5)` is accepted.
//!
//! # Example
//!
//! ```text
//! * RC charging
//! .tran 10u 200
//! .method trap
//!
//! V1  in   0    DC 5
//! R1  in   out  1k
//! C1  out  0    1u  ic=0
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{parse_value, Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::error::{Result, SimError};

/// Parse a netlist string into an AST.
pub fn parse(input: &str) -> Result<NetlistAst> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer)?;
    parser.parse()
}

/// Parse a netlist file.
pub fn parse_file(path: &std::path::Path) -> Result<NetlistAst> {
    let content = std::fs::read_to_string(path).map_err(|e| SimError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse(&content)
}
