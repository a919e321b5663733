//! Parser for netlists.

use std::collections::{HashMap, HashSet};

use super::ast::*;
use super::lexer::{parse_value, Lexer, Token, TokenKind};
use crate::elements::{ElementKind, IntegrationMethod};
use crate::error::{Result, SimError};

/// Parser for netlists.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser with the given lexer.
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self> {
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    /// Parse the entire netlist.
    pub fn parse(&mut self) -> Result<NetlistAst> {
        let mut ast = NetlistAst::new();
        let mut seen_nodes = HashSet::new();
        let mut seen_names = HashSet::new();

        while self.current.kind != TokenKind::Eof {
            // Skip empty lines
            if self.current.kind == TokenKind::Newline {
                self.advance()?;
                continue;
            }

            match self.current.kind {
                TokenKind::Directive => {
                    self.parse_directive(&mut ast)?;
                }
                TokenKind::Identifier => {
                    let element = self.parse_element()?;
                    if !seen_names.insert(element.name.clone()) {
                        return Err(SimError::DuplicateElement { name: element.name });
                    }
                    for node in &element.nodes {
                        if seen_nodes.insert(node.clone()) {
                            ast.nodes.push(node.clone());
                        }
                    }
                    ast.elements.push(element);
                }
                _ => {
                    return Err(SimError::parse(
                        self.current.line,
                        format!("unexpected token: {:?}", self.current.text),
                    ));
                }
            }

            match self.current.kind {
                TokenKind::Newline => self.advance()?,
                TokenKind::Eof => {}
                _ => {
                    return Err(SimError::parse(
                        self.current.line,
                        format!("unexpected trailing token: {:?}", self.current.text),
                    ));
                }
            }
        }

        log::debug!(
            "parsed netlist: {} elements, {} nodes",
            ast.elements.len(),
            ast.nodes.len()
        );
        Ok(ast)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.current.kind == kind {
            let tok = self.current.clone();
            self.advance()?;
            Ok(tok)
        } else {
            Err(SimError::parse(
                self.current.line,
                format!("expected {:?}, got {:?}", kind, self.current.kind),
            ))
        }
    }

    fn expect_number(&mut self) -> Result<f64> {
        let tok = self.expect(TokenKind::Number)?;
        parse_value(&tok.text)
            .ok_or_else(|| SimError::parse(tok.line, format!("invalid number: {}", tok.text)))
    }

    fn at_end_of_line(&self) -> bool {
        matches!(self.current.kind, TokenKind::Newline | TokenKind::Eof)
    }

    fn parse_directive(&mut self, ast: &mut NetlistAst) -> Result<()> {
        let directive = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        match directive.to_lowercase().as_str() {
            ".tran" => {
                let time_step = self.expect_number()?;
                let steps = if self.current.kind == TokenKind::Number {
                    let count = self.expect_number()?;
                    if count < 0.0 || count.fract() != 0.0 {
                        return Err(SimError::parse(
                            line,
                            format!("step count must be a non-negative integer, got {}", count),
                        ));
                    }
                    Some(count as usize)
                } else {
                    None
                };
                ast.tran = Some(TranDef {
                    time_step,
                    steps,
                    line,
                });
            }
            ".method" => {
                let name = self.expect(TokenKind::Identifier)?.text;
                let method = IntegrationMethod::from_str(&name).ok_or_else(|| {
                    SimError::parse(line, format!("unknown integration method: {}", name))
                })?;
                ast.method = Some(method);
            }
            ".end" => {
                // Nothing after .end is read
                while self.current.kind != TokenKind::Eof {
                    self.advance()?;
                }
            }
            _ => {
                return Err(SimError::parse(
                    line,
                    format!("unknown directive: {}", directive),
                ));
            }
        }

        Ok(())
    }

    fn parse_node(&mut self, element: &str, line: usize) -> Result<String> {
        match self.current.kind {
            TokenKind::Identifier | TokenKind::Number => {
                let text = self.current.text.clone();
                self.advance()?;
                Ok(text)
            }
            _ => Err(SimError::invalid_element(element, line, "expected 2 nodes")),
        }
    }

    fn parse_element(&mut self) -> Result<ElementDef> {
        let name = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        let first_char = name.chars().next().unwrap_or('?');
        let kind = ElementKind::from_prefix(first_char).ok_or_else(|| SimError::UnknownElementType {
            element_type: name.clone(),
            line,
        })?;

        let nodes = vec![self.parse_node(&name, line)?, self.parse_node(&name, line)?];

        let mut value = None;
        let mut pwl = None;
        let mut params = HashMap::new();

        while !self.at_end_of_line() {
            match self.current.kind {
                TokenKind::Number if value.is_none() && pwl.is_none() => {
                    value = Some(self.expect_number()?);
                }
                TokenKind::Identifier => {
                    let word = self.current.text.clone();
                    self.advance()?;

                    if self.current.kind == TokenKind::Equals {
                        self.advance()?;
                        let v = self.expect_number()?;
                        params.insert(word.to_lowercase(), v);
                        continue;
                    }

                    match word.to_uppercase().as_str() {
                        "DC" if kind.is_source() && value.is_none() && pwl.is_none() => {
                            value = Some(self.expect_number()?);
                        }
                        "PWL" if kind.is_source() && value.is_none() && pwl.is_none() => {
                            pwl = Some(self.parse_pwl(&name, line)?);
                        }
                        _ => {
                            return Err(SimError::invalid_element(
                                &name,
                                line,
                                format!("unexpected token '{}'", word),
                            ));
                        }
                    }
                }
                _ => {
                    return Err(SimError::invalid_element(
                        &name,
                        line,
                        format!("unexpected token '{}'", self.current.text),
                    ));
                }
            }
        }

        let def = ElementDef {
            kind,
            name,
            nodes,
            value,
            pwl,
            params,
            line,
        };
        def.check_params()?;
        Ok(def)
    }

    fn parse_pwl(&mut self, name: &str, line: usize) -> Result<Vec<(f64, f64)>> {
        self.expect(TokenKind::OpenParen)?;

        let mut values = Vec::new();
        while self.current.kind == TokenKind::Number {
            values.push(self.expect_number()?);
        }
        self.expect(TokenKind::CloseParen)?;

        if values.is_empty() || values.len() % 2 != 0 {
            return Err(SimError::invalid_element(
                name,
                line,
                format!("PWL needs time/value pairs, got {} numbers", values.len()),
            ));
        }

        Ok(values.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::parse;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_resistor() {
        let ast = parse("R1 in out 10k").unwrap();
        assert_eq!(ast.elements.len(), 1);
        assert_eq!(ast.elements[0].kind, ElementKind::Resistor);
        assert_eq!(ast.elements[0].name, "R1");
        assert_eq!(ast.elements[0].nodes, vec!["in", "out"]);
        assert_eq!(ast.elements[0].value, Some(10_000.0));
        assert_eq!(ast.nodes, vec!["in", "out"]);
    }

    #[test]
    fn test_parse_numeric_nodes_and_ic() {
        let ast = parse("C1 1 0 100n ic=2.5\nL1 1 2 1m IC=0.1").unwrap();
        assert_eq!(ast.elements[0].nodes, vec!["1", "0"]);
        assert_relative_eq!(ast.elements[0].params["ic"], 2.5);
        assert_relative_eq!(ast.elements[1].params["ic"], 0.1);
        assert_eq!(ast.nodes, vec!["1", "0", "2"]);
    }

    #[test]
    fn test_parse_sources() {
        let ast = parse("V1 in 0 DC 5\nV2 a 0 -1.5\nI1 0 b PWL(0 0, 1m 2m)").unwrap();
        assert_eq!(ast.elements[0].value, Some(5.0));
        assert_eq!(ast.elements[1].value, Some(-1.5));
        let pwl = ast.elements[2].pwl.as_ref().unwrap();
        assert_eq!(pwl.len(), 2);
        assert_relative_eq!(pwl[1].0, 1e-3);
        assert_relative_eq!(pwl[1].1, 2e-3);
        assert_eq!(ast.elements[2].value, None);
    }

    #[test]
    fn test_parse_directives() {
        let ast = parse(".tran 1u 500\n.method trap\nR1 a 0 1k\n.end\nthis is ignored").unwrap();
        let tran = ast.tran.unwrap();
        assert_relative_eq!(tran.time_step, 1e-6);
        assert_eq!(tran.steps, Some(500));
        assert_eq!(ast.method, Some(IntegrationMethod::Trapezoidal));
        assert_eq!(ast.elements.len(), 1);

        let ast = parse(".TRAN 10n").unwrap();
        assert_eq!(ast.tran.unwrap().steps, None);
    }

    #[test]
    fn test_parse_with_comments() {
        let input = "* title line\n# This is a comment\nR1 in out 1k ; inline comment\n";
        let ast = parse(input).unwrap();
        assert_eq!(ast.elements.len(), 1);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse("X1 a 0 1k"),
            Err(SimError::UnknownElementType { line: 1, .. })
        ));
        assert!(matches!(
            parse("R1 a 0 1k\nR1 b 0 2k"),
            Err(SimError::DuplicateElement { .. })
        ));
        assert!(matches!(
            parse("V1 a 0 PWL(0 1 2)"),
            Err(SimError::InvalidElement { .. })
        ));
        assert!(matches!(parse("R1 a"), Err(SimError::InvalidElement { .. })));
        assert!(matches!(
            parse("R1 a 0 1k 2k"),
            Err(SimError::InvalidElement { .. })
        ));
        assert!(matches!(parse(".method rk4"), Err(SimError::ParseError { .. })));
        for line in ["C1 out 0 1u ics=2", "R1 a 0 1k ic=5", "V1 a 0 5 ic=1", "I1 a 0 1m ic=0"] {
            assert!(
                matches!(parse(line), Err(SimError::InvalidElement { line: 1, .. })),
                "accepted: {}",
                line
            );
        }
        assert!(matches!(parse(".tran 1u 2.5"), Err(SimError::ParseError { .. })));
        assert!(matches!(parse(".probe a"), Err(SimError::ParseError { .. })));
    }
}
