//! Recursive-descent parser for the sectioned specification-file format of
//! §6: `[GENERAL]`/`[INPUT_VARIABLES]`/`[OUTPUT_VARIABLES]`/`[ASSUMPTIONS]`/
//! `[GUARANTEES]`, each `Forall (...) <formula>;` guarantee/assumption
//! parsed by a small embedded-LTL expression grammar.

use crate::ast::{BinOp, Expr, Signal, UnaryOp};
use crate::spec::{Property, Specification, SpecificationError, Template};

/// Errors raised while parsing a specification file, with line/column
/// context for the offending token.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("{line}:{column}: unexpected token '{found}', expected {expected}")]
    UnexpectedToken {
        line: usize,
        column: usize,
        found: String,
        expected: String,
    },
    #[error("{line}:{column}: unknown section '{name}'")]
    UnknownSection { line: usize, column: usize, name: String },
    #[error("{line}:{column}: malformed Forall header")]
    MalformedForall { line: usize, column: usize },
    #[error("unexpected end of input, expected {0}")]
    UnexpectedEof(String),
    #[error(transparent)]
    Specification(#[from] SpecificationError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Tok {
    text: String,
    line: usize,
    column: usize,
}

fn tokenize(input: &str) -> Vec<Tok> {
    let mut toks = Vec::new();
    let mut line = 1usize;
    let mut col = 1usize;
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                col = 1;
                i += 1;
            }
            c if c.is_whitespace() => {
                col += 1;
                i += 1;
            }
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '(' | ')' | ';' | ',' | '*' | '+' | '!' | '=' => {
                toks.push(Tok { text: c.to_string(), line, column: col });
                i += 1;
                col += 1;
            }
            '-' if chars.get(i + 1) == Some(&'>') => {
                toks.push(Tok { text: "->".into(), line, column: col });
                i += 2;
                col += 2;
            }
            '[' => {
                let start = i;
                let start_col = col;
                while i < chars.len() && chars[i] != ']' {
                    i += 1;
                    col += 1;
                }
                if i < chars.len() {
                    i += 1;
                    col += 1;
                }
                let text: String = chars[start..i].iter().collect();
                toks.push(Tok { text, line, column: start_col });
            }
            ':' => {
                toks.push(Tok { text: ":".into(), line, column: col });
                i += 1;
                col += 1;
            }
            _ => {
                let start = i;
                let start_col = col;
                while i < chars.len()
                    && !chars[i].is_whitespace()
                    && !"()[];,*+!=:#".contains(chars[i])
                    && !(chars[i] == '-' && chars.get(i + 1) == Some(&'>'))
                {
                    i += 1;
                    col += 1;
                }
                let text: String = chars[start..i].iter().collect();
                toks.push(Tok { text, line, column: start_col });
            }
        }
    }
    toks
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn advance(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, text: &str, expected: &str) -> Result<Tok, ParseError> {
        match self.advance() {
            Some(t) if t.text == text => Ok(t),
            Some(t) => Err(ParseError::UnexpectedToken {
                line: t.line,
                column: t.column,
                found: t.text,
                expected: expected.to_string(),
            }),
            None => Err(ParseError::UnexpectedEof(expected.to_string())),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_implies()
    }

    fn parse_implies(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_until()?;
        if let Some(t) = self.peek() {
            if t.text == "->" {
                self.advance();
                let rhs = self.parse_implies()?;
                return Ok(Expr::bin(BinOp::Implies, lhs, rhs));
            }
        }
        Ok(lhs)
    }

    fn parse_until(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_or()?;
        while let Some(t) = self.peek() {
            if t.text == "U" {
                self.advance();
                let rhs = self.parse_or()?;
                lhs = Expr::bin(BinOp::Until, lhs, rhs);
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while let Some(t) = self.peek() {
            if t.text == "+" {
                self.advance();
                let rhs = self.parse_and()?;
                lhs = Expr::bin(BinOp::Or, lhs, rhs);
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        while let Some(t) = self.peek() {
            if t.text == "*" {
                self.advance();
                let rhs = self.parse_unary()?;
                lhs = Expr::bin(BinOp::And, lhs, rhs);
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let Some(t) = self.peek().cloned() else {
            return Err(ParseError::UnexpectedEof("a formula".into()));
        };
        match t.text.as_str() {
            "!" => {
                self.advance();
                Ok(Expr::unary(UnaryOp::Not, self.parse_unary()?))
            }
            "G" => {
                self.advance();
                Ok(Expr::unary(UnaryOp::Globally, self.parse_unary()?))
            }
            "F" => {
                self.advance();
                Ok(Expr::unary(UnaryOp::Finally, self.parse_unary()?))
            }
            "X" => {
                self.advance();
                Ok(Expr::unary(UnaryOp::Next, self.parse_unary()?))
            }
            "(" => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(")", "')'")?;
                Ok(inner)
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let t = self.advance().ok_or_else(|| ParseError::UnexpectedEof("an atom".into()))?;
        if t.text == "true" {
            return Ok(Expr::Bool(true));
        }
        if t.text == "false" {
            return Ok(Expr::Bool(false));
        }
        let signal = parse_signal_ident(&t.text);
        let lhs = Expr::Signal(signal);
        if let Some(eq) = self.peek() {
            if eq.text == "=" {
                self.advance();
                let rhs_tok = self.advance().ok_or_else(|| ParseError::UnexpectedEof("a value".into()))?;
                let rhs = rhs_tok
                    .text
                    .parse::<i64>()
                    .map(Expr::Number)
                    .unwrap_or_else(|_| Expr::Signal(parse_signal_ident(&rhs_tok.text)));
                return Ok(Expr::bin(BinOp::Eq, lhs, rhs));
            }
        }
        Ok(lhs)
    }
}

/// Parse `name_k_idx1_idx2...` into a [`Signal`]: `k` must be numeric (the
/// owning template), each trailing segment is either a concrete numeric
/// instance or an index-variable name.
fn parse_signal_ident(text: &str) -> Signal {
    let parts: Vec<&str> = text.split('_').collect();
    if parts.len() < 2 {
        return Signal::Plain(text.to_string());
    }
    let Ok(template) = parts[1].parse::<usize>() else {
        return Signal::Plain(text.to_string());
    };
    let name = parts[0].to_string();
    if parts.len() == 2 {
        return Signal::Template { name, template };
    }
    let rest = &parts[2..];
    if let Ok(instance) = rest[0].parse::<usize>() {
        if rest.len() == 1 {
            return Signal::Instance { name, template, instance };
        }
    }
    Signal::QuantifiedTemplate {
        name,
        template,
        indices: rest.iter().map(|s| s.to_string()).collect(),
    }
}

/// Parse one `Forall (i[,j]) <formula>;` property line.
fn parse_property(parser: &mut Parser) -> Result<Property, ParseError> {
    let forall_tok = parser.expect("Forall", "'Forall'")?;
    parser.expect("(", "'('")?;
    let mut indices = Vec::new();
    loop {
        let tok = parser
            .advance()
            .ok_or_else(|| ParseError::UnexpectedEof("an index name".into()))?;
        indices.push(tok.text);
        match parser.peek() {
            Some(t) if t.text == "," => {
                parser.advance();
            }
            Some(t) if t.text == ")" => break,
            _ => {
                return Err(ParseError::MalformedForall {
                    line: forall_tok.line,
                    column: forall_tok.column,
                })
            }
        }
    }
    parser.expect(")", "')'")?;
    let body = parser.parse_expr()?;
    parser.expect(";", "';'")?;

    let mut seen = std::collections::BTreeSet::new();
    body.collect_signals(&mut seen);
    let mut index_templates = vec![0usize; indices.len()];
    for sig in &seen {
        if let Signal::QuantifiedTemplate { template, indices: sig_indices, .. } = sig {
            for idx_name in sig_indices {
                if let Some(pos) = indices.iter().position(|n| n == idx_name) {
                    index_templates[pos] = *template;
                }
            }
        }
    }

    Ok(Property {
        indices,
        body,
        index_templates,
    })
}

/// Parse a full specification-file text into a [`Specification`].
pub fn parse_specification(input: &str) -> Result<Specification, ParseError> {
    let toks = tokenize(input);
    let mut pos = 0usize;
    let mut num_templates = 1usize;
    let mut inputs: Vec<String> = Vec::new();
    let mut outputs: Vec<String> = Vec::new();
    let mut assumptions = Vec::new();
    let mut guarantees = Vec::new();

    while pos < toks.len() {
        let section = &toks[pos];
        if !section.text.starts_with('[') {
            return Err(ParseError::UnexpectedToken {
                line: section.line,
                column: section.column,
                found: section.text.clone(),
                expected: "a section header".into(),
            });
        }
        let name = section.text.trim_start_matches('[').trim_end_matches(']').to_string();
        pos += 1;
        match name.as_str() {
            "GENERAL" => {
                while pos < toks.len() && !toks[pos].text.starts_with('[') {
                    if toks[pos].text == "templates" {
                        pos += 1;
                        if pos < toks.len() && toks[pos].text == ":" {
                            pos += 1;
                        }
                        if pos < toks.len() {
                            num_templates = toks[pos].text.parse().unwrap_or(1);
                            pos += 1;
                        }
                    } else {
                        pos += 1;
                    }
                }
            }
            "INPUT_VARIABLES" => {
                while pos < toks.len() && !toks[pos].text.starts_with('[') {
                    if toks[pos].text != "," && toks[pos].text != ";" {
                        inputs.push(toks[pos].text.clone());
                    }
                    pos += 1;
                }
            }
            "OUTPUT_VARIABLES" => {
                while pos < toks.len() && !toks[pos].text.starts_with('[') {
                    if toks[pos].text != "," && toks[pos].text != ";" {
                        outputs.push(toks[pos].text.clone());
                    }
                    pos += 1;
                }
            }
            "ASSUMPTIONS" => {
                let mut parser = Parser { toks: toks.clone(), pos };
                while parser.peek().map(|t| t.text == "Forall").unwrap_or(false) {
                    assumptions.push(parse_property(&mut parser)?);
                }
                pos = parser.pos;
            }
            "GUARANTEES" => {
                let mut parser = Parser { toks: toks.clone(), pos };
                while parser.peek().map(|t| t.text == "Forall").unwrap_or(false) {
                    guarantees.push(parse_property(&mut parser)?);
                }
                pos = parser.pos;
            }
            other => {
                return Err(ParseError::UnknownSection {
                    line: section.line,
                    column: section.column,
                    name: other.to_string(),
                })
            }
        }
    }

    let templates: Result<Vec<Template>, SpecificationError> = (0..num_templates)
        .map(|k| Template::new(k, inputs.clone(), outputs.clone()))
        .collect();
    let spec = Specification::new(templates?, assumptions, guarantees)?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    const S1: &str = r#"
[GENERAL] templates: 1
[INPUT_VARIABLES] r;
[OUTPUT_VARIABLES] g;
[GUARANTEES]
Forall (i) g_0_i = 0;
Forall (i,j) G !(g_0_i * g_0_j);
"#;

    #[test]
    fn parses_s1_into_one_template_with_two_guarantees() {
        let spec = parse_specification(S1).unwrap();
        assert_eq!(spec.templates_count(), 1);
        assert_eq!(spec.guarantees.len(), 2);
        assert_eq!(spec.guarantees[0].indices, vec!["i".to_string()]);
        assert_eq!(spec.guarantees[1].indices, vec!["i".to_string(), "j".to_string()]);
    }

    #[test]
    fn rejects_unknown_section() {
        let err = parse_specification("[BOGUS] x\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownSection { .. }));
    }

    #[test]
    fn parses_signal_with_quantified_index() {
        let sig = parse_signal_ident("g_0_i");
        assert!(matches!(sig, Signal::QuantifiedTemplate { template: 0, .. }));
    }

    #[test]
    fn parses_signal_with_concrete_instance() {
        let sig = parse_signal_ident("g_0_3");
        assert!(matches!(sig, Signal::Instance { template: 0, instance: 3, .. }));
    }

    #[test]
    fn round_trips_worked_s1_example() {
        let spec = parse_specification(S1).unwrap();
        let manual = Specification::new(
            vec![Template::new(0, vec!["r".into()], vec!["g".into()]).unwrap()],
            vec![],
            vec![],
        )
        .unwrap();
        assert_eq!(spec.templates_count(), manual.templates_count());
    }
}
