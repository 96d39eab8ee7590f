//! The SMT back-end: an opaque [`Solver`] over a first-order theory with
//! uninterpreted functions, bit-vectors, booleans, enumerated sorts, and
//! quantifiers. Out of scope per §1; this module defines the seam and a
//! concrete implementation that shells out to an SMT-LIB2-speaking binary.

use std::io::Write as _;
use std::process::{Command, Stdio};

/// Errors raised by a [`Solver`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("failed to invoke external solver: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("solver returned UNKNOWN")]
    Unknown,
    #[error("solver produced unparseable output: {0}")]
    UnparseableOutput(String),
}

/// A satisfiability verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckResult {
    Sat,
    Unsat,
    Unknown,
}

/// Opaque handle to a solver-bound uninterpreted function. Transported
/// across encoder components without being rewrapped; §9's design note.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FnHandle {
    pub symbol: String,
    pub arity: usize,
}

impl FnHandle {
    pub fn new(symbol: impl Into<String>, arity: usize) -> Self {
        FnHandle {
            symbol: symbol.into(),
            arity,
        }
    }
}

/// A raw model value for one uninterpreted-function application, as
/// returned by `get-value`.
#[derive(Clone, Debug)]
pub struct ModelEntry {
    pub symbol: String,
    pub args: Vec<String>,
    pub value: String,
}

/// Assertion, scoped push/pop, check, and model extraction over SMT-LIB2
/// text. One fresh `Solver` is constructed per outer-loop round; the
/// encoder is the sole writer of its assertions.
pub trait Solver {
    /// Submit a raw SMT-LIB2 command (`declare-fun`, `declare-sort`,
    /// `assert`, ...).
    fn submit(&mut self, command: &str) -> Result<(), SolverError>;

    /// Push a new assertion scope.
    fn push(&mut self) -> Result<(), SolverError>;

    /// Pop the innermost assertion scope.
    fn pop(&mut self) -> Result<(), SolverError>;

    /// Run `(check-sat)`.
    fn check(&mut self) -> Result<CheckResult, SolverError>;

    /// Run `(get-value (...))` for the given function applications; only
    /// meaningful immediately after a `Sat` check.
    fn get_values(&mut self, queries: &[String]) -> Result<Vec<ModelEntry>, SolverError>;
}

/// Drives an external SMT-LIB2 solver (e.g. `z3 -in`) over its stdio.
pub struct ShellSolver {
    child: std::process::Child,
}

impl ShellSolver {
    pub fn spawn(binary_path: &str) -> Result<Self, SolverError> {
        let child = Command::new(binary_path)
            .arg("-in")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(SolverError::Spawn)?;
        Ok(ShellSolver { child })
    }

    fn write_line(&mut self, line: &str) -> Result<(), SolverError> {
        let stdin = self.child.stdin.as_mut().expect("solver stdin piped");
        writeln!(stdin, "{line}").map_err(SolverError::Spawn)
    }

    fn read_line(&mut self) -> Result<String, SolverError> {
        use std::io::BufRead;
        let stdout = self.child.stdout.as_mut().expect("solver stdout piped");
        let mut reader = std::io::BufReader::new(stdout);
        let mut line = String::new();
        reader.read_line(&mut line).map_err(SolverError::Spawn)?;
        Ok(line.trim().to_string())
    }
}

impl Solver for ShellSolver {
    fn submit(&mut self, command: &str) -> Result<(), SolverError> {
        self.write_line(command)
    }

    fn push(&mut self) -> Result<(), SolverError> {
        self.write_line("(push 1)")
    }

    fn pop(&mut self) -> Result<(), SolverError> {
        self.write_line("(pop 1)")
    }

    fn check(&mut self) -> Result<CheckResult, SolverError> {
        self.write_line("(check-sat)")?;
        let reply = self.read_line()?;
        match reply.as_str() {
            "sat" => Ok(CheckResult::Sat),
            "unsat" => Ok(CheckResult::Unsat),
            "unknown" => Ok(CheckResult::Unknown),
            other => Err(SolverError::UnparseableOutput(other.to_string())),
        }
    }

    fn get_values(&mut self, queries: &[String]) -> Result<Vec<ModelEntry>, SolverError> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let joined = queries.join(" ");
        self.write_line(&format!("(get-value ({joined}))"))?;
        let response = self.read_balanced_sexpr()?;
        parse_get_value_response(&response)
    }
}

impl ShellSolver {
    /// Read lines until parenthesis depth returns to zero, i.e. the whole
    /// `(get-value ...)` reply, which a solver may wrap across several
    /// lines.
    fn read_balanced_sexpr(&mut self) -> Result<String, SolverError> {
        let mut buf = String::new();
        let mut depth = 0i32;
        let mut started = false;
        for _ in 0..10_000 {
            let line = self.read_line()?;
            if line.is_empty() && !started {
                continue;
            }
            for c in line.chars() {
                match c {
                    '(' => {
                        depth += 1;
                        started = true;
                    }
                    ')' => depth -= 1,
                    _ => {}
                }
            }
            if !buf.is_empty() {
                buf.push(' ');
            }
            buf.push_str(&line);
            if started && depth <= 0 {
                return Ok(buf);
            }
        }
        Err(SolverError::UnparseableOutput(
            "get-value response never closed its parentheses".into(),
        ))
    }
}

/// A minimal parsed S-expression: either a bare token or a parenthesized
/// list, just enough structure to read a `get-value` reply.
#[derive(Debug)]
enum SExpr {
    Atom(String),
    List(Vec<SExpr>),
}

fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut cur = String::new();
    for c in input.chars() {
        match c {
            '(' | ')' => {
                if !cur.is_empty() {
                    tokens.push(std::mem::take(&mut cur));
                }
                tokens.push(c.to_string());
            }
            c if c.is_whitespace() => {
                if !cur.is_empty() {
                    tokens.push(std::mem::take(&mut cur));
                }
            }
            _ => cur.push(c),
        }
    }
    if !cur.is_empty() {
        tokens.push(cur);
    }
    tokens
}

fn parse_sexpr(tokens: &[String], pos: &mut usize) -> Result<SExpr, SolverError> {
    let tok = tokens
        .get(*pos)
        .ok_or_else(|| SolverError::UnparseableOutput("unexpected end of get-value response".into()))?;
    if tok == "(" {
        *pos += 1;
        let mut items = Vec::new();
        loop {
            match tokens.get(*pos) {
                Some(t) if t == ")" => {
                    *pos += 1;
                    break;
                }
                Some(_) => items.push(parse_sexpr(tokens, pos)?),
                None => return Err(SolverError::UnparseableOutput("unbalanced get-value response".into())),
            }
        }
        Ok(SExpr::List(items))
    } else if tok == ")" {
        Err(SolverError::UnparseableOutput("unexpected ')' in get-value response".into()))
    } else {
        *pos += 1;
        Ok(SExpr::Atom(tok.clone()))
    }
}

fn render_sexpr(expr: &SExpr) -> String {
    match expr {
        SExpr::Atom(s) => s.clone(),
        SExpr::List(items) => {
            let parts: Vec<String> = items.iter().map(render_sexpr).collect();
            format!("({})", parts.join(" "))
        }
    }
}

/// Parse a `(get-value (...))` reply of the form `((expr1 val1) (expr2
/// val2) ...)`, where each `expr` is either a bare symbol or a function
/// application, into one [`ModelEntry`] per pair.
fn parse_get_value_response(text: &str) -> Result<Vec<ModelEntry>, SolverError> {
    let tokens = tokenize(text);
    let mut pos = 0;
    let top = parse_sexpr(&tokens, &mut pos)?;
    let SExpr::List(pairs) = top else {
        return Err(SolverError::UnparseableOutput(
            "expected a list of (expr value) pairs".into(),
        ));
    };
    let mut entries = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let SExpr::List(parts) = pair else {
            return Err(SolverError::UnparseableOutput("expected an (expr value) pair".into()));
        };
        if parts.len() != 2 {
            return Err(SolverError::UnparseableOutput(
                "expected exactly one expr and one value per get-value pair".into(),
            ));
        }
        let (symbol, args) = match &parts[0] {
            SExpr::Atom(s) => (s.clone(), Vec::new()),
            SExpr::List(app) => {
                let mut it = app.iter();
                let symbol = match it.next() {
                    Some(SExpr::Atom(s)) => s.clone(),
                    _ => {
                        return Err(SolverError::UnparseableOutput(
                            "malformed function application in get-value response".into(),
                        ))
                    }
                };
                let args = it.map(render_sexpr).collect();
                (symbol, args)
            }
        };
        let value = render_sexpr(&parts[1]);
        entries.push(ModelEntry { symbol, args, value });
    }
    Ok(entries)
}

/// An in-memory stub solver for tests: always returns a fixed
/// [`CheckResult`] and records every submitted command, without spawning a
/// process.
#[derive(Default)]
pub struct StubSolver {
    pub commands: Vec<String>,
    pub result: Option<CheckResult>,
}

impl StubSolver {
    pub fn always(result: CheckResult) -> Self {
        StubSolver {
            commands: Vec::new(),
            result: Some(result),
        }
    }
}

impl Solver for StubSolver {
    fn submit(&mut self, command: &str) -> Result<(), SolverError> {
        self.commands.push(command.to_string());
        Ok(())
    }

    fn push(&mut self) -> Result<(), SolverError> {
        self.commands.push("(push 1)".into());
        Ok(())
    }

    fn pop(&mut self) -> Result<(), SolverError> {
        self.commands.push("(pop 1)".into());
        Ok(())
    }

    fn check(&mut self) -> Result<CheckResult, SolverError> {
        Ok(self.result.unwrap_or(CheckResult::Unknown))
    }

    fn get_values(&mut self, _queries: &[String]) -> Result<Vec<ModelEntry>, SolverError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_solver_records_commands() {
        let mut solver = StubSolver::always(CheckResult::Sat);
        solver.submit("(declare-fun foo () Bool)").unwrap();
        assert_eq!(solver.check().unwrap(), CheckResult::Sat);
        assert_eq!(solver.commands.len(), 1);
    }

    #[test]
    fn parses_get_value_reply_with_applications_and_bitvector_literals() {
        let reply = "(((out_g_0 t_0_1) true) ((state_guard_0 t_0_0) (_ bv3 4)))";
        let entries = parse_get_value_response(reply).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].symbol, "out_g_0");
        assert_eq!(entries[0].args, vec!["t_0_1".to_string()]);
        assert_eq!(entries[0].value, "true");
        assert_eq!(entries[1].symbol, "state_guard_0");
        assert_eq!(entries[1].value, "(_ bv3 4)");
    }

    #[test]
    fn parses_get_value_reply_across_multiple_lines() {
        let reply = "(\n  (foo true)\n)";
        let tokens = tokenize(reply);
        let mut pos = 0;
        let top = parse_sexpr(&tokens, &mut pos).unwrap();
        let SExpr::List(pairs) = top else { panic!("expected list") };
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn rejects_unbalanced_reply() {
        let err = parse_get_value_response("((foo true)").unwrap_err();
        assert!(matches!(err, SolverError::UnparseableOutput(_)));
    }
}
