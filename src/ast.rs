//! Immutable LTL expression tree and signal identities.
//!
//! Signals and expressions are plain value types: two `Signal`s (or `Expr`s)
//! are equal iff their canonical structural form is equal, never by identity.
//! Nothing here mutates in place; the [`crate::instantiate`] module produces
//! new trees by pure recursive rewrite.

use std::fmt;
use std::rc::Rc;

/// A symbolic identifier used both inside LTL formulas and as the basis for
/// SMT variable naming.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Signal {
    /// A bare signal with no template affinity, e.g. a global constant.
    Plain(String),
    /// A signal belonging to template `k`, not yet bound to any instance.
    Template { name: String, template: usize },
    /// A signal resolved to a concrete process `(template, instance)`.
    Instance {
        name: String,
        template: usize,
        instance: usize,
    },
    /// A template signal with one or more unresolved index variables, e.g.
    /// `g_0_i` before `i` has been substituted.
    QuantifiedTemplate {
        name: String,
        template: usize,
        indices: Vec<String>,
    },
    /// The scheduling placeholder `is_scheduled_k_j`, resolved during
    /// instantiation into a conjunction over scheduling bits.
    QuantifiedScheduler { template: usize, index: String },
}

impl Signal {
    /// Canonical string form used for structural hashing and SMT naming.
    pub fn canonical(&self) -> String {
        match self {
            Signal::Plain(name) => name.clone(),
            Signal::Template { name, template } => format!("{name}_{template}"),
            Signal::Instance {
                name,
                template,
                instance,
            } => format!("{name}_{template}_{instance}"),
            Signal::QuantifiedTemplate {
                name,
                template,
                indices,
            } => {
                let idx = indices.join("_");
                format!("{name}_{template}_{idx}")
            }
            Signal::QuantifiedScheduler { template, index } => {
                format!("is_scheduled_{template}_{index}")
            }
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Unary LTL/boolean operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Boolean negation `!`.
    Not,
    /// "Globally" `G`.
    Globally,
    /// "Finally" `F`.
    Finally,
    /// "Next" `X`.
    Next,
}

/// Binary LTL/boolean/arithmetic-like operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    /// Boolean conjunction `*`.
    And,
    /// Boolean disjunction `+`.
    Or,
    /// Boolean implication `->`.
    Implies,
    /// Equality `=`.
    Eq,
    /// "Until" `U`.
    Until,
}

/// An immutable LTL expression tree.
///
/// All quantifiers are outermost: nested `ForallExpr`s are not produced by
/// this crate's parser, though the representation does not forbid them.
///
/// `Hash`/`Eq` are keyed on the same structural form as `PartialEq` (derived
/// field-by-field); [`crate::ltl_service::MemoizingLtlService`] relies on
/// this to memoize by structural expression equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    Number(i64),
    Bool(bool),
    Signal(Signal),
    Unary(UnaryOp, Rc<Expr>),
    Bin(BinOp, Rc<Expr>, Rc<Expr>),
    /// `Forall (i, j, ...) . inner`, binding a tuple of index-variable names.
    Forall {
        indices: Vec<String>,
        inner: Rc<Expr>,
    },
}

impl Expr {
    /// Shorthand for building a unary node.
    pub fn unary(op: UnaryOp, e: Expr) -> Expr {
        Expr::Unary(op, Rc::new(e))
    }

    /// Shorthand for building a binary node.
    pub fn bin(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Bin(op, Rc::new(lhs), Rc::new(rhs))
    }

    /// Conjunction of a list of expressions; empty list is `true`, singleton
    /// returns its element unchanged.
    pub fn and_all(mut exprs: Vec<Expr>) -> Expr {
        match exprs.len() {
            0 => Expr::Bool(true),
            1 => exprs.remove(0),
            _ => {
                let mut iter = exprs.into_iter();
                let first = iter.next().unwrap();
                iter.fold(first, |acc, e| Expr::bin(BinOp::And, acc, e))
            }
        }
    }

    /// Collect every [`Signal`] referenced anywhere in this expression.
    ///
    /// Pure traversal visitor: accumulates into a set, does not rewrite.
    pub fn collect_signals(&self, out: &mut std::collections::BTreeSet<Signal>) {
        match self {
            Expr::Number(_) | Expr::Bool(_) => {}
            Expr::Signal(s) => {
                out.insert(s.clone());
            }
            Expr::Unary(_, e) => e.collect_signals(out),
            Expr::Bin(_, l, r) => {
                l.collect_signals(out);
                r.collect_signals(out);
            }
            Expr::Forall { inner, .. } => inner.collect_signals(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_forms() {
        assert_eq!(Signal::Plain("r".into()).canonical(), "r");
        assert_eq!(
            Signal::Template {
                name: "g".into(),
                template: 0
            }
            .canonical(),
            "g_0"
        );
        assert_eq!(
            Signal::Instance {
                name: "g".into(),
                template: 0,
                instance: 3
            }
            .canonical(),
            "g_0_3"
        );
        assert_eq!(
            Signal::QuantifiedScheduler {
                template: 1,
                index: "j".into()
            }
            .canonical(),
            "is_scheduled_1_j"
        );
    }

    #[test]
    fn and_all_collapses_singletons() {
        let e = Expr::and_all(vec![Expr::Bool(true)]);
        assert_eq!(e, Expr::Bool(true));
    }

    #[test]
    fn and_all_empty_is_true() {
        assert_eq!(Expr::and_all(vec![]), Expr::Bool(true));
    }

    #[test]
    fn collect_signals_finds_nested() {
        let e = Expr::bin(
            BinOp::And,
            Expr::Signal(Signal::Plain("a".into())),
            Expr::unary(UnaryOp::Not, Expr::Signal(Signal::Plain("b".into()))),
        );
        let mut out = std::collections::BTreeSet::new();
        e.collect_signals(&mut out);
        assert_eq!(out.len(), 2);
    }
}
