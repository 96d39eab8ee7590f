//! SMT encoding layer: declares per-template uninterpreted functions, adds
//! architectural constraints, and encodes each instantiated UCW as
//! implications between `λ^B`/`λ^S` valuations across transitions.
//!
//! The common structure (sorts, output/guard functions, architectural
//! constraints, automaton-transition encoding) lives in [`common`]; the two
//! concrete variants ([`state_guarded`], [`label_guarded`]) differ only in
//! how a state's guard bit pattern is derived and, for label-guarded, in an
//! extra iterative-deepening check loop over auxiliary label switches.

pub mod automaton_enc;
pub mod common;
pub mod label_guarded;
pub mod state_guarded;

use std::collections::BTreeMap;

use crate::architecture::Architecture;
use crate::automaton::Automaton;
use crate::model::TemplateModel;
use crate::solver::{Solver, SolverError};
use crate::spec::Specification;

/// Switch controlling the optional SCC-ranking optimization of §4.4.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EncodingOptimization {
    #[default]
    None,
    LambdaScc,
}

/// Errors raised by an encoder.
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("automaton '{0}' has no initial node sets")]
    EmptyInitialSets(String),
}

/// One property ready for automaton encoding: the automaton itself, and the
/// `(template, instance)` cut-off pairs it must be instantiated over.
pub struct AutomatonInfo<'a> {
    pub index: usize,
    pub automaton: &'a Automaton,
    /// Per-template instance count ("cut-off") for this automaton.
    pub cutoff: Vec<usize>,
    /// Whether this is the architecture's own fairness automaton, which
    /// additionally gets the deadlock-avoidance constraint of §4.4.
    pub is_fairness: bool,
}

/// Base contract shared by the state-guarded and label-guarded encoders.
///
/// Mirrors the original's `SMTEncoder` abstract base: `encode` declares the
/// template skeleton and architectural constraints, `encode_automata`
/// encodes a batch of instantiated UCWs against that skeleton, and `check`
/// drives the solver (with, for the label-guarded variant, an extra
/// iterative-deepening loop over auxiliary label switches).
pub trait SMTEncoder {
    fn encode(&mut self, solver: &mut dyn Solver) -> Result<(), EncoderError>;

    fn encode_automata(
        &mut self,
        solver: &mut dyn Solver,
        automata: &[AutomatonInfo<'_>],
        global_cutoff: usize,
    ) -> Result<(), EncoderError>;

    fn check(
        &mut self,
        solver: &mut dyn Solver,
    ) -> Result<Option<BTreeMap<usize, TemplateModel>>, EncoderError>;
}

/// Selects which guard regime's bit-slice width formula and `eval_guard`
/// semantics apply; threaded through [`common`] so both variants share one
/// architectural-constraint implementation.
pub fn guard_kind(architecture: &Architecture) -> crate::architecture::ArchitectureKind {
    architecture.kind
}

/// Convenience: total number of states across all templates, used to size
/// the state-guarded bit-vector.
pub fn total_state_count(spec: &Specification) -> usize {
    spec.templates.iter().map(|t| t.bound).sum()
}
