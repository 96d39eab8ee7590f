//! Crate root: public surface and crate-wide error aggregation.
//!
//! This crate implements parameterized bounded synthesis for guarded
//! distributed systems: an LTL specification quantified over an unbounded
//! number of symmetric process templates is reduced, via the architecture's
//! cut-off theorem, to a finite-instance synthesis problem encoded as an SMT
//! query over uninterpreted functions. See [`parser`] for the input format,
//! [`synthesis`] for the outer bounded-synthesis loop, and [`encoder`] for
//! the two guard-regime encodings.
//!
//! ## Pipeline
//!
//! 1. [`parser`] reads a specification file into a [`spec::Specification`].
//! 2. [`architecture`] supplies the cut-off formulas and architectural
//!    assumption/guarantee properties for the chosen guard type.
//! 3. [`synthesis::synthesize`] drives iterative deepening: each round,
//!    [`instantiate`] expands quantified properties to concrete instances,
//!    [`ltl_service`] converts each to a [`automaton::Automaton`], and an
//!    [`encoder::SMTEncoder`] asserts the encoding against a fresh
//!    [`solver::Solver`].
//! 4. On success, the resulting [`model::TemplateModel`]s can be rendered
//!    with [`dot::render`].
//!
//! [`benchmark`] and [`config`] support the `synth-bench` harness binary.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

/// LTL formula AST and signal references.
pub mod ast;
/// Specification model: templates, properties, bounds, cut-offs.
pub mod spec;
/// Guard architecture: cut-off formulas and architectural properties.
pub mod architecture;
/// Quantifier instantiation over concrete instance counts.
pub mod instantiate;
/// Universal co-Büchi word automata and SCC-based safety/liveness analysis.
pub mod automaton;
/// External LTL-to-UCW translation service.
pub mod ltl_service;
/// External SMT solver interface (SMT-LIB2 over stdio).
pub mod solver;
/// Synthesized template models (states, outputs, transitions).
pub mod model;
/// SMT encoding: state-guarded and label-guarded variants.
pub mod encoder;
/// The bounded-synthesis outer loop.
pub mod synthesis;
/// Specification file parser.
pub mod parser;
/// Graphviz visualization of synthesized models.
pub mod dot;
/// Benchmark configuration parsing and supervised-run harness.
pub mod benchmark;
/// External-binary paths and logging verbosity configuration.
pub mod config;

/// Crate-wide error aggregation across the pipeline stages, used at the
/// CLI boundary where any stage may fail.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error(transparent)]
    Specification(#[from] spec::SpecificationError),
    #[error(transparent)]
    Architecture(#[from] architecture::ArchitectureError),
    #[error(transparent)]
    LtlService(#[from] ltl_service::LtlServiceError),
    #[error(transparent)]
    Solver(#[from] solver::SolverError),
    #[error(transparent)]
    Encoder(#[from] encoder::EncoderError),
    #[error(transparent)]
    Synthesis(#[from] synthesis::SynthesisError),
    #[error(transparent)]
    Parse(#[from] parser::ParseError),
    #[error(transparent)]
    Configuration(#[from] benchmark::ConfigurationError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}
