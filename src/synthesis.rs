//! The bounded-synthesis outer loop of §4.6: iterative deepening over the
//! per-template bound, cut-off recomputation each round, and a fresh
//! encoder/solver pair per round.

use std::time::{Duration, Instant};

use crate::architecture::Architecture;
use crate::ast::Expr;
use crate::automaton::Automaton;
use crate::encoder::{AutomatonInfo, EncoderError, EncodingOptimization, SMTEncoder};
use crate::encoder::label_guarded::LabelGuardedEncoder;
use crate::encoder::state_guarded::StateGuardedEncoder;
use crate::instantiate::instantiate;
use crate::ltl_service::{LtlServiceError, LtlToUcw};
use crate::model::TemplateModel;
use crate::solver::{Solver, SolverError};
use crate::spec::{Property, Specification};
use std::collections::BTreeMap;

/// Errors raised while driving a synthesis run.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Architecture(#[from] crate::architecture::ArchitectureError),
    #[error(transparent)]
    LtlService(#[from] LtlServiceError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Encoder(#[from] EncoderError),
    #[error(transparent)]
    Specification(#[from] crate::spec::SpecificationError),
}

/// User-configurable knobs for a synthesis run, sourced from CLI flags.
#[derive(Clone, Debug)]
pub struct SynthesisOptions {
    pub min_bound: Vec<usize>,
    pub max_increments: usize,
    pub instance_count: Vec<usize>,
    pub test_mode: bool,
    pub optimization: EncodingOptimization,
    pub label_guards: bool,
}

/// The outcome of a completed run: either a synthesized model and the bound
/// at which it was found, or exhaustion with no model found.
pub struct SynthesisOutcome {
    pub models: Option<BTreeMap<usize, TemplateModel>>,
    pub final_bound: Vec<usize>,
    pub rounds_run: usize,
    pub elapsed: Duration,
}

/// Drive the outer loop against `spec` using `architecture`'s cut-off
/// formulas, `ltl` to translate each instantiated property into a UCW, and
/// a fresh `Solver` built by `new_solver` each round.
pub fn synthesize<L, F, S>(
    spec: &mut Specification,
    architecture: &Architecture,
    ltl: &L,
    mut new_solver: F,
    options: &SynthesisOptions,
) -> Result<SynthesisOutcome, SynthesisError>
where
    L: LtlToUcw,
    F: FnMut() -> S,
    S: Solver,
{
    let start = Instant::now();
    let k = spec.templates_count();

    for round in 0..options.max_increments {
        let bound: Vec<usize> = options
            .min_bound
            .iter()
            .map(|&b| b + round)
            .collect();
        spec.set_bound(bound.clone())?;

        let mut cutoff = architecture.architecture_cutoff(&bound);
        truncate_to_instances(&mut cutoff, &options.instance_count);
        if options.test_mode {
            cutoff = options.instance_count.clone();
        }
        spec.set_cutoff(cutoff.clone())?;

        let mut guarantee_cutoffs = Vec::with_capacity(spec.guarantees.len());
        for g in &spec.guarantees {
            let mut gc = architecture.guarantee_cutoff(g, &bound)?;
            truncate_to_instances(&mut gc, &options.instance_count);
            if options.test_mode {
                gc = options.instance_count.clone();
            }
            guarantee_cutoffs.push(gc);
        }

        let arch_indices: Vec<(usize, String)> = (0..k).map(|t| (t, format!("i{t}"))).collect();
        let arch_assumptions = architecture.architecture_assumptions(&arch_indices);
        let arch_guarantees = architecture.architecture_guarantees(&arch_indices);

        let mut properties: Vec<(Vec<Property>, Property, Vec<usize>, bool)> = Vec::new();
        // §4.6: prepend the standalone scheduling-fairness-implies-enabledness
        // pair for every template/index before anything else.
        for (t, j) in &arch_indices {
            let (a, g) = architecture.architecture_properties(*t, j);
            properties.push((vec![a], g, cutoff.clone(), false));
        }
        for (a, g) in arch_assumptions.iter().zip(arch_guarantees.iter()) {
            properties.push((vec![a.clone()], g.clone(), cutoff.clone(), false));
        }
        for (g, gc) in spec.guarantees.iter().zip(guarantee_cutoffs.iter()) {
            let exceeds = gc.iter().zip(cutoff.iter()).any(|(a, b)| a > b);
            let mut assumptions = arch_assumptions.clone();
            assumptions.extend(spec.assumptions.clone());
            properties.push((assumptions, g.clone(), gc.clone(), exceeds));
        }

        let automata = build_automata(&properties, ltl, &cutoff)?;

        let mut solver = new_solver();
        let mut encoder: Box<dyn SMTEncoder> = if options.label_guards {
            let slices: Vec<usize> = spec
                .templates
                .iter()
                .map(|t| crate::encoder::label_guarded::default_guard_slice_size(t.outputs.len()))
                .collect();
            Box::new(LabelGuardedEncoder::new(spec, *architecture, options.optimization, slices))
        } else {
            Box::new(StateGuardedEncoder::new(spec, *architecture, options.optimization))
        };

        encoder.encode(&mut solver)?;
        let global_cutoff = cutoff.iter().sum();
        let automaton_infos: Vec<AutomatonInfo<'_>> = automata.iter().map(|a| a.as_info()).collect();
        encoder.encode_automata(&mut solver, &automaton_infos, global_cutoff)?;

        if let Some(models) = encoder.check(&mut solver)? {
            return Ok(SynthesisOutcome {
                models: Some(models),
                final_bound: bound,
                rounds_run: round + 1,
                elapsed: start.elapsed(),
            });
        }
    }

    Ok(SynthesisOutcome {
        models: None,
        final_bound: options
            .min_bound
            .iter()
            .map(|&b| b + options.max_increments.saturating_sub(1))
            .collect(),
        rounds_run: options.max_increments,
        elapsed: start.elapsed(),
    })
}

fn truncate_to_instances(cutoff: &mut [usize], instance_count: &[usize]) {
    for (c, &max) in cutoff.iter_mut().zip(instance_count.iter()) {
        if *c > max {
            *c = max;
        }
    }
}

/// Instantiate each property, convert to a UCW, and package the per-template
/// cut-off that automaton must be checked against.
fn build_automata<L: LtlToUcw>(
    properties: &[(Vec<Property>, Property, Vec<usize>, bool)],
    ltl: &L,
    global_cutoff: &[usize],
) -> Result<Vec<OwnedAutomatonInfo>, SynthesisError> {
    let mut result = Vec::with_capacity(properties.len());
    for (index, (assumptions, guarantee, cutoff, is_fairness)) in properties.iter().enumerate() {
        let cutoff_sum: usize = global_cutoff.iter().sum();
        let mut body = instantiate(guarantee, cutoff, cutoff_sum);
        for a in assumptions {
            let a_body = instantiate(a, cutoff, cutoff_sum);
            body = Expr::bin(crate::ast::BinOp::Implies, a_body, body);
        }
        let automaton = ltl.convert(&body)?;
        result.push(OwnedAutomatonInfo {
            index,
            automaton,
            cutoff: cutoff.clone(),
            is_fairness: *is_fairness,
        });
    }
    Ok(result)
}

struct OwnedAutomatonInfo {
    index: usize,
    automaton: Automaton,
    cutoff: Vec<usize>,
    is_fairness: bool,
}

impl OwnedAutomatonInfo {
    fn as_info(&self) -> AutomatonInfo<'_> {
        AutomatonInfo {
            index: self.index,
            automaton: &self.automaton,
            cutoff: self.cutoff.clone(),
            is_fairness: self.is_fairness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::ArchitectureKind;
    use crate::ltl_service::LtlToUcw;
    use crate::solver::{CheckResult, StubSolver};
    use crate::spec::Template;
    use std::collections::BTreeSet;

    struct AlwaysSafeLtl;
    impl LtlToUcw for AlwaysSafeLtl {
        fn convert(&self, _expr: &Expr) -> Result<Automaton, LtlServiceError> {
            let mut transitions = BTreeMap::new();
            transitions.insert(0, vec![]);
            Ok(Automaton {
                nodes: vec![0],
                initial_sets: vec![[0].into_iter().collect::<BTreeSet<_>>()],
                rejecting_nodes: BTreeSet::new(),
                transitions,
                name: "safe".into(),
            })
        }
    }

    #[test]
    fn terminates_with_no_model_when_solver_always_unsat() {
        let t = Template::new(0, vec!["r".into()], vec!["g".into()]).unwrap();
        let mut spec = Specification::new(vec![t], vec![], vec![]).unwrap();
        let arch = Architecture::new(ArchitectureKind::Disjunctive);
        let options = SynthesisOptions {
            min_bound: vec![1],
            max_increments: 2,
            instance_count: vec![3],
            test_mode: false,
            optimization: EncodingOptimization::None,
            label_guards: false,
        };
        let outcome = synthesize(
            &mut spec,
            &arch,
            &AlwaysSafeLtl,
            || StubSolver::always(CheckResult::Unsat),
            &options,
        )
        .unwrap();
        assert!(outcome.models.is_none());
        assert_eq!(outcome.rounds_run, 2);
    }

    #[test]
    fn succeeds_immediately_when_solver_always_sat() {
        let t = Template::new(0, vec!["r".into()], vec!["g".into()]).unwrap();
        let mut spec = Specification::new(vec![t], vec![], vec![]).unwrap();
        let arch = Architecture::new(ArchitectureKind::Disjunctive);
        let options = SynthesisOptions {
            min_bound: vec![1],
            max_increments: 3,
            instance_count: vec![3],
            test_mode: false,
            optimization: EncodingOptimization::None,
            label_guards: false,
        };
        let outcome = synthesize(
            &mut spec,
            &arch,
            &AlwaysSafeLtl,
            || StubSolver::always(CheckResult::Sat),
            &options,
        )
        .unwrap();
        assert!(outcome.models.is_some());
        assert_eq!(outcome.rounds_run, 1);
        assert_eq!(outcome.final_bound, vec![1]);
    }

    #[test]
    fn truncate_to_instances_caps_each_template() {
        let mut cutoff = vec![5, 2];
        truncate_to_instances(&mut cutoff, &[3, 10]);
        assert_eq!(cutoff, vec![3, 2]);
    }
}
