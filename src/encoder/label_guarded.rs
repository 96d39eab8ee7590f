//! Label-guarded encoder: a guard is the boolean assignment to a template's
//! output signals, plus a configurable number of anonymous auxiliary label
//! bits used to break symmetry between guards that agree on every output.

use std::collections::BTreeMap;

use crate::architecture::{Architecture, ArchitectureKind};
use crate::encoder::automaton_enc::{self, TemplateCtx};
use crate::encoder::common;
use crate::encoder::{AutomatonInfo, EncoderError, EncodingOptimization, SMTEncoder};
use crate::model::TemplateModel;
use crate::solver::{CheckResult, FnHandle, Solver};
use crate::spec::Specification;

/// Number of distinct output assignments for a template: `2^{|O_k|}`.
pub fn num_label_guard_vars(num_outputs: usize) -> usize {
    1usize << num_outputs
}

/// Per-template guard-slice sizing: the caller (the outer synthesis loop)
/// grows this across rounds to add auxiliary label bits; absent an explicit
/// choice it defaults to exactly `num_label_guard_vars`, i.e. no aux bits.
pub fn default_guard_slice_size(num_outputs: usize) -> usize {
    num_label_guard_vars(num_outputs)
}

struct TemplateLabelInfo {
    guard_width: usize,
    num_aux_vars: usize,
    aux_switches: Vec<String>,
}

/// Implements [`SMTEncoder`] for the label-guarded variant. `guard_slice_sizes`
/// gives, per template index, the total guard bit-vector width (at least
/// `num_label_guard_vars`); the surplus becomes auxiliary label bits.
pub struct LabelGuardedEncoder<'a> {
    spec: &'a Specification,
    architecture: Architecture,
    optimization: EncodingOptimization,
    guard_slice_sizes: Vec<usize>,
    output_fns: BTreeMap<(usize, String), FnHandle>,
    state_guard_fns: BTreeMap<usize, FnHandle>,
    guard_fns: BTreeMap<usize, FnHandle>,
    label_info: BTreeMap<usize, TemplateLabelInfo>,
}

impl<'a> LabelGuardedEncoder<'a> {
    pub fn new(
        spec: &'a Specification,
        architecture: Architecture,
        optimization: EncodingOptimization,
        guard_slice_sizes: Vec<usize>,
    ) -> Self {
        LabelGuardedEncoder {
            spec,
            architecture,
            optimization,
            guard_slice_sizes,
            output_fns: BTreeMap::new(),
            state_guard_fns: BTreeMap::new(),
            guard_fns: BTreeMap::new(),
            label_info: BTreeMap::new(),
        }
    }

    fn guard_width_for(&self, template_index: usize) -> usize {
        self.guard_slice_sizes
            .get(template_index)
            .copied()
            .unwrap_or_else(|| default_guard_slice_size(self.spec.templates[template_index].outputs.len()))
    }

    fn ctxs(&self) -> BTreeMap<usize, TemplateCtx<'a>> {
        self.spec
            .templates
            .iter()
            .map(|t| {
                (
                    t.index,
                    TemplateCtx {
                        inputs: &t.inputs,
                        outputs: &t.outputs,
                        guard_symbol: self.guard_fns[&t.index].symbol.clone(),
                        state_guard_symbol: self.state_guard_fns[&t.index].symbol.clone(),
                        guard_width: self.label_info[&t.index].guard_width,
                        bound: t.bound,
                    },
                )
            })
            .collect()
    }

    /// Every auxiliary switch symbol across every template, in declaration
    /// order; used to drive the iterative-deepening loop in [`check`].
    fn all_aux_switches(&self) -> Vec<String> {
        let mut all = Vec::new();
        for info in self.label_info.values() {
            all.extend(info.aux_switches.iter().cloned());
        }
        all
    }
}

impl<'a> SMTEncoder for LabelGuardedEncoder<'a> {
    fn encode(&mut self, solver: &mut dyn Solver) -> Result<(), EncoderError> {
        for t in &self.spec.templates {
            solver.submit(&common::declare_state_sort(t))?;

            for output in &t.outputs {
                let (decl, handle) = common::declare_output_fn(t.index, output);
                solver.submit(&decl)?;
                self.output_fns.insert((t.index, output.clone()), handle);
            }

            let num_label_vars = num_label_guard_vars(t.outputs.len());
            let guard_width = self.guard_width_for(t.index).max(num_label_vars);
            let num_aux_vars = guard_width - num_label_vars;
            if num_aux_vars > 0 {
                tracing::debug!(template = t.index, num_aux_vars, "label guard slice carries auxiliary bits");
            }

            let (decl, handle) = common::declare_state_guard_fn(t.index, guard_width);
            solver.submit(&decl)?;
            self.state_guard_fns.insert(t.index, handle);

            let (decl, handle) = common::declare_guard_fn(t, guard_width);
            solver.submit(&decl)?;
            self.guard_fns.insert(t.index, handle.clone());

            // state_guard(state) pins down each output bit to the state's
            // assigned output value: bit j of the label-var slice reflects
            // whether state s asserts output j.
            for (j, output) in t.outputs.iter().enumerate() {
                for s in 0..t.bound {
                    let state_ctor = common::state_ctor_name(t.index, s);
                    let pattern = format!("({} {state_ctor})", self.state_guard_fns[&t.index].symbol);
                    let out_applied = format!("({} {state_ctor})", self.output_fns[&(t.index, output.clone())].symbol);
                    solver.submit(&format!(
                        "(assert (= ((_ extract {j} {j}) {pattern}) (ite {out_applied} #b1 #b0)))"
                    ))?;
                }
            }

            let mut aux_switches = Vec::new();
            for i in 0..num_aux_vars {
                let symbol = format!("aux_{}_{i}", t.index);
                solver.submit(&format!("(declare-fun {symbol} ({}) Bool)", common::state_sort_name(t.index)))?;

                let switch = format!("use_aux_{}_{i}", t.index);
                solver.submit(&format!("(declare-fun {switch} () Bool)"))?;
                aux_switches.push(switch);
            }

            self.label_info.insert(
                t.index,
                TemplateLabelInfo {
                    guard_width,
                    num_aux_vars,
                    aux_switches,
                },
            );

            let guard_fn = self.guard_fns[&t.index].clone();
            for a in common::determinism_constraints(t, &guard_fn, self.architecture.kind, guard_width) {
                solver.submit(&a)?;
            }
            for a in common::non_input_blocking_constraints(t, &guard_fn, guard_width) {
                solver.submit(&a)?;
            }
            if self.architecture.kind == ArchitectureKind::Conjunctive {
                for a in common::conjunctive_init_containment_constraints(self.spec, t, &guard_fn, guard_width) {
                    solver.submit(&a)?;
                }
            }
        }
        Ok(())
    }

    fn encode_automata(
        &mut self,
        solver: &mut dyn Solver,
        automata: &[AutomatonInfo<'_>],
        _global_cutoff: usize,
    ) -> Result<(), EncoderError> {
        let ctxs = self.ctxs();
        for d in automaton_enc::declare_guard_helpers(self.spec, self.architecture.kind, &ctxs) {
            solver.submit(&d)?;
        }
        for info in automata {
            for d in automaton_enc::declare_automaton_sorts(self.spec, info.index, info.automaton, self.optimization) {
                solver.submit(&d)?;
            }
            for a in automaton_enc::assert_initial_states(self.spec, info.index, info.automaton)? {
                solver.submit(&a)?;
            }
            for a in automaton_enc::encode_transitions(self.spec, info, &ctxs, self.optimization) {
                solver.submit(&a)?;
            }
            if info.is_fairness {
                for a in automaton_enc::deadlock_avoidance_constraint(self.spec, info.index, info.automaton, &ctxs) {
                    solver.submit(&a)?;
                }
            }
        }
        Ok(())
    }

    /// Iterative deepening over auxiliary label switches: push, assert the
    /// first `n` switches on and the rest off, check, pop; grow `n` from 0
    /// until SAT or all switches exhausted. A template set with no auxiliary
    /// vars at all performs a single check.
    fn check(&mut self, solver: &mut dyn Solver) -> Result<Option<BTreeMap<usize, TemplateModel>>, EncoderError> {
        let switches = self.all_aux_switches();
        let total_aux_vars: usize = self.label_info.values().map(|info| info.num_aux_vars).sum();
        tracing::debug!(total_aux_vars, switches = switches.len(), "entering label-guarded check loop");
        if switches.is_empty() {
            let result = solver.check()?;
            if result != CheckResult::Sat {
                return Ok(None);
            }
            let queries = self.model_queries();
            let entries = solver.get_values(&queries)?;
            return Ok(Some(crate::encoder::state_guarded::extract_model(self.spec, &self.output_fns, &entries)));
        }

        for n in 0..=switches.len() {
            solver.push()?;
            for (idx, switch) in switches.iter().enumerate() {
                let value = if idx < n { "true" } else { "false" };
                solver.submit(&format!("(assert (= {switch} {value}))"))?;
            }
            let result = solver.check()?;
            if result == CheckResult::Sat {
                let queries = self.model_queries();
                let entries = solver.get_values(&queries)?;
                let model = crate::encoder::state_guarded::extract_model(self.spec, &self.output_fns, &entries);
                solver.pop()?;
                return Ok(Some(model));
            }
            solver.pop()?;
        }
        Ok(None)
    }
}

impl<'a> LabelGuardedEncoder<'a> {
    fn model_queries(&self) -> Vec<String> {
        let mut queries = Vec::new();
        for t in &self.spec.templates {
            for output in &t.outputs {
                let handle = &self.output_fns[&(t.index, output.clone())];
                for s in 0..t.bound {
                    queries.push(format!("({} {})", handle.symbol, common::state_ctor_name(t.index, s)));
                }
            }
        }
        queries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Template;

    fn spec_with(bound: usize, outputs: Vec<&str>) -> Specification {
        let t = Template::new(0, vec!["r".into()], outputs.into_iter().map(String::from).collect()).unwrap();
        let mut spec = Specification::new(vec![t], vec![], vec![]).unwrap();
        spec.set_bound(vec![bound]).unwrap();
        spec.set_cutoff(vec![bound]).unwrap();
        spec
    }

    #[test]
    fn num_label_guard_vars_is_power_of_two_of_outputs() {
        assert_eq!(num_label_guard_vars(0), 1);
        assert_eq!(num_label_guard_vars(2), 4);
    }

    #[test]
    fn encode_with_no_surplus_width_declares_no_aux_vars() {
        let spec = spec_with(2, vec!["g"]);
        let mut enc = LabelGuardedEncoder::new(&spec, Architecture::new(ArchitectureKind::Disjunctive), EncodingOptimization::None, vec![2]);
        let mut solver = crate::solver::StubSolver::always(CheckResult::Sat);
        enc.encode(&mut solver).unwrap();
        assert!(!solver.commands.iter().any(|c| c.contains("aux_0_0")));
    }

    #[test]
    fn encode_with_surplus_width_declares_aux_vars_and_switches() {
        let spec = spec_with(2, vec!["g"]);
        let mut enc = LabelGuardedEncoder::new(&spec, Architecture::new(ArchitectureKind::Disjunctive), EncodingOptimization::None, vec![3]);
        let mut solver = crate::solver::StubSolver::always(CheckResult::Sat);
        enc.encode(&mut solver).unwrap();
        assert!(solver.commands.iter().any(|c| c.contains("aux_0_0")));
        assert!(solver.commands.iter().any(|c| c.contains("use_aux_0_0")));
        assert_eq!(enc.label_info[&0].num_aux_vars, 1);
    }

    #[test]
    fn check_with_no_aux_vars_performs_single_check() {
        let spec = spec_with(2, vec!["g"]);
        let mut enc = LabelGuardedEncoder::new(&spec, Architecture::new(ArchitectureKind::Disjunctive), EncodingOptimization::None, vec![2]);
        let mut solver = crate::solver::StubSolver::always(CheckResult::Unsat);
        enc.encode(&mut solver).unwrap();
        assert!(enc.check(&mut solver).unwrap().is_none());
        assert!(!solver.commands.iter().any(|c| c.contains("push")));
    }

    #[test]
    fn check_with_aux_vars_iterates_pushes_until_exhausted() {
        let spec = spec_with(2, vec!["g"]);
        let mut enc = LabelGuardedEncoder::new(&spec, Architecture::new(ArchitectureKind::Disjunctive), EncodingOptimization::None, vec![3]);
        let mut solver = crate::solver::StubSolver::always(CheckResult::Unsat);
        enc.encode(&mut solver).unwrap();
        assert!(enc.check(&mut solver).unwrap().is_none());
        let push_count = solver.commands.iter().filter(|c| c.contains("push")).count();
        assert_eq!(push_count, 2); // n = 0..=1 aux switches
    }
}
