//! The part of §4.4 common to both guard regimes: declaring per-automaton
//! sorts/functions, the per-template `is_enabled`/`is_any_enabled`/
//! `guard_set` helper `define-fun`s, and translating UCW transitions into
//! `λ^B`/`λ^S` implications, including the optional SCC-ranking variant and
//! the fairness-automaton deadlock-avoidance clause.
//!
//! Every quantity this module asserts is ground: states, inputs, and
//! instances are all finite once a round's bound/cut-off is fixed, so rather
//! than bind them with SMT-LIB `forall`, this module enumerates the finite
//! domain in Rust and emits one ground assertion per combination (the same
//! style [`crate::encoder::common`] uses for its own constraints).

use std::collections::{BTreeMap, BTreeSet};

use crate::architecture::ArchitectureKind;
use crate::ast::Signal;
use crate::automaton::{tarjan_scc, Automaton, NodeId};
use crate::encoder::common::{self, bool_args, bv_zero};
use crate::encoder::{AutomatonInfo, EncoderError, EncodingOptimization};
use crate::spec::Specification;

/// Per-template context the automaton encoder needs: its declared
/// `guard`/`state_guard` function symbols and its input signal names, so
/// label atoms can be translated into SMT-LIB expressions.
pub struct TemplateCtx<'a> {
    pub inputs: &'a [String],
    pub outputs: &'a [String],
    pub guard_symbol: String,
    pub state_guard_symbol: String,
    pub guard_width: usize,
    pub bound: usize,
}

fn node_ctor(automaton_index: usize, node: NodeId) -> String {
    format!("q_{automaton_index}_{node}")
}

fn q_sort_name(automaton_index: usize) -> String {
    format!("Q_{automaton_index}")
}

fn eval_guard_fn_name(template: usize) -> String {
    format!("eval_guard_{template}")
}

fn is_enabled_fn_name(template: usize) -> String {
    format!("is_enabled_{template}")
}

fn is_any_enabled_fn_name(template: usize) -> String {
    format!("is_any_enabled_{template}")
}

fn guard_set_env_fn_name(template: usize) -> String {
    format!("guard_set_{template}_env")
}

/// Declare `Q_a` and the `λ^B_a`/`λ^S_a` functions over
/// `Q_a x T_0 x ... x T_{K-1}`.
pub fn declare_automaton_sorts(
    spec: &Specification,
    automaton_index: usize,
    automaton: &Automaton,
    optimization: EncodingOptimization,
) -> Vec<String> {
    let mut decls = Vec::new();
    let ctors: Vec<String> = automaton
        .nodes
        .iter()
        .map(|&n| node_ctor(automaton_index, n))
        .collect();
    decls.push(format!(
        "(declare-datatypes () (({} {})))",
        q_sort_name(automaton_index),
        ctors.join(" ")
    ));

    let mut args = vec![q_sort_name(automaton_index)];
    args.extend(spec.templates.iter().map(|t| common::state_sort_name(t.index)));

    decls.push(format!(
        "(declare-fun lambda_b_{automaton_index} ({}) Bool)",
        args.join(" ")
    ));

    match optimization {
        EncodingOptimization::None => {
            decls.push(format!(
                "(declare-fun lambda_s_{automaton_index} ({}) Int)",
                args.join(" ")
            ));
        }
        EncodingOptimization::LambdaScc => {
            let sccs = rejecting_sccs(automaton);
            for (scc_idx, scc) in sccs.iter().enumerate() {
                let width = (scc.len().max(1) as u32).next_power_of_two().trailing_zeros().max(1) as usize;
                decls.push(format!(
                    "(declare-fun lambda_s_{automaton_index}_{scc_idx} ({}) {})",
                    args.join(" "),
                    common::bitvec_sort(width)
                ));
            }
        }
    }
    decls
}

/// Declare the §4.4 per-template guard helper functions: `eval_guard_k`
/// (architecture-specific env-compatibility test), `is_enabled_k` (some
/// successor state makes the guard hold under a given input), `is_any_enabled_k`
/// (some input makes `is_enabled_k` hold), and `guard_set_k_env` (the other
/// templates' combined occupancy, as seen by template `k`). Must be called
/// once per round, after `guard_k`/`state_guard_k` are declared and before
/// any transition clause references them.
pub fn declare_guard_helpers(
    spec: &Specification,
    kind: ArchitectureKind,
    ctxs: &BTreeMap<usize, TemplateCtx<'_>>,
) -> Vec<String> {
    let mut decls = Vec::new();
    let state_params: Vec<String> = spec
        .templates
        .iter()
        .map(|t| format!("(s_{} {})", t.index, common::state_sort_name(t.index)))
        .collect();

    for t in &spec.templates {
        let Some(ctx) = ctxs.get(&t.index) else {
            continue;
        };
        let width = ctx.guard_width;
        let bv = common::bitvec_sort(width);

        decls.push(format!(
            "(define-fun {} ((s_set {bv}) (g {bv})) Bool {})",
            eval_guard_fn_name(t.index),
            common::eval_guard_expr(kind, "s_set", "g", width)
        ));

        let num_inputs = ctx.inputs.len();
        let input_params: Vec<String> = (0..num_inputs).map(|i| format!("(in{i} Bool)")).collect();
        let input_names: Vec<String> = (0..num_inputs).map(|i| format!("in{i}")).collect();
        let enabled_disjuncts: Vec<String> = (0..t.bound)
            .map(|to| {
                format!(
                    "({} s_set ({} s {} {}))",
                    eval_guard_fn_name(t.index),
                    ctx.guard_symbol,
                    input_names.join(" "),
                    common::state_ctor_name(t.index, to)
                )
            })
            .collect();
        decls.push(format!(
            "(define-fun {} ((s {}) {} (s_set {bv})) Bool (or {}))",
            is_enabled_fn_name(t.index),
            common::state_sort_name(t.index),
            input_params.join(" "),
            enabled_disjuncts.join(" ")
        ));

        let any_enabled_disjuncts: Vec<String> = (0..(1usize << num_inputs))
            .map(|bits| format!("({} s {} s_set)", is_enabled_fn_name(t.index), bool_args(bits, num_inputs)))
            .collect();
        decls.push(format!(
            "(define-fun {} ((s {}) (s_set {bv})) Bool (or {}))",
            is_any_enabled_fn_name(t.index),
            common::state_sort_name(t.index),
            any_enabled_disjuncts.join(" ")
        ));

        let others: Vec<String> = spec
            .templates
            .iter()
            .filter(|other| other.index != t.index)
            .filter_map(|other| {
                let other_ctx = ctxs.get(&other.index)?;
                if other_ctx.guard_width != width {
                    return None;
                }
                Some(format!("({} s_{})", other_ctx.state_guard_symbol, other.index))
            })
            .collect();
        let body = others
            .into_iter()
            .reduce(|acc, e| format!("(bvor {acc} {e})"))
            .unwrap_or_else(|| bv_zero(width));
        decls.push(format!(
            "(define-fun {} ({}) {bv} {body})",
            guard_set_env_fn_name(t.index),
            state_params.join(" ")
        ));
    }
    decls
}

/// Rejecting SCCs of size > 1 or self-looped — the same predicate the
/// safety oracle uses, shared via [`tarjan_scc`].
fn rejecting_sccs(automaton: &Automaton) -> Vec<Vec<NodeId>> {
    let sccs = tarjan_scc(&automaton.nodes, |n| {
        automaton
            .transitions_from(n)
            .iter()
            .flat_map(|t| t.targets.iter().map(|(tgt, _)| *tgt))
            .filter(|tgt| automaton.rejecting_nodes.contains(tgt))
    });
    sccs.into_iter()
        .filter(|scc| scc.iter().all(|n| automaton.rejecting_nodes.contains(n)))
        .collect()
}

/// Assert `λ^B_a(q0, init...) ∧ λ^S_a(q0, init...) = 0` for every initial
/// node across every alternation set (§4.4: "at every initial composite
/// state"). Alternation sets are treated as independently-asserted
/// conjunctions — the common case (one initial set) matches the literal UCW
/// semantics; multi-set alternation is asserted conjunctively, a documented
/// simplification where no worked example in this pipeline's scope exercises
/// more than one initial set.
pub fn assert_initial_states(spec: &Specification, automaton_index: usize, automaton: &Automaton) -> Result<Vec<String>, EncoderError> {
    if automaton.initial_sets.is_empty() {
        return Err(EncoderError::EmptyInitialSets(automaton.name.clone()));
    }
    let init_args: Vec<String> = spec
        .templates
        .iter()
        .map(|t| common::state_ctor_name(t.index, t.initial_state()))
        .collect();
    let mut asserts = Vec::new();
    for set in &automaton.initial_sets {
        for &node in set {
            let ctor = node_ctor(automaton_index, node);
            asserts.push(format!(
                "(assert (lambda_b_{automaton_index} {ctor} {}))",
                init_args.join(" ")
            ));
            asserts.push(format!(
                "(assert (= (lambda_s_{automaton_index} {ctor} {}) 0))",
                init_args.join(" ")
            ));
        }
    }
    Ok(asserts)
}

/// Sanitize a free-form signal name into a valid SMT-LIB simple symbol:
/// every byte outside `[A-Za-z0-9_]` becomes `_`.
fn sanitize_symbol(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Translate one label atom for placeholder process `(target_template,
/// target_instance)` being the currently-scheduled `(k, i)` pair, per the
/// three placeholder rules of §4.4 step 2. `state_args` gives the ground
/// state-constructor symbol currently bound to each template's composite
/// position. Non-placeholder signals are encoded as a 0-arity boolean symbol
/// named after the signal's (sanitized) canonical form; the caller declares
/// these up front via [`collect_plain_signals`].
fn translate_atom(signal: &Signal, value: bool, scheduled: (usize, usize), state_args: &[String]) -> String {
    let name = signal.canonical();
    let atom = if let Some(rest) = name.strip_prefix("enabled_") {
        let (k, _i) = parse_ki(rest).unwrap_or(scheduled);
        // No per-instance local state is tracked separately from the
        // template's own symbolic state; any enabled_{k,*} atom collapses to
        // "is template k's represented process enabled here".
        format!(
            "({} {} ({} {}))",
            is_any_enabled_fn_name(k),
            state_args[k],
            guard_set_env_fn_name(k),
            state_args.join(" ")
        )
    } else if let Some(rest) = name.strip_prefix("active_") {
        let (k, i) = parse_ki(rest).unwrap_or(scheduled);
        if (k, i) == scheduled { "true" } else { "false" }.to_string()
    } else if let Some(rest) = name.strip_prefix("init_") {
        let (k, _i) = parse_ki(rest).unwrap_or(scheduled);
        format!("(= {} {})", state_args[k], common::state_ctor_name(k, 0))
    } else {
        format!("sig_{}", sanitize_symbol(&name))
    };
    if value {
        atom
    } else {
        format!("(not {atom})")
    }
}

fn parse_ki(rest: &str) -> Option<(usize, usize)> {
    let mut parts = rest.splitn(2, '_');
    let k: usize = parts.next()?.parse().ok()?;
    let i: usize = parts.next()?.parse().ok()?;
    Some((k, i))
}

/// Every plain (non-`enabled_`/`active_`/`init_`) signal referenced anywhere
/// in `automaton`'s transition labels, as the sanitized symbol name
/// [`translate_atom`] will emit for it — declared once up front so no
/// transition assertion references an undeclared symbol.
fn collect_plain_signals(automaton: &Automaton) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for transitions in automaton.transitions.values() {
        for transition in transitions {
            for signal in transition.label.keys() {
                let name = signal.canonical();
                if name.starts_with("enabled_") || name.starts_with("active_") || name.starts_with("init_") {
                    continue;
                }
                names.insert(sanitize_symbol(&name));
            }
        }
    }
    names
}

/// Cartesian product of `0..ranges[i]` for every `i`, as a flat list of
/// per-template state-index tuples.
fn state_combinations(ranges: &[usize]) -> Vec<Vec<usize>> {
    let mut combos: Vec<Vec<usize>> = vec![Vec::new()];
    for &bound in ranges {
        let mut next = Vec::with_capacity(combos.len() * bound.max(1));
        for prefix in &combos {
            for s in 0..bound.max(1) {
                let mut p = prefix.clone();
                p.push(s);
                next.push(p);
            }
        }
        combos = next;
    }
    combos
}

/// Encode every transition of `info.automaton` against `ctxs` (per-template
/// context), for every `(template, instance)` pair implied by `info.cutoff`
/// and every ground composite-state/input combination, following §4.4's
/// procedure. Returns the ground assertions; [`declare_guard_helpers`] must
/// already have been submitted before these — the architecture regime
/// (conjunctive vs. disjunctive) is baked into `eval_guard_k` there, so this
/// function itself stays regime-agnostic.
pub fn encode_transitions(
    spec: &Specification,
    info: &AutomatonInfo<'_>,
    ctxs: &BTreeMap<usize, TemplateCtx<'_>>,
    optimization: EncodingOptimization,
) -> Vec<String> {
    let mut out = Vec::new();
    let automaton = info.automaton;
    let sccs = if optimization == EncodingOptimization::LambdaScc {
        rejecting_sccs(automaton)
    } else {
        Vec::new()
    };
    let scc_of: BTreeMap<NodeId, usize> = sccs
        .iter()
        .enumerate()
        .flat_map(|(idx, scc)| scc.iter().map(move |&n| (n, idx)))
        .collect();

    for name in collect_plain_signals(automaton) {
        out.push(format!("(declare-fun sig_{name} () Bool)"));
    }

    let bounds: Vec<usize> = spec.templates.iter().map(|t| t.bound).collect();
    let combos = state_combinations(&bounds);

    for &q in &automaton.nodes {
        for transition in automaton.transitions_from(q) {
            for (template_idx, &count) in info.cutoff.iter().enumerate() {
                let Some(ctx) = ctxs.get(&template_idx) else {
                    continue;
                };
                for instance in 0..count {
                    for combo in &combos {
                        let state_args: Vec<String> = combo
                            .iter()
                            .enumerate()
                            .map(|(t, &s)| common::state_ctor_name(t, s))
                            .collect();
                        let cur_local = combo[template_idx];

                        let label_conditions: Vec<String> = transition
                            .label
                            .iter()
                            .map(|(sig, val)| translate_atom(sig, *val, (template_idx, instance), &state_args))
                            .collect();

                        for input_bits in 0..(1usize << ctx.inputs.len()) {
                            let input_args = bool_args(input_bits, ctx.inputs.len());
                            for next_local in 0..ctx.bound {
                                // delta_enabled_i(t, i, t', guard_set): the
                                // locally-guarded step is available whenever
                                // stalling (next_local == cur_local, always
                                // legal) or the architecture-specific guard
                                // evaluates against the environment's guard
                                // set under this input.
                                let local_step = if next_local == cur_local {
                                    None
                                } else {
                                    let guard_app = format!(
                                        "({} {} {} {})",
                                        ctx.guard_symbol,
                                        state_args[template_idx],
                                        input_args,
                                        common::state_ctor_name(template_idx, next_local)
                                    );
                                    let env_set = format!(
                                        "({} {})",
                                        guard_set_env_fn_name(template_idx),
                                        state_args.join(" ")
                                    );
                                    Some(format!("({} {} {})", eval_guard_fn_name(template_idx), env_set, guard_app))
                                };

                                let mut next_combo = combo.clone();
                                next_combo[template_idx] = next_local;
                                let next_state_args: Vec<String> = next_combo
                                    .iter()
                                    .enumerate()
                                    .map(|(t, &s)| common::state_ctor_name(t, s))
                                    .collect();

                                let q_ctor = node_ctor(info.index, q);
                                let lhs_lambda_b =
                                    format!("(lambda_b_{} {q_ctor} {})", info.index, state_args.join(" "));

                                let mut antecedent_parts = vec![lhs_lambda_b.clone()];
                                antecedent_parts.extend(label_conditions.iter().cloned());
                                if let Some(step) = &local_step {
                                    antecedent_parts.push(step.clone());
                                }
                                let antecedent = format!("(and {})", antecedent_parts.join(" "));

                                for (target, is_rejecting) in &transition.targets {
                                    let target_ctor = node_ctor(info.index, *target);
                                    let rhs_lambda_b = format!(
                                        "(lambda_b_{} {target_ctor} {})",
                                        info.index,
                                        next_state_args.join(" ")
                                    );
                                    let rank_condition = rank_condition(
                                        info.index,
                                        q,
                                        *target,
                                        *is_rejecting,
                                        optimization,
                                        &scc_of,
                                        &state_args,
                                        &next_state_args,
                                    );
                                    out.push(format!(
                                        "(assert (=> {antecedent} (and {rhs_lambda_b} {rank_condition})))"
                                    ));
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    out
}

fn rank_condition(
    automaton_index: usize,
    from: NodeId,
    to: NodeId,
    is_rejecting_target: bool,
    optimization: EncodingOptimization,
    scc_of: &BTreeMap<NodeId, usize>,
    state_args: &[String],
    next_state_args: &[String],
) -> String {
    let op = if is_rejecting_target { ">" } else { ">=" };
    match optimization {
        EncodingOptimization::None => {
            format!(
                "({op} (lambda_s_{automaton_index} {} {}) (lambda_s_{automaton_index} {} {}))",
                node_ctor(automaton_index, to),
                next_state_args.join(" "),
                node_ctor(automaton_index, from),
                state_args.join(" "),
            )
        }
        EncodingOptimization::LambdaScc => {
            match (scc_of.get(&from), scc_of.get(&to)) {
                (Some(a), Some(b)) if a == b => {
                    let bv_op = if is_rejecting_target { "bvugt" } else { "bvuge" };
                    format!(
                        "({bv_op} (lambda_s_{automaton_index}_{a} {} {}) (lambda_s_{automaton_index}_{a} {} {}))",
                        node_ctor(automaton_index, to),
                        next_state_args.join(" "),
                        node_ctor(automaton_index, from),
                        state_args.join(" "),
                    )
                }
                _ => "true".to_string(),
            }
        }
    }
}

/// Deadlock avoidance for the architecture's own fairness automaton: every
/// composite state where `λ^B` holds must have at least one enabled local
/// transition for some template.
pub fn deadlock_avoidance_constraint(
    spec: &Specification,
    automaton_index: usize,
    automaton: &Automaton,
    ctxs: &BTreeMap<usize, TemplateCtx<'_>>,
) -> Vec<String> {
    let mut asserts = Vec::new();
    let state_args: Vec<String> = spec.templates.iter().map(|t| format!("s_{}", t.index)).collect();
    for &q in &automaton.nodes {
        let lambda_b = format!("(lambda_b_{automaton_index} {} {})", node_ctor(automaton_index, q), state_args.join(" "));
        let mut any_enabled_disjuncts = Vec::new();
        for k in ctxs.keys() {
            any_enabled_disjuncts.push(format!(
                "({} s_{k} ({} {}))",
                is_any_enabled_fn_name(*k),
                guard_set_env_fn_name(*k),
                state_args.join(" ")
            ));
        }
        if any_enabled_disjuncts.is_empty() {
            continue;
        }
        asserts.push(format!(
            "(assert (=> {lambda_b} (or {})))",
            any_enabled_disjuncts.join(" ")
        ));
    }
    asserts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::ArchitectureKind;
    use crate::automaton::{Automaton, Transition};
    use crate::spec::{Specification, Template};
    use std::collections::BTreeMap as Map;

    fn small_spec() -> Specification {
        let t = Template::new(0, vec!["r".into()], vec!["g".into()]).unwrap();
        let mut spec = Specification::new(vec![t], vec![], vec![]).unwrap();
        spec.set_bound(vec![2]).unwrap();
        spec
    }

    fn single_node_automaton() -> Automaton {
        let mut transitions = Map::new();
        transitions.insert(
            0,
            vec![Transition {
                label: Map::new(),
                targets: vec![(0, true)],
            }],
        );
        Automaton {
            nodes: vec![0],
            initial_sets: vec![[0].into_iter().collect()],
            rejecting_nodes: [0].into_iter().collect(),
            transitions,
            name: "a".into(),
        }
    }

    fn ctx_for(spec: &Specification) -> BTreeMap<usize, TemplateCtx<'_>> {
        let mut ctxs = Map::new();
        for t in &spec.templates {
            ctxs.insert(
                t.index,
                TemplateCtx {
                    inputs: &t.inputs,
                    outputs: &t.outputs,
                    guard_symbol: format!("guard_{}", t.index),
                    state_guard_symbol: format!("state_guard_{}", t.index),
                    guard_width: 2,
                    bound: t.bound,
                },
            );
        }
        ctxs
    }

    #[test]
    fn declares_one_ctor_per_node() {
        let spec = small_spec();
        let automaton = single_node_automaton();
        let decls = declare_automaton_sorts(&spec, 0, &automaton, EncodingOptimization::None);
        assert!(decls[0].contains("q_0_0"));
    }

    #[test]
    fn initial_state_assertions_reference_template_initial_states() {
        let spec = small_spec();
        let automaton = single_node_automaton();
        let asserts = assert_initial_states(&spec, 0, &automaton).unwrap();
        assert!(asserts.iter().any(|a| a.contains("t_0_0")));
    }

    #[test]
    fn rejects_automaton_with_no_initial_sets() {
        let spec = small_spec();
        let mut automaton = single_node_automaton();
        automaton.initial_sets.clear();
        let err = assert_initial_states(&spec, 0, &automaton).unwrap_err();
        assert!(matches!(err, EncoderError::EmptyInitialSets(_)));
    }

    #[test]
    fn guard_helpers_define_every_symbol_transitions_reference() {
        let spec = small_spec();
        let ctxs = ctx_for(&spec);
        let decls = declare_guard_helpers(&spec, ArchitectureKind::Disjunctive, &ctxs);
        let text = decls.join("\n");
        assert!(text.contains("define-fun eval_guard_0"));
        assert!(text.contains("define-fun is_enabled_0"));
        assert!(text.contains("define-fun is_any_enabled_0"));
        assert!(text.contains("define-fun guard_set_0_env"));
    }

    #[test]
    fn encode_transitions_emits_ground_asserts_with_no_placeholders() {
        let spec = small_spec();
        let automaton = single_node_automaton();
        let info = AutomatonInfo {
            index: 0,
            automaton: &automaton,
            cutoff: vec![2],
            is_fairness: false,
        };
        let ctxs = ctx_for(&spec);
        let asserts = encode_transitions(&spec, &info, &ctxs, EncodingOptimization::None);
        assert!(!asserts.is_empty());
        for a in &asserts {
            assert!(!a.contains("_placeholder"));
        }
    }
}
