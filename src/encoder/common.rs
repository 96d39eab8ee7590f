//! Shared SMT-LIB2 text generation: sorts, uninterpreted functions, and the
//! architectural constraints that do not depend on the guard regime's bit
//! layout (only on its `eval_guard` semantics).
//!
//! Every quantity here is finite by construction (a fixed bound, a fixed
//! cut-off, boolean inputs): rather than emit SMT-LIB `forall` binders, this
//! module grounds each "for all states/inputs" constraint by enumerating the
//! finite domain directly in Rust and asserting one ground instance per
//! combination. This is sound precisely because nothing in this pipeline's
//! domains is actually unbounded once a round's bound/cut-off is fixed.

use crate::architecture::ArchitectureKind;
use crate::solver::FnHandle;
use crate::spec::{Specification, Template};

/// State sort name for template `k`, e.g. `T_0`.
pub fn state_sort_name(template: usize) -> String {
    format!("T_{template}")
}

/// Constructor name for state `i` of template `k`, e.g. `t_0_2`.
pub fn state_ctor_name(template: usize, state: usize) -> String {
    format!("t_{template}_{state}")
}

/// `(declare-datatypes () ((T_k t_k_0 t_k_1 ...)))`.
pub fn declare_state_sort(template: &Template) -> String {
    let ctors: Vec<String> = (0..template.bound)
        .map(|s| state_ctor_name(template.index, s))
        .collect();
    format!(
        "(declare-datatypes () (({} {})))",
        state_sort_name(template.index),
        ctors.join(" ")
    )
}

/// `(_ BitVec width)`.
pub fn bitvec_sort(width: usize) -> String {
    format!("(_ BitVec {width})")
}

/// `(_ bv0 width)`.
pub fn bv_zero(width: usize) -> String {
    format!("(_ bv0 {width})")
}

/// One uninterpreted output function per output signal: `o(t_k) -> Bool`.
pub fn declare_output_fn(template: usize, output: &str) -> (String, FnHandle) {
    let symbol = format!("out_{output}_{template}");
    let decl = format!("(declare-fun {symbol} ({}) Bool)", state_sort_name(template));
    (decl, FnHandle::new(symbol, 1))
}

/// `state_guard: T_k -> BitVec(width)`.
pub fn declare_state_guard_fn(template: usize, guard_width: usize) -> (String, FnHandle) {
    let symbol = format!("state_guard_{template}");
    let decl = format!(
        "(declare-fun {symbol} ({}) {})",
        state_sort_name(template),
        bitvec_sort(guard_width)
    );
    (decl, FnHandle::new(symbol, 1))
}

/// `guard: T_k x Bool^{|inputs_k|} x T_k -> BitVec(width)`.
pub fn declare_guard_fn(template: &Template, guard_width: usize) -> (String, FnHandle) {
    let symbol = format!("guard_{}", template.index);
    let mut args = vec![state_sort_name(template.index)];
    args.extend(template.inputs.iter().map(|_| "Bool".to_string()));
    args.push(state_sort_name(template.index));
    let decl = format!(
        "(declare-fun {symbol} ({}) {})",
        args.join(" "),
        bitvec_sort(guard_width)
    );
    (decl, FnHandle::new(symbol, args.len()))
}

/// `eval_guard(s_set, g) -> Bool`, architecture-specific.
///
/// Disjunctive: `(s_set & g) ≠ 0`. Conjunctive: `g ≠ 0 ∧ (s_set | g) = g`.
pub fn eval_guard_expr(kind: ArchitectureKind, s_set: &str, g: &str, width: usize) -> String {
    match kind {
        ArchitectureKind::Disjunctive => {
            format!(
                "(not (= (bvand {s_set} {g}) {}))",
                bv_zero(width)
            )
        }
        ArchitectureKind::Conjunctive => format!(
            "(and (not (= {g} {zero})) (= (bvor {s_set} {g}) {g}))",
            zero = bv_zero(width)
        ),
    }
}

/// Per-template bit offset into the global state-guarded bit-vector (sum of
/// preceding templates' bounds).
pub fn template_bit_offset(spec: &Specification, template: usize) -> usize {
    spec.templates[..template].iter().map(|t| t.bound).sum()
}

/// Total state-guarded bit-vector width: one bit per state across every
/// template.
pub fn total_width_state_guarded(spec: &Specification) -> usize {
    spec.templates.iter().map(|t| t.bound).sum::<usize>().max(1)
}

/// Determinism: for all `(t, input-assignment, s)`, at most one successor
/// `t'` satisfies `is_enabled`. Grounded over the finite state x input
/// cross-product; asserts a mutual-exclusion clause per pair of distinct
/// candidate successors.
pub fn determinism_constraints(
    template: &Template,
    guard_fn: &FnHandle,
    kind: ArchitectureKind,
    guard_width: usize,
) -> Vec<String> {
    let n = template.bound;
    let num_inputs = template.inputs.len();
    let mut asserts = Vec::new();
    for s_set_state in 0..n {
        let s_set = format!(
            "(state_guard_{} {})",
            template.index,
            state_ctor_name(template.index, s_set_state)
        );
        for input_bits in 0..(1usize << num_inputs) {
            let input_args = bool_args(input_bits, num_inputs);
            for from in 0..n {
                for t1 in 0..n {
                    for t2 in (t1 + 1)..n {
                        let g1 = format!(
                            "({} {} {} {})",
                            guard_fn.symbol,
                            state_ctor_name(template.index, from),
                            input_args,
                            state_ctor_name(template.index, t1)
                        );
                        let g2 = format!(
                            "({} {} {} {})",
                            guard_fn.symbol,
                            state_ctor_name(template.index, from),
                            input_args,
                            state_ctor_name(template.index, t2)
                        );
                        let e1 = eval_guard_expr(kind, &s_set, &g1, guard_width);
                        let e2 = eval_guard_expr(kind, &s_set, &g2, guard_width);
                        asserts.push(format!("(assert (not (and {e1} {e2})))"));
                    }
                }
            }
        }
    }
    asserts
}

/// Render a whitespace-separated sequence of `true`/`false` SMT-LIB
/// literals for the `num_inputs`-bit pattern `bits` (little-endian).
pub fn bool_args(bits: usize, num_inputs: usize) -> String {
    if num_inputs == 0 {
        return String::new();
    }
    (0..num_inputs)
        .map(|i| if (bits >> i) & 1 == 1 { "true" } else { "false" })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Non-input-blocking: if a guarded transition exists from `t` under some
/// input, an equally-guarded transition exists under every other input.
pub fn non_input_blocking_constraints(template: &Template, guard_fn: &FnHandle, guard_width: usize) -> Vec<String> {
    let n = template.bound;
    let num_inputs = template.inputs.len();
    if num_inputs == 0 {
        return Vec::new();
    }
    let zero = bv_zero(guard_width);
    let mut asserts = Vec::new();
    for from in 0..n {
        for input_bits in 0..(1usize << num_inputs) {
            let args = bool_args(input_bits, num_inputs);
            for to in 0..n {
                let g = format!(
                    "({} {} {} {})",
                    guard_fn.symbol,
                    state_ctor_name(template.index, from),
                    args,
                    state_ctor_name(template.index, to)
                );
                let antecedent = format!("(not (= {g} {zero}))");
                for other_bits in 0..(1usize << num_inputs) {
                    if other_bits == input_bits {
                        continue;
                    }
                    let other_args = bool_args(other_bits, num_inputs);
                    let disjunction: Vec<String> = (0..n)
                        .map(|to2| {
                            format!(
                                "(= ({} {} {} {}) {g})",
                                guard_fn.symbol,
                                state_ctor_name(template.index, from),
                                other_args,
                                state_ctor_name(template.index, to2)
                            )
                        })
                        .collect();
                    asserts.push(format!(
                        "(assert (=> {antecedent} (or {})))",
                        disjunction.join(" ")
                    ));
                }
            }
        }
    }
    asserts
}

/// Conjunctive-only: every nonempty guard set contains the bitwise union of
/// initial-state bits of all templates.
pub fn conjunctive_init_containment_constraints(
    spec: &Specification,
    template: &Template,
    guard_fn: &FnHandle,
    guard_width: usize,
) -> Vec<String> {
    let n = template.bound;
    let num_inputs = template.inputs.len();
    let zero = bv_zero(guard_width);
    let init_bv = init_state_union_bv(spec, guard_width);
    let mut asserts = Vec::new();
    for from in 0..n {
        for input_bits in 0..(1usize << num_inputs) {
            let args = bool_args(input_bits, num_inputs);
            for to in 0..n {
                let g = format!(
                    "({} {} {} {})",
                    guard_fn.symbol,
                    state_ctor_name(template.index, from),
                    args,
                    state_ctor_name(template.index, to)
                );
                asserts.push(format!(
                    "(assert (=> (not (= {g} {zero})) (= (bvand {g} {init_bv}) {init_bv})))"
                ));
            }
        }
    }
    asserts
}

/// Bitwise-OR of every template's initial-state (`state 0`) bit, in the
/// global guard bit-vector layout.
pub fn init_state_union_bv(spec: &Specification, width: usize) -> String {
    let mut value: u128 = 0;
    let mut offset = 0usize;
    for t in &spec.templates {
        value |= 1u128 << offset;
        offset += t.bound;
    }
    format!("(_ bv{value} {width})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Template;

    fn tmpl(index: usize, bound: usize, n_inputs: usize) -> Template {
        let inputs = (0..n_inputs).map(|i| format!("in{i}")).collect();
        let mut t = Template::new(index, inputs, vec!["out".into()]).unwrap();
        t.bound = bound;
        t
    }

    #[test]
    fn declare_state_sort_lists_all_constructors() {
        let t = tmpl(0, 3, 1);
        let decl = declare_state_sort(&t);
        assert!(decl.contains("t_0_0"));
        assert!(decl.contains("t_0_1"));
        assert!(decl.contains("t_0_2"));
    }

    #[test]
    fn eval_guard_disjunctive_is_nonzero_intersection() {
        let e = eval_guard_expr(ArchitectureKind::Disjunctive, "s", "g", 4);
        assert_eq!(e, "(not (= (bvand s g) (_ bv0 4)))");
    }

    #[test]
    fn eval_guard_conjunctive_is_subset_and_nonempty() {
        let e = eval_guard_expr(ArchitectureKind::Conjunctive, "s", "g", 4);
        assert!(e.contains("bvor s g"));
        assert!(e.contains("not (= g (_ bv0 4))"));
    }

    #[test]
    fn determinism_constraints_nonempty_for_multistate_template() {
        let t = tmpl(0, 2, 1);
        let (_, guard_fn) = declare_guard_fn(&t, 4);
        let asserts = determinism_constraints(&t, &guard_fn, ArchitectureKind::Disjunctive, 4);
        assert!(!asserts.is_empty());
    }

    #[test]
    fn bool_args_renders_little_endian() {
        assert_eq!(bool_args(0b10, 2), "false true");
        assert_eq!(bool_args(0, 0), "");
    }
}
