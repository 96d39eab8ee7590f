//! Quantifier instantiation: expansion of `ForallExpr` into conjunctions over
//! concrete process indices, with the symmetry filter that drops redundant
//! conjuncts.

use std::collections::BTreeMap;

use crate::ast::{Expr, Signal};
use crate::spec::{scheduling_width_for_sum, Property};

/// Per-template index ranges: `value_dict_per_template[k] = 0..cutoff[k]`.
pub type ValueDict = BTreeMap<usize, Vec<usize>>;

fn value_dict_from_cutoff(cutoff: &[usize]) -> ValueDict {
    cutoff
        .iter()
        .enumerate()
        .map(|(k, &n)| (k, (0..n).collect()))
        .collect()
}

/// Instantiate `property` against a per-template cut-off tuple: expand its
/// bound indices into a conjunction over concrete index-value tuples, honoring
/// the symmetry filter, and substitute every quantified signal.
///
/// `cutoff_sum` is the overall sum of cut-offs across all templates, used for
/// the scheduling-signal bit width (§4.2); it is ordinarily
/// `spec.cutoff().iter().sum()` but is threaded explicitly so this function
/// stays pure.
pub fn instantiate(property: &Property, cutoff: &[usize], cutoff_sum: usize) -> Expr {
    let value_dict = value_dict_from_cutoff(cutoff);
    let ranges: Vec<&[usize]> = property
        .index_templates
        .iter()
        .map(|t| value_dict.get(t).map(|v| v.as_slice()).unwrap_or(&[]))
        .collect();

    let single_template = property.templates().len() == 1;
    let width = scheduling_width_for_sum(cutoff_sum);

    let mut conjuncts = Vec::new();
    for tuple in cartesian_product(&ranges) {
        if symmetry_filtered(&tuple, single_template) {
            continue;
        }
        let mut subst: BTreeMap<&str, usize> = BTreeMap::new();
        for (name, val) in property.indices.iter().zip(tuple.iter()) {
            subst.insert(name.as_str(), *val);
        }
        let flattened = flatten_positions(&property.index_templates, &tuple, cutoff);
        conjuncts.push(rewrite(&property.body, &subst, width, &flattened));
    }
    Expr::and_all(conjuncts)
}

/// Position of `(template, instance)` in the `(k, i)` flattened enumeration
/// order, given per-template cut-offs.
fn flatten_position(template: usize, instance: usize, cutoff: &[usize]) -> usize {
    let mut pos = 0;
    for t in 0..template {
        pos += cutoff.get(t).copied().unwrap_or(0);
    }
    pos + instance
}

fn flatten_positions(
    index_templates: &[usize],
    tuple: &[usize],
    cutoff: &[usize],
) -> BTreeMap<usize, usize> {
    index_templates
        .iter()
        .zip(tuple.iter())
        .map(|(&t, &v)| (t, flatten_position(t, v, cutoff)))
        .collect()
}

/// The symmetry filter of §4.2: drop a candidate tuple if (a) it is
/// single-template, multi-index, and every value is equal, or (b) the values
/// are not non-decreasing.
fn symmetry_filtered(tuple: &[usize], single_template: bool) -> bool {
    if single_template && tuple.len() > 1 && tuple.iter().all(|&v| v == tuple[0]) {
        return true;
    }
    !tuple.windows(2).all(|w| w[0] <= w[1])
}

fn cartesian_product(ranges: &[&[usize]]) -> Vec<Vec<usize>> {
    let mut result: Vec<Vec<usize>> = vec![vec![]];
    for range in ranges {
        let mut next = Vec::with_capacity(result.len() * range.len().max(1));
        for prefix in &result {
            for &v in *range {
                let mut p = prefix.clone();
                p.push(v);
                next.push(p);
            }
        }
        result = next;
    }
    if ranges.is_empty() {
        vec![vec![]]
    } else {
        result
    }
}

/// Recursive rewrite: substitutes every quantified signal in `expr` with its
/// concrete-index counterpart under `subst`. Pure; produces a new tree.
fn rewrite(
    expr: &Expr,
    subst: &BTreeMap<&str, usize>,
    sched_width: u32,
    flattened: &BTreeMap<usize, usize>,
) -> Expr {
    match expr {
        Expr::Number(n) => Expr::Number(*n),
        Expr::Bool(b) => Expr::Bool(*b),
        Expr::Signal(s) => Expr::Signal(rewrite_signal(s, subst, sched_width, flattened)),
        Expr::Unary(op, e) => Expr::unary(*op, rewrite(e, subst, sched_width, flattened)),
        Expr::Bin(op, l, r) => Expr::bin(
            *op,
            rewrite(l, subst, sched_width, flattened),
            rewrite(r, subst, sched_width, flattened),
        ),
        Expr::Forall { inner, .. } => rewrite(inner, subst, sched_width, flattened),
    }
}

fn rewrite_signal(
    signal: &Signal,
    subst: &BTreeMap<&str, usize>,
    sched_width: u32,
    flattened: &BTreeMap<usize, usize>,
) -> Signal {
    match signal {
        Signal::QuantifiedTemplate {
            name,
            template,
            indices,
        } => {
            if indices.len() == 1 {
                let val = subst.get(indices[0].as_str()).copied().unwrap_or(0);
                Signal::Instance {
                    name: name.clone(),
                    template: *template,
                    instance: val,
                }
            } else {
                let mangled = indices
                    .iter()
                    .map(|i| subst.get(i.as_str()).copied().unwrap_or(0).to_string())
                    .collect::<Vec<_>>()
                    .join("_");
                Signal::Plain(format!("{name}_{template}_{mangled}"))
            }
        }
        Signal::QuantifiedScheduler { template, index } => {
            let val = subst.get(index.as_str()).copied().unwrap_or(0);
            let position = flattened.get(template).copied().unwrap_or(val);
            let bits: Vec<String> = (0..sched_width)
                .map(|bit| {
                    let set = (position >> bit) & 1 == 1;
                    format!("sched_{bit}={set}")
                })
                .collect();
            Signal::Plain(bits.join("&"))
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Signal;

    fn prop_two_index(template: usize) -> Property {
        Property {
            indices: vec!["i".into(), "j".into()],
            body: Expr::Signal(Signal::QuantifiedTemplate {
                name: "psi".into(),
                template,
                indices: vec!["i".into(), "j".into()],
            }),
            index_templates: vec![template, template],
        }
    }

    #[test]
    fn symmetry_filter_matches_s5() {
        // cutoff 3 for template 0; expect conjuncts for (0,1),(0,2),(1,2) only.
        let value_dict = value_dict_from_cutoff(&[3]);
        let ranges: Vec<&[usize]> = vec![value_dict[&0].as_slice(), value_dict[&0].as_slice()];
        let mut kept = Vec::new();
        for tuple in cartesian_product(&ranges) {
            if !symmetry_filtered(&tuple, true) {
                kept.push((tuple[0], tuple[1]));
            }
        }
        assert_eq!(kept, vec![(0, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn instantiate_drops_equal_tuples_single_template() {
        let prop = prop_two_index(0);
        let e = instantiate(&prop, &[2], 2);
        // Only (0,1) survives out of {0,1}^2 under the symmetry filter.
        match e {
            Expr::Signal(_) => {}
            other => panic!("expected a single surviving conjunct, got {other:?}"),
        }
    }

    #[test]
    fn instantiate_is_idempotent_on_closed_formula() {
        let closed = Property {
            indices: vec![],
            body: Expr::Bool(true),
            index_templates: vec![],
        };
        let once = instantiate(&closed, &[2], 2);
        assert_eq!(once, Expr::Bool(true));
    }

    #[test]
    fn scheduling_signal_encoding_matches_s6() {
        // cutoff sum 3 => width 2; (k=1, i=1) is flattened position 2 under
        // cutoff [1,2] => sched_1=true, sched_0=false.
        assert_eq!(flatten_position(1, 1, &[1, 2]), 2);

        let mut subst = BTreeMap::new();
        subst.insert("i", 1usize);
        let mut flattened = BTreeMap::new();
        flattened.insert(1usize, flatten_position(1, 1, &[1, 2]));
        let signal = Signal::QuantifiedScheduler {
            template: 1,
            index: "i".into(),
        };
        let rewritten = rewrite_signal(&signal, &subst, scheduling_width_for_sum(3), &flattened);
        let Signal::Plain(label) = rewritten else {
            panic!("expected a plain scheduling label")
        };
        assert_eq!(label, "sched_0=false&sched_1=true");
    }
}
