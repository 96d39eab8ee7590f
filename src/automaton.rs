//! Universal co-Büchi word automaton (UCW) value type, plus the safety/
//! liveness oracle and the shared Tarjan SCC routine it (and the SCC-ranking
//! encoder optimization) are built on.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::Signal;

/// Opaque node identifier within one [`Automaton`].
pub type NodeId = usize;

/// A partial map from [`Signal`] to the boolean value it must take for a
/// transition to apply. Absent signals are "don't care".
pub type Label = BTreeMap<Signal, bool>;

/// One outgoing transition: under `label`, the automaton moves to each
/// `(target, is_rejecting_target)` pair in `targets` (a set, since UCWs are
/// universal: all targets in a disjunct set must be satisfied on every
/// branch taken).
#[derive(Clone, Debug)]
pub struct Transition {
    pub label: Label,
    pub targets: Vec<(NodeId, bool)>,
}

/// A universal co-Büchi word automaton: rejects runs that visit a rejecting
/// node infinitely often on every branch.
#[derive(Clone, Debug)]
pub struct Automaton {
    pub nodes: Vec<NodeId>,
    /// Alternation: a list of initial node sets.
    pub initial_sets: Vec<BTreeSet<NodeId>>,
    pub rejecting_nodes: BTreeSet<NodeId>,
    pub transitions: BTreeMap<NodeId, Vec<Transition>>,
    /// Human-readable name, typically the formula it was built from.
    pub name: String,
}

impl Automaton {
    pub fn transitions_from(&self, node: NodeId) -> &[Transition] {
        self.transitions
            .get(&node)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `label` is the empty (all-don't-care, i.e. "true") label.
    fn is_true_label(label: &Label) -> bool {
        label.is_empty()
    }

    /// §4.3 safety oracle: every rejecting node inside a rejecting SCC (of
    /// size > 1, or self-looped) must be absorbing under the true label.
    pub fn is_safety(&self) -> bool {
        let sccs = tarjan_scc(&self.nodes, |n| {
            self.transitions_from(n)
                .iter()
                .flat_map(|t| t.targets.iter().map(|(tgt, _)| *tgt))
                .filter(|tgt| self.rejecting_nodes.contains(tgt))
        });

        let rejecting_in_scc: BTreeSet<NodeId> = sccs
            .into_iter()
            .filter(|scc| {
                scc.iter().all(|n| self.rejecting_nodes.contains(n))
                    && (scc.len() > 1 || self.has_self_loop(scc[0]))
            })
            .flatten()
            .collect();

        rejecting_in_scc.iter().all(|&n| self.is_absorbing(n))
    }

    fn has_self_loop(&self, node: NodeId) -> bool {
        self.transitions_from(node)
            .iter()
            .any(|t| t.targets.iter().any(|(tgt, _)| *tgt == node))
    }

    /// Every outgoing transition under the empty label leads back to `node`
    /// itself.
    fn is_absorbing(&self, node: NodeId) -> bool {
        let true_label_transitions: Vec<&Transition> = self
            .transitions_from(node)
            .iter()
            .filter(|t| Self::is_true_label(&t.label))
            .collect();
        if true_label_transitions.is_empty() {
            return false;
        }
        true_label_transitions
            .iter()
            .all(|t| t.targets.iter().all(|(tgt, _)| *tgt == node))
    }
}

/// Tarjan's strongly connected components algorithm, parameterized by a
/// successor predicate so both the safety oracle (successors restricted to
/// rejecting nodes) and the optional SCC-ranking optimization can share one
/// implementation.
pub fn tarjan_scc<F, I>(nodes: &[NodeId], mut successors: F) -> Vec<Vec<NodeId>>
where
    F: FnMut(NodeId) -> I,
    I: Iterator<Item = NodeId>,
{
    struct State {
        index: BTreeMap<NodeId, usize>,
        lowlink: BTreeMap<NodeId, usize>,
        on_stack: BTreeSet<NodeId>,
        stack: Vec<NodeId>,
        counter: usize,
        sccs: Vec<Vec<NodeId>>,
    }

    fn strongconnect<F, I>(v: NodeId, st: &mut State, successors: &mut F)
    where
        F: FnMut(NodeId) -> I,
        I: Iterator<Item = NodeId>,
    {
        st.index.insert(v, st.counter);
        st.lowlink.insert(v, st.counter);
        st.counter += 1;
        st.stack.push(v);
        st.on_stack.insert(v);

        let succs: Vec<NodeId> = successors(v).collect();
        for w in succs {
            if !st.index.contains_key(&w) {
                strongconnect(w, st, successors);
                let wl = st.lowlink[&w];
                let vl = st.lowlink[&v];
                st.lowlink.insert(v, vl.min(wl));
            } else if st.on_stack.contains(&w) {
                let wi = st.index[&w];
                let vl = st.lowlink[&v];
                st.lowlink.insert(v, vl.min(wi));
            }
        }

        if st.lowlink[&v] == st.index[&v] {
            let mut component = Vec::new();
            loop {
                let w = st.stack.pop().unwrap();
                st.on_stack.remove(&w);
                component.push(w);
                if w == v {
                    break;
                }
            }
            st.sccs.push(component);
        }
    }

    let mut state = State {
        index: BTreeMap::new(),
        lowlink: BTreeMap::new(),
        on_stack: BTreeSet::new(),
        stack: Vec::new(),
        counter: 0,
        sccs: Vec::new(),
    };

    for &n in nodes {
        if !state.index.contains_key(&n) {
            strongconnect(n, &mut state, &mut successors);
        }
    }
    state.sccs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn automaton(
        rejecting: &[NodeId],
        edges: &[(NodeId, Label, Vec<(NodeId, bool)>)],
        n_nodes: usize,
    ) -> Automaton {
        let mut transitions: BTreeMap<NodeId, Vec<Transition>> = BTreeMap::new();
        for (src, label, targets) in edges {
            transitions
                .entry(*src)
                .or_default()
                .push(Transition {
                    label: label.clone(),
                    targets: targets.clone(),
                });
        }
        Automaton {
            nodes: (0..n_nodes).collect(),
            initial_sets: vec![[0].into_iter().collect()],
            rejecting_nodes: rejecting.iter().copied().collect(),
            transitions,
            name: "test".into(),
        }
    }

    #[test]
    fn safety_when_rejecting_self_loop_is_absorbing() {
        // single rejecting node, self-looped under true label only.
        let a = automaton(&[0], &[(0, Label::new(), vec![(0, true)])], 1);
        assert!(a.is_safety());
    }

    #[test]
    fn liveness_when_rejecting_node_escapes() {
        // rejecting node 0 has a true-label transition elsewhere (node 1,
        // non-rejecting) as well as a self loop: not absorbing.
        let a = automaton(
            &[0],
            &[(0, Label::new(), vec![(0, true), (1, false)])],
            2,
        );
        assert!(!a.is_safety());
    }

    #[test]
    fn safety_matches_s4_liveness_example() {
        // G F g_0_i as a UCW: rejecting node 0 self-loops under the true
        // label (putting it in a rejecting SCC) but also has a true-label
        // edge out to a non-rejecting node, so it is not absorbing -> liveness.
        let a = automaton(
            &[0],
            &[
                (0, Label::new(), vec![(0, true)]),
                (0, Label::new(), vec![(1, false)]),
            ],
            2,
        );
        assert!(!a.is_safety());
    }

    #[test]
    fn tarjan_finds_single_node_scc() {
        let sccs = tarjan_scc(&[0, 1], |n| if n == 0 { vec![1].into_iter() } else { vec![].into_iter() });
        assert_eq!(sccs.len(), 2);
    }

    #[test]
    fn tarjan_finds_cycle_as_one_scc() {
        let succ = |n: NodeId| -> std::vec::IntoIter<NodeId> {
            match n {
                0 => vec![1].into_iter(),
                1 => vec![0].into_iter(),
                _ => vec![].into_iter(),
            }
        };
        let sccs = tarjan_scc(&[0, 1], succ);
        assert_eq!(sccs.len(), 1);
        assert_eq!(sccs[0].len(), 2);
    }
}
