//! The synthesized template model: the immutable snapshot extracted from a
//! solver model once a round is SAT.

use std::collections::BTreeMap;

use crate::ast::Signal;

/// A guard attached to a transition: either a set of state names
/// (state-guarded encoding) or a set of label conjunctions (label-guarded
/// encoding).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardSet {
    States(Vec<String>),
    Labels(Vec<Vec<(Signal, bool)>>),
}

/// One transition of a synthesized template: from `from_state`, under
/// `inputs`, with `guard` satisfied, the template moves to `to_state`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelTransition {
    pub from_state: String,
    pub inputs: Vec<(Signal, bool)>,
    pub guard: GuardSet,
    pub to_state: String,
}

/// Immutable synthesized implementation of one template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateModel {
    pub template_index: usize,
    pub states: Vec<String>,
    /// For each output signal, which states assert it.
    pub outputs: BTreeMap<String, Vec<String>>,
    pub transitions: Vec<ModelTransition>,
}

impl TemplateModel {
    /// Whether `state` asserts `output`.
    pub fn output_at(&self, output: &str, state: &str) -> bool {
        self.outputs
            .get(output)
            .map(|states| states.iter().any(|s| s == state))
            .unwrap_or(false)
    }
}

impl std::fmt::Display for TemplateModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Template {}: {} states", self.template_index, self.states.len())?;
        for t in &self.transitions {
            writeln!(
                f,
                "  {} --[{:?}]--> {} (guard: {:?})",
                t.from_state, t.inputs, t.to_state, t.guard
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_at_checks_membership() {
        let mut outputs = BTreeMap::new();
        outputs.insert("g".to_string(), vec!["t_0_1".to_string()]);
        let m = TemplateModel {
            template_index: 0,
            states: vec!["t_0_0".into(), "t_0_1".into()],
            outputs,
            transitions: vec![],
        };
        assert!(m.output_at("g", "t_0_1"));
        assert!(!m.output_at("g", "t_0_0"));
    }
}
