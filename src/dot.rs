//! Dot-file visualization of a synthesized template model, per §6: one
//! subgraph per template, nodes labeled with their output assignment, edges
//! labeled with the input atoms and guard set that enable them.

use std::collections::BTreeMap;

use dot_writer::{Attributes, DotWriter, Rank};

use crate::model::{GuardSet, TemplateModel};

/// Render every template's model as one Graphviz digraph, one cluster per
/// template.
pub fn render(models: &BTreeMap<usize, TemplateModel>) -> String {
    let mut output = Vec::new();
    {
        let mut writer = DotWriter::from(&mut output);
        writer.set_pretty_print(false);
        let mut digraph = writer.digraph();
        for (template_index, model) in models {
            let mut cluster = digraph.cluster();
            cluster.set_rank(Rank::Same);
            cluster.set_label(&format!("T{template_index}"));
            for state in &model.states {
                cluster
                    .node_named(state.clone())
                    .set_label(&node_label(state, model));
            }
            for t in &model.transitions {
                cluster
                    .edge(t.from_state.clone(), t.to_state.clone())
                    .attributes()
                    .set_label(&transition_label(t));
            }
        }
    }
    String::from_utf8(output).expect("dot-writer emits valid UTF-8")
}

fn node_label(state: &str, model: &TemplateModel) -> String {
    let parts: Vec<String> = model
        .outputs
        .keys()
        .map(|output| {
            if model.output_at(output, state) {
                output.clone()
            } else {
                format!("/{output}")
            }
        })
        .collect();
    format!("{state}\\n{}", parts.join(","))
}

fn transition_label(t: &crate::model::ModelTransition) -> String {
    let signal_part: Vec<String> = t
        .inputs
        .iter()
        .map(|(sig, val)| if *val { sig.canonical() } else { format!("!{}", sig.canonical()) })
        .collect();
    let guard_part = match &t.guard {
        GuardSet::States(states) => states.join(","),
        GuardSet::Labels(labels) => labels
            .iter()
            .map(|label| {
                label
                    .iter()
                    .map(|(sig, val)| if *val { sig.canonical() } else { format!("!{}", sig.canonical()) })
                    .collect::<Vec<_>>()
                    .join("&")
            })
            .collect::<Vec<_>>()
            .join(","),
    };
    format!("{}\\n{}", signal_part.join(","), guard_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Signal;
    use crate::model::ModelTransition;

    fn sample_models() -> BTreeMap<usize, TemplateModel> {
        let mut outputs = BTreeMap::new();
        outputs.insert("g".to_string(), vec!["t_0_1".to_string()]);
        let mut models = BTreeMap::new();
        models.insert(
            0,
            TemplateModel {
                template_index: 0,
                states: vec!["t_0_0".into(), "t_0_1".into()],
                outputs,
                transitions: vec![ModelTransition {
                    from_state: "t_0_0".into(),
                    inputs: vec![(Signal::Plain("r_0".into()), true)],
                    guard: GuardSet::States(vec!["t_0_1".into()]),
                    to_state: "t_0_1".into(),
                }],
            },
        );
        models
    }

    #[test]
    fn renders_one_cluster_per_template() {
        let dot = render(&sample_models());
        assert!(dot.contains("subgraph cluster_0"));
        assert!(dot.contains("T0"));
    }

    #[test]
    fn escapes_newline_in_node_label() {
        let dot = render(&sample_models());
        assert!(dot.contains("t_0_1\\n"));
        assert!(dot.contains("/g") || dot.contains("\"g\""));
    }

    #[test]
    fn includes_edge_with_guard_label() {
        let dot = render(&sample_models());
        assert!(dot.contains("r_0"));
        assert!(dot.contains("t_0_1"));
    }
}
