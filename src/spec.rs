//! Specification model: templates, assumptions, guarantees, and the current
//! bound/cut-off tuple the outer loop mutates round by round.

use crate::ast::{Expr, Signal};

/// Errors raised while constructing or validating a [`Specification`].
#[derive(Debug, thiserror::Error)]
pub enum SpecificationError {
    #[error("template {index} has zero inputs and zero outputs")]
    EmptyTemplate { index: usize },
    #[error("templates must form a contiguous 0..K-1 prefix, got index {0}")]
    NonContiguousTemplateIndex(usize),
    #[error("signal '{signal}' appears as both an input and an output of template {template}")]
    InputOutputOverlap { signal: String, template: usize },
    #[error("guarantee references template {0} which is not declared")]
    UnknownTemplate(usize),
    #[error("guarantee references {0} distinct templates; at most 2 are supported")]
    TooManyTemplates(usize),
    #[error("guarantee has {0} free indices; at most 2 are supported")]
    TooManyIndices(usize),
    #[error("specification assumptions beyond architecture-induced fairness are not supported")]
    UnsupportedAssumption,
    #[error("bound tuple length {bound_len} does not match template count {template_count}")]
    BoundLengthMismatch {
        bound_len: usize,
        template_count: usize,
    },
}

/// The repeated process skeleton being synthesized.
#[derive(Clone, Debug)]
pub struct Template {
    /// Position of this template in the contiguous `0..K-1` prefix.
    pub index: usize,
    /// Ordered input signal names (without the trailing `_k` suffix).
    pub inputs: Vec<String>,
    /// Ordered output signal names (without the trailing `_k` suffix).
    pub outputs: Vec<String>,
    /// Number of states chosen for this template in the current round.
    ///
    /// Zero before the first round is assigned; the outer loop is the sole
    /// writer once synthesis begins.
    pub bound: usize,
}

impl Template {
    pub fn new(index: usize, inputs: Vec<String>, outputs: Vec<String>) -> Result<Self, SpecificationError> {
        if inputs.is_empty() && outputs.is_empty() {
            return Err(SpecificationError::EmptyTemplate { index });
        }
        for sig in &inputs {
            if outputs.contains(sig) {
                return Err(SpecificationError::InputOutputOverlap {
                    signal: sig.clone(),
                    template: index,
                });
            }
        }
        Ok(Template {
            index,
            inputs,
            outputs,
            bound: 0,
        })
    }

    /// The template's initial state, always `{0}` per the data model.
    pub fn initial_state(&self) -> usize {
        0
    }
}

/// A quantified property: either an assumption or a guarantee.
#[derive(Clone, Debug)]
pub struct Property {
    /// Index-variable names bound by the outermost `Forall`.
    pub indices: Vec<String>,
    /// The (unquantified) body of the property.
    pub body: Expr,
    /// Which template each bound index ranges over, in the same order as
    /// `indices`.
    pub index_templates: Vec<usize>,
}

impl Property {
    /// Distinct templates referenced by this property's bound indices.
    pub fn templates(&self) -> Vec<usize> {
        let mut ts: Vec<usize> = self.index_templates.clone();
        ts.sort_unstable();
        ts.dedup();
        ts
    }

    fn validate(&self, template_count: usize) -> Result<(), SpecificationError> {
        if self.indices.len() > 2 {
            return Err(SpecificationError::TooManyIndices(self.indices.len()));
        }
        let templates = self.templates();
        if templates.len() > 2 {
            return Err(SpecificationError::TooManyTemplates(templates.len()));
        }
        for t in &templates {
            if *t >= template_count {
                return Err(SpecificationError::UnknownTemplate(*t));
            }
        }
        Ok(())
    }
}

/// Holds templates, assumptions, guarantees, and the bound/cut-off tuple the
/// outer loop mutates. Constructed once from an AST (directly, or via
/// [`crate::parser`]); only the outer loop's bound/cut-off setters mutate it
/// thereafter.
#[derive(Clone, Debug)]
pub struct Specification {
    pub templates: Vec<Template>,
    /// Specification-level assumptions beyond architecture-induced fairness.
    /// Per §9's open-question decision, non-empty here is a hard construction
    /// error, not a deferred outer-loop check.
    pub assumptions: Vec<Property>,
    pub guarantees: Vec<Property>,
    bound: Vec<usize>,
    cutoff: Vec<usize>,
}

impl Specification {
    pub fn new(
        templates: Vec<Template>,
        assumptions: Vec<Property>,
        guarantees: Vec<Property>,
    ) -> Result<Self, SpecificationError> {
        for (i, t) in templates.iter().enumerate() {
            if t.index != i {
                return Err(SpecificationError::NonContiguousTemplateIndex(t.index));
            }
        }
        if !assumptions.is_empty() {
            return Err(SpecificationError::UnsupportedAssumption);
        }
        for g in &guarantees {
            g.validate(templates.len())?;
        }
        let k = templates.len();
        Ok(Specification {
            templates,
            assumptions,
            guarantees,
            bound: vec![0; k],
            cutoff: vec![0; k],
        })
    }

    pub fn templates_count(&self) -> usize {
        self.templates.len()
    }

    pub fn bound(&self) -> &[usize] {
        &self.bound
    }

    pub fn cutoff(&self) -> &[usize] {
        &self.cutoff
    }

    /// Set the bound tuple for the next round. Sole writer: the outer loop.
    pub fn set_bound(&mut self, bound: Vec<usize>) -> Result<(), SpecificationError> {
        if bound.len() != self.templates.len() {
            return Err(SpecificationError::BoundLengthMismatch {
                bound_len: bound.len(),
                template_count: self.templates.len(),
            });
        }
        for (t, b) in self.templates.iter_mut().zip(bound.iter()) {
            t.bound = *b;
        }
        self.bound = bound;
        Ok(())
    }

    /// Set the cut-off tuple for the next round. Sole writer: the outer loop.
    pub fn set_cutoff(&mut self, cutoff: Vec<usize>) -> Result<(), SpecificationError> {
        if cutoff.len() != self.templates.len() {
            return Err(SpecificationError::BoundLengthMismatch {
                bound_len: cutoff.len(),
                template_count: self.templates.len(),
            });
        }
        self.cutoff = cutoff;
        Ok(())
    }

    /// `⌈log₂(sum of cutoff)⌉`, or 1 if the sum is 1 — the scheduling
    /// bit-width, per §4.2 and the open-question decision in SPEC_FULL.md.
    pub fn scheduling_width(&self) -> u32 {
        let sum: usize = self.cutoff.iter().sum();
        scheduling_width_for_sum(sum)
    }

    /// The little-endian boolean scheduling signals for a flattened
    /// `(template, instance)` position, given the current scheduling width.
    pub fn scheduling_signals(&self, position: usize) -> Vec<Signal> {
        let width = self.scheduling_width();
        (0..width)
            .map(|bit| {
                let set = (position >> bit) & 1 == 1;
                Signal::Plain(format!("sched_{bit}={set}"))
            })
            .collect()
    }

    /// Flattened position of `(template, instance)` in the `(k, i)`
    /// enumeration order: templates outer, instances inner, both ascending.
    pub fn flatten_position(&self, template: usize, instance: usize) -> usize {
        let mut pos = 0usize;
        for t in 0..template {
            pos += self.cutoff[t];
        }
        pos + instance
    }
}

/// Shared by [`Specification::scheduling_width`] and the instantiator.
pub fn scheduling_width_for_sum(sum: usize) -> u32 {
    if sum <= 1 {
        return 1;
    }
    let bits = usize::BITS - (sum - 1).leading_zeros();
    bits.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmpl(index: usize) -> Template {
        Template::new(index, vec!["r".into()], vec!["g".into()]).unwrap()
    }

    #[test]
    fn rejects_input_output_overlap() {
        let err = Template::new(0, vec!["x".into()], vec!["x".into()]).unwrap_err();
        assert!(matches!(err, SpecificationError::InputOutputOverlap { .. }));
    }

    #[test]
    fn rejects_assumptions() {
        let prop = Property {
            indices: vec!["i".into()],
            body: Expr::Bool(true),
            index_templates: vec![0],
        };
        let err = Specification::new(vec![tmpl(0)], vec![prop], vec![]).unwrap_err();
        assert!(matches!(err, SpecificationError::UnsupportedAssumption));
    }

    #[test]
    fn rejects_too_many_indices() {
        let prop = Property {
            indices: vec!["i".into(), "j".into(), "k".into()],
            body: Expr::Bool(true),
            index_templates: vec![0, 0, 0],
        };
        let err = Specification::new(vec![tmpl(0)], vec![], vec![prop]).unwrap_err();
        assert!(matches!(err, SpecificationError::TooManyIndices(3)));
    }

    #[test]
    fn scheduling_width_matches_spec() {
        assert_eq!(scheduling_width_for_sum(1), 1);
        assert_eq!(scheduling_width_for_sum(2), 1);
        assert_eq!(scheduling_width_for_sum(3), 2);
        assert_eq!(scheduling_width_for_sum(4), 2);
        assert_eq!(scheduling_width_for_sum(5), 3);
    }

    #[test]
    fn flatten_position_is_templates_outer_instances_inner() {
        let mut spec = Specification::new(vec![tmpl(0), Template::new(1, vec!["a".into()], vec!["b".into()]).unwrap()], vec![], vec![])
            .unwrap();
        spec.set_cutoff(vec![2, 3]).unwrap();
        assert_eq!(spec.flatten_position(0, 0), 0);
        assert_eq!(spec.flatten_position(0, 1), 1);
        assert_eq!(spec.flatten_position(1, 0), 2);
        assert_eq!(spec.flatten_position(1, 2), 4);
    }
}
