// only_one_applicable.rs - Exactly one applicable child decides.
//
// Applicability is checked on every child's target before anything is
// evaluated. Two applicable children are an authoring error reported as
// Indeterminate{DP} with the `multiple_applicable` error kind.

use xacml_model::{ErrorKind, IndeterminateError};

use crate::context::EvaluationContext;
use crate::decision::{DecisionResult, ExtendedIndeterminate};

use super::{Audit, Combinable, CombinerParameter, CombiningAlgorithm, CombiningLevel};

#[derive(Debug, Clone)]
pub struct OnlyOneApplicable {
    id: String,
}

impl OnlyOneApplicable {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl CombiningAlgorithm for OnlyOneApplicable {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports(&self, level: CombiningLevel) -> bool {
        level == CombiningLevel::Policy
    }

    fn combine(
        &self,
        children: &[&dyn Combinable],
        _parameters: &[CombinerParameter],
        ctx: &mut EvaluationContext<'_>,
    ) -> DecisionResult {
        let mut selected: Option<&dyn Combinable> = None;
        for child in children {
            match child.is_applicable(ctx) {
                Ok(false) => {}
                Ok(true) => {
                    if let Some(first) = selected {
                        let err = IndeterminateError::new(
                            ErrorKind::MultipleApplicable,
                            format!(
                                "'{}' and '{}' are both applicable",
                                first.element_id(),
                                child.element_id()
                            ),
                        );
                        tracing::debug!("{}: {}", self.id, err);
                        return DecisionResult::indeterminate(ExtendedIndeterminate::DP, &err);
                    }
                    selected = Some(*child);
                }
                Err(e) => {
                    let e = e.context(format_args!("target of '{}'", child.element_id()));
                    return DecisionResult::indeterminate(ExtendedIndeterminate::DP, &e);
                }
            }
        }

        match selected {
            Some(child) => {
                let mut audit = Audit::default();
                let result = audit.evaluate(child, ctx);
                audit.finish(result)
            }
            None => DecisionResult::not_applicable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combining::testing::{combine, obligation_ids, tagged, Scripted};
    use crate::decision::{Decision, Effect};

    fn algorithm() -> OnlyOneApplicable {
        OnlyOneApplicable::new("only-one-applicable")
    }

    #[test]
    fn single_applicable_child_decides() {
        let children = vec![
            Scripted::new("na", DecisionResult::not_applicable()),
            Scripted::new("p", tagged(Effect::Permit, "p")),
        ];
        let result = combine(&algorithm(), &children);
        assert_eq!(result.decision(), Decision::Permit);
        assert_eq!(obligation_ids(&result), vec!["p"]);
        assert_eq!(children[0].evaluations(), 0);
    }

    #[test]
    fn two_applicable_children_are_a_distinct_error() {
        let children = vec![
            Scripted::new("a", tagged(Effect::Permit, "a")),
            Scripted::new("b", tagged(Effect::Deny, "b")),
        ];
        let result = combine(&algorithm(), &children);
        assert_eq!(result.decision(), Decision::Indeterminate);
        assert_eq!(result.extended_indeterminate(), ExtendedIndeterminate::DP);
        assert_eq!(result.status().error_kind, Some(ErrorKind::MultipleApplicable));
        let message = result.status().message.clone().unwrap_or_default();
        assert!(message.contains("'a'") && message.contains("'b'"), "{}", message);
        assert_eq!(children[0].evaluations() + children[1].evaluations(), 0);
    }

    #[test]
    fn target_error_is_indeterminate() {
        let mut broken = Scripted::new("x", tagged(Effect::Permit, "x"));
        broken.applicable = Err(IndeterminateError::processing("bad target"));
        let result = combine(&algorithm(), &[broken]);
        assert_eq!(result.decision(), Decision::Indeterminate);
        assert_eq!(result.status().error_kind, Some(ErrorKind::Processing));
    }

    #[test]
    fn nothing_applicable_is_not_applicable() {
        let children = vec![Scripted::new("na", DecisionResult::not_applicable())];
        assert!(combine(&algorithm(), &children).is_not_applicable());
    }
}
