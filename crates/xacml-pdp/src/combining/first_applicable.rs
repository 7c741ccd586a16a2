// first_applicable.rs - The first child that is not NotApplicable decides.

use crate::context::EvaluationContext;
use crate::decision::DecisionResult;

use super::{Audit, Combinable, CombinerParameter, CombiningAlgorithm};

/// Returns the first applicable child's result unchanged, Indeterminate
/// included. Later children are never evaluated.
#[derive(Debug, Clone)]
pub struct FirstApplicable {
    id: String,
}

impl FirstApplicable {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl CombiningAlgorithm for FirstApplicable {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        children: &[&dyn Combinable],
        _parameters: &[CombinerParameter],
        ctx: &mut EvaluationContext<'_>,
    ) -> DecisionResult {
        let mut audit = Audit::default();
        for child in children {
            let result = audit.evaluate(*child, ctx);
            if !result.is_not_applicable() {
                tracing::debug!("{}: '{}' decided {}", self.id, child.element_id(), result);
                return audit.finish(result);
            }
        }
        audit.finish(DecisionResult::not_applicable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combining::testing::{combine, indeterminate, obligation_ids, tagged, Scripted};
    use crate::decision::{Decision, Effect, ExtendedIndeterminate};

    #[test]
    fn later_children_are_never_evaluated() {
        let children = vec![
            Scripted::new("na", DecisionResult::not_applicable()),
            Scripted::new("d", tagged(Effect::Deny, "d")),
            Scripted::new("spy", tagged(Effect::Permit, "spy")),
        ];
        let result = combine(&FirstApplicable::new("first-applicable"), &children);
        assert_eq!(result.decision(), Decision::Deny);
        assert_eq!(obligation_ids(&result), vec!["d"]);
        assert_eq!(children[0].evaluations(), 1);
        assert_eq!(children[2].evaluations(), 0);
    }

    #[test]
    fn indeterminate_is_returned_as_is() {
        let children = vec![
            Scripted::new("i", indeterminate(ExtendedIndeterminate::P)),
            Scripted::new("spy", tagged(Effect::Permit, "spy")),
        ];
        let result = combine(&FirstApplicable::new("first-applicable"), &children);
        assert_eq!(result.extended_indeterminate(), ExtendedIndeterminate::P);
        assert_eq!(children[1].evaluations(), 0);
    }
}
