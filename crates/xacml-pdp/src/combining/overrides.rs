// overrides.rs - deny-overrides and permit-overrides (and their ordered
// variants), with extended Indeterminate.

use crate::context::EvaluationContext;
use crate::decision::{Decision, DecisionResult, Effect, ExtendedIndeterminate, Status};
use crate::pep::PepActions;

use super::{extended_of, may_hide, Audit, Combinable, CombinerParameter, CombiningAlgorithm};

/// `overriding` wins as soon as any child decides it. Otherwise the other
/// effect wins unless an Indeterminate child may have hidden `overriding`.
#[derive(Debug, Clone)]
pub struct Overrides {
    id: String,
    overriding: Effect,
}

impl Overrides {
    pub fn new(id: impl Into<String>, overriding: Effect) -> Self {
        Self {
            id: id.into(),
            overriding,
        }
    }
}

impl CombiningAlgorithm for Overrides {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        children: &[&dyn Combinable],
        _parameters: &[CombinerParameter],
        ctx: &mut EvaluationContext<'_>,
    ) -> DecisionResult {
        let overriding = self.overriding.decision();
        let other = self.overriding.opposite();

        let mut audit = Audit::default();
        let mut hidden_overriding = false;
        let mut hidden_other = false;
        let mut hidden_both = false;
        let mut other_actions: Option<PepActions> = None;
        let mut first_error: Option<Status> = None;

        for child in children {
            let mut result = audit.evaluate(*child, ctx);
            match result.decision() {
                d if d == overriding => {
                    tracing::debug!("{}: '{}' decided {}", self.id, child.element_id(), d);
                    return audit.finish(result);
                }
                Decision::NotApplicable => {}
                Decision::Indeterminate => {
                    first_error.get_or_insert_with(|| result.status().clone());
                    match extended_of(&result) {
                        ExtendedIndeterminate::DP => hidden_both = true,
                        e if may_hide(e, self.overriding) => hidden_overriding = true,
                        _ => hidden_other = true,
                    }
                }
                _ => other_actions
                    .get_or_insert_with(PepActions::default)
                    .append(result.take_pep_actions()),
            }
        }

        let mut indeterminate = |extended| {
            DecisionResult::indeterminate_with_status(extended, first_error.take().unwrap_or_else(Status::ok))
        };
        let result = if hidden_both || (hidden_overriding && (hidden_other || other_actions.is_some())) {
            indeterminate(ExtendedIndeterminate::DP)
        } else if hidden_overriding {
            indeterminate(ExtendedIndeterminate::for_effect(self.overriding))
        } else if let Some(actions) = other_actions {
            DecisionResult::for_effect(other, actions)
        } else if hidden_other {
            indeterminate(ExtendedIndeterminate::for_effect(other))
        } else {
            DecisionResult::not_applicable()
        };
        tracing::debug!("{}: combined {} children to {}", self.id, children.len(), result);
        audit.finish(result)
    }
}
