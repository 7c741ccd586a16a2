// unless.rs - deny-unless-permit and permit-unless-deny.
//
// These never return NotApplicable or Indeterminate: the preferred effect
// wins as soon as a child decides it, otherwise the fallback effect.

use crate::context::EvaluationContext;
use crate::decision::{DecisionResult, Effect};
use crate::pep::PepActions;

use super::{Audit, Combinable, CombinerParameter, CombiningAlgorithm};

#[derive(Debug, Clone)]
pub struct Unless {
    id: String,
    preferred: Effect,
}

impl Unless {
    /// `preferred` is Permit for deny-unless-permit, Deny for
    /// permit-unless-deny.
    pub fn new(id: impl Into<String>, preferred: Effect) -> Self {
        Self {
            id: id.into(),
            preferred,
        }
    }
}

impl CombiningAlgorithm for Unless {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        children: &[&dyn Combinable],
        _parameters: &[CombinerParameter],
        ctx: &mut EvaluationContext<'_>,
    ) -> DecisionResult {
        let fallback = self.preferred.opposite();
        let mut audit = Audit::default();
        let mut fallback_actions = PepActions::default();
        for child in children {
            let mut result = audit.evaluate(*child, ctx);
            match result.decision().effect() {
                Some(effect) if effect == self.preferred => {
                    tracing::debug!("{}: '{}' decided {}", self.id, child.element_id(), effect);
                    return audit.finish(result);
                }
                Some(_) => fallback_actions.append(result.take_pep_actions()),
                None => {}
            }
        }
        audit.finish(DecisionResult::for_effect(fallback, fallback_actions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combining::testing::{combine, indeterminate, obligation_ids, tagged, Scripted};
    use crate::decision::{Decision, ExtendedIndeterminate};

    fn deny_unless_permit() -> Unless {
        Unless::new("deny-unless-permit", Effect::Permit)
    }

    #[test]
    fn falls_back_to_deny_with_every_deny_action() {
        let children = vec![
            Scripted::new("d1", tagged(Effect::Deny, "d1")),
            Scripted::new("i", indeterminate(ExtendedIndeterminate::DP)),
            Scripted::new("na", DecisionResult::not_applicable()),
            Scripted::new("d2", tagged(Effect::Deny, "d2")),
        ];
        let result = combine(&deny_unless_permit(), &children);
        assert_eq!(result.decision(), Decision::Deny);
        assert!(result.status().is_ok());
        assert_eq!(obligation_ids(&result), vec!["d1", "d2"]);
    }

    #[test]
    fn permit_wins_immediately() {
        let children = vec![
            Scripted::new("d", tagged(Effect::Deny, "d")),
            Scripted::new("p", tagged(Effect::Permit, "p")),
            Scripted::new("spy", tagged(Effect::Permit, "spy")),
        ];
        let result = combine(&deny_unless_permit(), &children);
        assert_eq!(result.decision(), Decision::Permit);
        assert_eq!(obligation_ids(&result), vec!["p"]);
        assert_eq!(children[2].evaluations(), 0);
    }

    #[test]
    fn permit_unless_deny_with_no_children_permits() {
        let result = combine(&Unless::new("permit-unless-deny", Effect::Deny), &[]);
        assert_eq!(result.decision(), Decision::Permit);
    }
}
