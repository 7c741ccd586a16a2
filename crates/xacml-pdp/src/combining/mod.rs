//! Combining algorithms.
//!
//! An algorithm reduces the ordered children of a policy (rules) or policy
//! set (policies and policy sets) to one [`DecisionResult`]. Children are
//! evaluated lazily through [`Combinable`], so an algorithm that has
//! decided never evaluates the remaining children.
//!
//! Obligations and advice: a combined Permit or Deny carries the actions
//! of the children whose decision produced it, in child order. Actions of
//! children with the other decision, or of children never evaluated, are
//! dropped.

mod first_applicable;
mod only_one_applicable;
mod overrides;
mod unless;

pub use first_applicable::FirstApplicable;
pub use only_one_applicable::OnlyOneApplicable;
pub use overrides::Overrides;
pub use unless::Unless;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use xacml_model::{AttributeValue, IndeterminateError};

use crate::context::EvaluationContext;
use crate::decision::{DecisionResult, Effect, ExtendedIndeterminate, PolicyIdentifier};
use crate::error::BuildError;

const RULE_3: &str = "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:";
const POLICY_3: &str = "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:";
const RULE_1: &str = "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:";
const POLICY_1: &str = "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:";

/// Something a combining algorithm can evaluate: a rule, policy or policy set.
pub trait Combinable: Send + Sync {
    fn element_id(&self) -> &str;

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult;

    /// Whether the element's target matches, without evaluating it.
    fn is_applicable(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, IndeterminateError>;
}

/// What an algorithm combines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombiningLevel {
    Rule,
    Policy,
}

impl fmt::Display for CombiningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombiningLevel::Rule => f.write_str("rules"),
            CombiningLevel::Policy => f.write_str("policies"),
        }
    }
}

/// A legacy combiner parameter. Carried for completeness; no standard
/// algorithm reads them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinerParameter {
    pub name: String,
    pub value: AttributeValue,
}

impl CombinerParameter {
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

pub trait CombiningAlgorithm: Send + Sync {
    fn id(&self) -> &str;

    fn supports(&self, _level: CombiningLevel) -> bool {
        true
    }

    fn combine(
        &self,
        children: &[&dyn Combinable],
        parameters: &[CombinerParameter],
        ctx: &mut EvaluationContext<'_>,
    ) -> DecisionResult;
}

impl fmt::Debug for dyn CombiningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CombiningAlgorithm({})", self.id())
    }
}

/// Collects the applicable-policy lists of every evaluated child so the
/// combined result reports all of them, whichever child decided.
#[derive(Debug, Default)]
pub(crate) struct Audit {
    applicable: Vec<PolicyIdentifier>,
}

impl Audit {
    pub(crate) fn evaluate(&mut self, child: &dyn Combinable, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        let mut result = child.evaluate(ctx);
        self.applicable.extend(result.take_applicable_policies());
        result
    }

    pub(crate) fn finish(self, mut result: DecisionResult) -> DecisionResult {
        result.set_applicable_policies(self.applicable);
        result
    }
}

/// Extended Indeterminate of a child result, with an unqualified
/// Indeterminate counted as {DP}.
pub(crate) fn extended_of(result: &DecisionResult) -> ExtendedIndeterminate {
    match result.extended_indeterminate() {
        ExtendedIndeterminate::None => ExtendedIndeterminate::DP,
        other => other,
    }
}

/// Whether an extended Indeterminate may have hidden `effect`.
pub(crate) fn may_hide(extended: ExtendedIndeterminate, effect: Effect) -> bool {
    matches!(
        (extended, effect),
        (ExtendedIndeterminate::DP, _)
            | (ExtendedIndeterminate::P, Effect::Permit)
            | (ExtendedIndeterminate::D, Effect::Deny)
    )
}

/// Combining algorithms known to an engine, keyed by identifier.
#[derive(Clone, Default)]
pub struct CombiningAlgorithmRegistry {
    algorithms: HashMap<String, Arc<dyn CombiningAlgorithm>>,
}

impl CombiningAlgorithmRegistry {
    /// The XACML 3.0 algorithms plus the 1.0 first-applicable and
    /// only-one-applicable.
    pub fn standard() -> Self {
        let mut registry = Self::default();
        for prefix in [RULE_3, POLICY_3] {
            // Children are always combined in order, so the ordered
            // variants share the plain implementation.
            for (name, overriding) in [
                ("deny-overrides", Effect::Deny),
                ("permit-overrides", Effect::Permit),
                ("ordered-deny-overrides", Effect::Deny),
                ("ordered-permit-overrides", Effect::Permit),
            ] {
                registry.add(Overrides::new(format!("{}{}", prefix, name), overriding));
            }
            registry.add(Unless::new(format!("{}deny-unless-permit", prefix), Effect::Permit));
            registry.add(Unless::new(format!("{}permit-unless-deny", prefix), Effect::Deny));
        }
        registry.add(FirstApplicable::new(format!("{}first-applicable", RULE_1)));
        registry.add(FirstApplicable::new(format!("{}first-applicable", POLICY_1)));
        registry.add(OnlyOneApplicable::new(format!("{}only-one-applicable", POLICY_1)));
        registry
    }

    fn add(&mut self, algorithm: impl CombiningAlgorithm + 'static) {
        self.algorithms
            .insert(algorithm.id().to_string(), Arc::new(algorithm));
    }

    /// Register an extension algorithm. Identifiers are unique.
    pub fn register(&mut self, algorithm: Arc<dyn CombiningAlgorithm>) -> Result<(), BuildError> {
        if self.algorithms.contains_key(algorithm.id()) {
            return Err(BuildError::Registry(format!(
                "combining algorithm '{}' is already registered",
                algorithm.id()
            )));
        }
        self.algorithms.insert(algorithm.id().to_string(), algorithm);
        Ok(())
    }

    /// Look up an algorithm that can combine at `level`.
    pub fn get(&self, id: &str, level: CombiningLevel) -> Result<Arc<dyn CombiningAlgorithm>, BuildError> {
        let algorithm = self
            .algorithms
            .get(id)
            .cloned()
            .ok_or_else(|| BuildError::UnknownCombiningAlgorithm(id.to_string()))?;
        if !algorithm.supports(level) {
            return Err(BuildError::UnsupportedCombiningAlgorithm {
                algorithm: id.to_string(),
                level: level.to_string(),
            });
        }
        Ok(algorithm)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.algorithms.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }
}

impl fmt::Debug for CombiningAlgorithmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombiningAlgorithmRegistry")
            .field("algorithms", &self.algorithms.len())
            .finish()
    }
}
