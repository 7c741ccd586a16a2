// policy.rs - Policies, policy sets and their evaluation.
//
// A Policy combines rules and a PolicySet combines policies and policy
// sets; both are immutable once built and shared across evaluations.
//
// Evaluation of either:
// 1. Target NoMatch: NotApplicable, children untouched.
// 2. Children combined by the algorithm.
// 3. Target Indeterminate: the combined result is downgraded (NotApplicable
//    stays, Permit becomes Indeterminate{P}, Deny becomes Indeterminate{D},
//    Indeterminate keeps its extended value).
// 4. Target Match and a Permit/Deny result: the element's own obligations
//    and advice for that effect are appended after the children's. If one
//    fails the result becomes Indeterminate{P} or {D}.

use std::collections::HashSet;
use std::sync::Arc;

use xacml_model::IndeterminateError;

use crate::combining::{Combinable, CombinerParameter, CombiningAlgorithm, CombiningLevel};
use crate::context::EvaluationContext;
use crate::decision::{Decision, DecisionResult, ExtendedIndeterminate, PolicyIdentifier, PolicyKind, Status};
use crate::error::BuildError;
use crate::expression::{VariableDefinition, VariableReference, VariableTable};
use crate::pep::{PepActionExpression, PepActionExpressions};
use crate::rule::Rule;
use crate::target::Target;

const DEFAULT_VERSION: &str = "1.0";

/// Apply the target outcome, the element's own PEP actions and its
/// identifier to a combined result.
fn finish(
    identifier: &PolicyIdentifier,
    target: Result<bool, IndeterminateError>,
    mut result: DecisionResult,
    pep_actions: &PepActionExpressions,
    ctx: &mut EvaluationContext<'_>,
) -> DecisionResult {
    let applicable = result.take_applicable_policies();

    let mut result = match target {
        Err(e) => downgrade(result, &e.context(format_args!("target of {}", identifier.id))),
        Ok(_) => match result.decision().effect() {
            Some(effect) => match pep_actions.evaluate(effect, ctx) {
                Ok(actions) => {
                    result.append_pep_actions(actions);
                    result
                }
                Err(e) => DecisionResult::indeterminate(
                    ExtendedIndeterminate::for_effect(effect),
                    &e.context(format_args!("{}", identifier.id)),
                ),
            },
            None => result,
        },
    };

    result.set_applicable_policies(applicable);
    if !result.is_not_applicable() {
        result.push_applicable_policy(identifier.clone());
    }
    tracing::debug!("{} '{}' evaluated to {}", kind_name(identifier.kind), identifier.id, result);
    result
}

/// Combined result under an Indeterminate target.
fn downgrade(result: DecisionResult, error: &IndeterminateError) -> DecisionResult {
    let extended = match result.decision() {
        Decision::NotApplicable => return result,
        Decision::Permit => ExtendedIndeterminate::P,
        Decision::Deny => ExtendedIndeterminate::D,
        Decision::Indeterminate => result.extended_indeterminate(),
    };
    DecisionResult::indeterminate_with_status(extended, Status::from(error))
}

fn kind_name(kind: PolicyKind) -> &'static str {
    match kind {
        PolicyKind::Policy => "policy",
        PolicyKind::PolicySet => "policy set",
    }
}

#[derive(Debug, Clone)]
pub struct Policy {
    identifier: PolicyIdentifier,
    description: Option<String>,
    target: Target,
    variables: Arc<VariableTable>,
    rules: Vec<Rule>,
    algorithm: Arc<dyn CombiningAlgorithm>,
    combiner_parameters: Vec<CombinerParameter>,
    pep_actions: PepActionExpressions,
}

impl Policy {
    pub fn builder(id: impl Into<String>, algorithm: Arc<dyn CombiningAlgorithm>) -> PolicyBuilder {
        PolicyBuilder {
            id: id.into(),
            version: DEFAULT_VERSION.to_string(),
            description: None,
            target: Target::default(),
            variables: Vec::new(),
            rules: Vec::new(),
            algorithm,
            combiner_parameters: Vec::new(),
            pep_actions: PepActionExpressions::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.identifier.id
    }

    pub fn version(&self) -> &str {
        &self.identifier.version
    }

    pub fn identifier(&self) -> &PolicyIdentifier {
        &self.identifier
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn algorithm(&self) -> &Arc<dyn CombiningAlgorithm> {
        &self.algorithm
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        let previous = ctx.enter_variable_scope(Arc::clone(&self.variables));
        let result = self.evaluate_in_scope(ctx);
        ctx.exit_variable_scope(previous);
        result
    }

    fn evaluate_in_scope(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        let target = self.target.evaluate(ctx);
        if let Ok(false) = target {
            tracing::debug!("policy '{}' target does not match", self.identifier.id);
            return DecisionResult::not_applicable();
        }
        let children: Vec<&dyn Combinable> = self.rules.iter().map(|r| r as &dyn Combinable).collect();
        let combined = self.algorithm.combine(&children, &self.combiner_parameters, ctx);
        finish(&self.identifier, target, combined, &self.pep_actions, ctx)
    }
}

pub struct PolicyBuilder {
    id: String,
    version: String,
    description: Option<String>,
    target: Target,
    variables: Vec<VariableDefinition>,
    rules: Vec<Rule>,
    algorithm: Arc<dyn CombiningAlgorithm>,
    combiner_parameters: Vec<CombinerParameter>,
    pep_actions: PepActionExpressions,
}

impl PolicyBuilder {
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn variable(mut self, definition: VariableDefinition) -> Self {
        self.variables.push(definition);
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn combiner_parameter(mut self, parameter: CombinerParameter) -> Self {
        self.combiner_parameters.push(parameter);
        self
    }

    pub fn obligation(mut self, obligation: PepActionExpression) -> Self {
        self.pep_actions.push_obligation(obligation);
        self
    }

    pub fn advice(mut self, advice: PepActionExpression) -> Self {
        self.pep_actions.push_advice(advice);
        self
    }

    /// Rejects duplicate rule or variable ids, an algorithm that cannot
    /// combine rules, and any VariableReference that names no definition of
    /// this policy or declares the wrong type.
    pub fn build(self) -> Result<Policy, BuildError> {
        if !self.algorithm.supports(CombiningLevel::Rule) {
            return Err(BuildError::UnsupportedCombiningAlgorithm {
                algorithm: self.algorithm.id().to_string(),
                level: CombiningLevel::Rule.to_string(),
            });
        }

        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id()) {
                return Err(BuildError::DuplicateRule {
                    policy: self.id.clone(),
                    rule: rule.id().to_string(),
                });
            }
        }

        let mut variables = VariableTable::default();
        for definition in self.variables {
            variables.insert(definition)?;
        }

        let mut references: Vec<&VariableReference> = Vec::new();
        for definition in variables.iter() {
            definition.expression().variable_references(&mut references);
        }
        for rule in &self.rules {
            rule.variable_references(&mut references);
        }
        self.pep_actions.variable_references(&mut references);
        for reference in references {
            variables.validate_reference(reference)?;
        }

        Ok(Policy {
            identifier: PolicyIdentifier {
                kind: PolicyKind::Policy,
                id: self.id,
                version: self.version,
            },
            description: self.description,
            target: self.target,
            variables: Arc::new(variables),
            rules: self.rules,
            algorithm: self.algorithm,
            combiner_parameters: self.combiner_parameters,
            pep_actions: self.pep_actions,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PolicySet {
    identifier: PolicyIdentifier,
    description: Option<String>,
    target: Target,
    children: Vec<PolicyElement>,
    algorithm: Arc<dyn CombiningAlgorithm>,
    combiner_parameters: Vec<CombinerParameter>,
    pep_actions: PepActionExpressions,
}

impl PolicySet {
    pub fn builder(id: impl Into<String>, algorithm: Arc<dyn CombiningAlgorithm>) -> PolicySetBuilder {
        PolicySetBuilder {
            set: PolicySet {
                identifier: PolicyIdentifier {
                    kind: PolicyKind::PolicySet,
                    id: id.into(),
                    version: DEFAULT_VERSION.to_string(),
                },
                description: None,
                target: Target::default(),
                children: Vec::new(),
                algorithm,
                combiner_parameters: Vec::new(),
                pep_actions: PepActionExpressions::default(),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.identifier.id
    }

    pub fn version(&self) -> &str {
        &self.identifier.version
    }

    pub fn identifier(&self) -> &PolicyIdentifier {
        &self.identifier
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn children(&self) -> &[PolicyElement] {
        &self.children
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        let target = self.target.evaluate(ctx);
        if let Ok(false) = target {
            tracing::debug!("policy set '{}' target does not match", self.identifier.id);
            return DecisionResult::not_applicable();
        }
        let children: Vec<&dyn Combinable> = self.children.iter().map(|c| c as &dyn Combinable).collect();
        let combined = self.algorithm.combine(&children, &self.combiner_parameters, ctx);
        finish(&self.identifier, target, combined, &self.pep_actions, ctx)
    }
}

pub struct PolicySetBuilder {
    set: PolicySet,
}

impl PolicySetBuilder {
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.set.identifier.version = version.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.set.description = Some(description.into());
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.set.target = target;
        self
    }

    pub fn policy(mut self, policy: impl Into<Arc<Policy>>) -> Self {
        self.set.children.push(PolicyElement::Policy(policy.into()));
        self
    }

    pub fn policy_set(mut self, set: impl Into<Arc<PolicySet>>) -> Self {
        self.set.children.push(PolicyElement::PolicySet(set.into()));
        self
    }

    pub fn combiner_parameter(mut self, parameter: CombinerParameter) -> Self {
        self.set.combiner_parameters.push(parameter);
        self
    }

    pub fn obligation(mut self, obligation: PepActionExpression) -> Self {
        self.set.pep_actions.push_obligation(obligation);
        self
    }

    pub fn advice(mut self, advice: PepActionExpression) -> Self {
        self.set.pep_actions.push_advice(advice);
        self
    }

    pub fn build(self) -> Result<PolicySet, BuildError> {
        if !self.set.algorithm.supports(CombiningLevel::Policy) {
            return Err(BuildError::UnsupportedCombiningAlgorithm {
                algorithm: self.set.algorithm.id().to_string(),
                level: CombiningLevel::Policy.to_string(),
            });
        }
        let mut references = Vec::new();
        self.set.pep_actions.variable_references(&mut references);
        if let Some(reference) = references.first() {
            // A policy set has no variable definitions to refer to.
            return Err(BuildError::UnknownVariable(reference.id().to_string()));
        }
        Ok(self.set)
    }
}

/// A child of a policy set, and the root of a PDP.
#[derive(Debug, Clone)]
pub enum PolicyElement {
    Policy(Arc<Policy>),
    PolicySet(Arc<PolicySet>),
}

impl PolicyElement {
    pub fn identifier(&self) -> &PolicyIdentifier {
        match self {
            PolicyElement::Policy(p) => p.identifier(),
            PolicyElement::PolicySet(s) => s.identifier(),
        }
    }

    pub fn target(&self) -> &Target {
        match self {
            PolicyElement::Policy(p) => p.target(),
            PolicyElement::PolicySet(s) => s.target(),
        }
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        match self {
            PolicyElement::Policy(p) => p.evaluate(ctx),
            PolicyElement::PolicySet(s) => s.evaluate(ctx),
        }
    }
}

impl From<Policy> for PolicyElement {
    fn from(policy: Policy) -> Self {
        PolicyElement::Policy(Arc::new(policy))
    }
}

impl From<PolicySet> for PolicyElement {
    fn from(set: PolicySet) -> Self {
        PolicyElement::PolicySet(Arc::new(set))
    }
}

impl Combinable for Rule {
    fn element_id(&self) -> &str {
        self.id()
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        Rule::evaluate(self, ctx)
    }

    fn is_applicable(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, IndeterminateError> {
        self.target().evaluate(ctx)
    }
}

impl Combinable for PolicyElement {
    fn element_id(&self) -> &str {
        &self.identifier().id
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        PolicyElement::evaluate(self, ctx)
    }

    fn is_applicable(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, IndeterminateError> {
        self.target().evaluate(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combining::CombiningAlgorithmRegistry;
    use crate::config::PdpConfig;
    use crate::context::{category, Request};
    use crate::decision::Effect;
    use crate::expression::{AttributeDesignator, Expression};
    use crate::functions::FunctionRegistry;
    use crate::pep::AttributeAssignmentExpression;
    use crate::target::Match;
    use xacml_model::{AttributeValue, Datatype, DatatypeRegistry, ErrorKind, ValueType};

    const DENY_OVERRIDES: &str = "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-overrides";
    const FIRST_APPLICABLE: &str = "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:first-applicable";
    const STRING_EQUAL: &str = "urn:oasis:names:tc:xacml:1.0:function:string-equal";
    const RESOURCE_TYPE: &str = "urn:example:resource-type";

    fn algorithm(id: &str, level: CombiningLevel) -> Arc<dyn CombiningAlgorithm> {
        CombiningAlgorithmRegistry::standard().get(id, level).unwrap()
    }

    fn resource_type_is(value: &str) -> Target {
        let functions = FunctionRegistry::standard();
        Target::single(
            Match::new(
                functions.get(STRING_EQUAL).unwrap(),
                AttributeValue::string(value),
                AttributeDesignator::new(category::RESOURCE, RESOURCE_TYPE, Datatype::String, true).into(),
            )
            .unwrap(),
        )
    }

    fn evaluate(element: &PolicyElement, request: &Request) -> DecisionResult {
        let config = PdpConfig::default();
        let datatypes = DatatypeRegistry::standard();
        let mut ctx = EvaluationContext::new(request, &config, &datatypes);
        element.evaluate(&mut ctx)
    }

    fn permit_rule(id: &str) -> Rule {
        Rule::builder(id, Effect::Permit).build().unwrap()
    }

    #[test]
    fn target_indeterminate_downgrades_permit_to_indeterminate_p() {
        let policy = Policy::builder("p", algorithm(DENY_OVERRIDES, CombiningLevel::Rule))
            .target(resource_type_is("doc"))
            .rule(permit_rule("r"))
            .build()
            .unwrap();
        let result = evaluate(&policy.into(), &Request::new());
        assert_eq!(result.decision(), Decision::Indeterminate);
        assert_eq!(result.extended_indeterminate(), ExtendedIndeterminate::P);
        assert_eq!(result.status().error_kind, Some(ErrorKind::MissingAttribute));
    }

    #[test]
    fn target_indeterminate_keeps_not_applicable() {
        let policy = Policy::builder("p", algorithm(DENY_OVERRIDES, CombiningLevel::Rule))
            .target(resource_type_is("doc"))
            .rule(Rule::builder("r", Effect::Deny).condition(AttributeValue::Boolean(false).into()).build().unwrap())
            .build()
            .unwrap();
        assert!(evaluate(&policy.into(), &Request::new()).is_not_applicable());
    }

    #[test]
    fn policy_obligations_follow_rule_obligations() {
        let assign = |id: &str| {
            PepActionExpression::new(id, Effect::Permit).assignment(
                AttributeAssignmentExpression::new("urn:example:a", AttributeValue::string(id).into()).unwrap(),
            )
        };
        let rule = Rule::builder("r", Effect::Permit).obligation(assign("from-rule")).build().unwrap();
        let policy = Policy::builder("p", algorithm(DENY_OVERRIDES, CombiningLevel::Rule))
            .rule(rule)
            .obligation(assign("from-policy"))
            .obligation(PepActionExpression::new("on-deny", Effect::Deny))
            .build()
            .unwrap();
        let result = evaluate(&policy.into(), &Request::new());
        let ids: Vec<&str> = result.pep_actions().obligations().iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["from-rule", "from-policy"]);
    }

    #[test]
    fn variables_are_checked_at_build_time() {
        let err = Policy::builder("p", algorithm(DENY_OVERRIDES, CombiningLevel::Rule))
            .rule(
                Rule::builder("r", Effect::Permit)
                    .condition(Expression::variable("missing", ValueType::boolean()))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::UnknownVariable(id) if id == "missing"));

        let err = Policy::builder("p", algorithm(DENY_OVERRIDES, CombiningLevel::Rule))
            .variable(VariableDefinition::new("v", AttributeValue::integer(1).into()).unwrap())
            .rule(
                Rule::builder("r", Effect::Permit)
                    .condition(Expression::variable("v", ValueType::boolean()))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::VariableTypeMismatch { .. }));
    }

    #[test]
    fn duplicate_rule_ids_are_rejected() {
        let err = Policy::builder("p", algorithm(DENY_OVERRIDES, CombiningLevel::Rule))
            .rule(permit_rule("r"))
            .rule(permit_rule("r"))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateRule { .. }));
    }

    #[test]
    fn only_one_applicable_cannot_combine_rules() {
        let only_one = algorithm(
            "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:only-one-applicable",
            CombiningLevel::Policy,
        );
        let err = Policy::builder("p", only_one).rule(permit_rule("r")).build().unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedCombiningAlgorithm { .. }));
    }

    #[test]
    fn applicable_policies_are_listed_innermost_first() {
        let inner = Policy::builder("inner", algorithm(DENY_OVERRIDES, CombiningLevel::Rule))
            .version("2.1")
            .rule(permit_rule("r"))
            .build()
            .unwrap();
        let skipped = Policy::builder("skipped", algorithm(DENY_OVERRIDES, CombiningLevel::Rule))
            .target(resource_type_is("image"))
            .rule(permit_rule("r"))
            .build()
            .unwrap();
        let set = PolicySet::builder("root", algorithm(FIRST_APPLICABLE, CombiningLevel::Policy))
            .policy(skipped)
            .policy(inner)
            .build()
            .unwrap();
        let request = Request::new().with_attribute(category::RESOURCE, RESOURCE_TYPE, "doc");
        let result = evaluate(&set.into(), &request);
        assert_eq!(result.decision(), Decision::Permit);
        let ids: Vec<String> = result.applicable_policies().iter().map(ToString::to_string).collect();
        assert_eq!(ids, vec!["inner v2.1", "root v1.0"]);
    }
}
