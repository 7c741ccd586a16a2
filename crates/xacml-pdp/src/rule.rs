// rule.rs - Rules and the rule evaluator.
//
// A rule evaluates in three steps: target, condition, then the effect with
// its obligations and advice. A target error yields Indeterminate with no
// extended value unless `rule_target_extended_indeterminate` is set; a
// condition or obligation error yields Indeterminate{P} or {D} by effect.

use xacml_model::ValueType;

use crate::context::EvaluationContext;
use crate::decision::{DecisionResult, Effect, ExtendedIndeterminate};
use crate::error::BuildError;
use crate::expression::{Expression, VariableReference};
use crate::pep::{PepActionExpression, PepActionExpressions};
use crate::target::Target;

#[derive(Debug, Clone)]
pub struct Rule {
    id: String,
    effect: Effect,
    description: Option<String>,
    target: Target,
    condition: Option<Expression>,
    pep_actions: PepActionExpressions,
}

impl Rule {
    pub fn builder(id: impl Into<String>, effect: Effect) -> RuleBuilder {
        RuleBuilder {
            rule: Rule {
                id: id.into(),
                effect,
                description: None,
                target: Target::default(),
                condition: None,
                pep_actions: PepActionExpressions::default(),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn condition(&self) -> Option<&Expression> {
        self.condition.as_ref()
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        let result = self.decide(ctx);
        tracing::debug!("rule '{}' evaluated to {}", self.id, result);
        result
    }

    fn decide(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        let on_error = ExtendedIndeterminate::for_effect(self.effect);

        match self.target.evaluate(ctx) {
            Ok(true) => {}
            Ok(false) => return DecisionResult::not_applicable(),
            Err(e) => {
                let extended = if ctx.config().rule_target_extended_indeterminate {
                    on_error
                } else {
                    ExtendedIndeterminate::None
                };
                let e = e.context(format_args!("target of rule '{}'", self.id));
                return DecisionResult::indeterminate(extended, &e);
            }
        }

        if let Some(condition) = &self.condition {
            match condition.evaluate_boolean(ctx) {
                Ok(true) => {}
                Ok(false) => return DecisionResult::not_applicable(),
                Err(e) => {
                    let e = e.context(format_args!("condition of rule '{}'", self.id));
                    return DecisionResult::indeterminate(on_error, &e);
                }
            }
        }

        match self.pep_actions.evaluate(self.effect, ctx) {
            Ok(actions) => DecisionResult::for_effect(self.effect, actions),
            Err(e) => {
                let e = e.context(format_args!("rule '{}'", self.id));
                DecisionResult::indeterminate(on_error, &e)
            }
        }
    }

    pub(crate) fn variable_references<'a>(&'a self, out: &mut Vec<&'a VariableReference>) {
        if let Some(condition) = &self.condition {
            condition.variable_references(out);
        }
        self.pep_actions.variable_references(out);
    }
}

pub struct RuleBuilder {
    rule: Rule,
}

impl RuleBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.rule.description = Some(description.into());
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.rule.target = target;
        self
    }

    pub fn condition(mut self, condition: Expression) -> Self {
        self.rule.condition = Some(condition);
        self
    }

    pub fn obligation(mut self, obligation: PepActionExpression) -> Self {
        self.rule.pep_actions.push_obligation(obligation);
        self
    }

    pub fn advice(mut self, advice: PepActionExpression) -> Self {
        self.rule.pep_actions.push_advice(advice);
        self
    }

    /// The condition, when present, must be a single boolean.
    pub fn build(self) -> Result<Rule, BuildError> {
        if let Some(condition) = &self.rule.condition {
            let found = condition.return_type();
            if found != Some(ValueType::boolean()) {
                return Err(BuildError::NotBoolean {
                    context: format!("condition of rule '{}'", self.rule.id),
                    found: found.map(|t| t.to_string()).unwrap_or_else(|| "a function".into()),
                });
            }
        }
        Ok(self.rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PdpConfig;
    use crate::context::{category, Request};
    use crate::decision::Decision;
    use crate::expression::AttributeDesignator;
    use crate::functions::FunctionRegistry;
    use crate::pep::AttributeAssignmentExpression;
    use crate::target::Match;
    use xacml_model::{AttributeValue, Datatype, DatatypeRegistry, ErrorKind};

    fn subject_is(name: &str) -> Target {
        let registry = FunctionRegistry::standard();
        Target::single(
            Match::new(
                registry.get("urn:oasis:names:tc:xacml:1.0:function:string-equal").unwrap(),
                AttributeValue::string(name),
                AttributeDesignator::new(
                    category::ACCESS_SUBJECT,
                    "urn:oasis:names:tc:xacml:1.0:subject:subject-id",
                    Datatype::String,
                    true,
                )
                .into(),
            )
            .unwrap(),
        )
    }

    fn evaluate(rule: &Rule, request: &Request, config: &PdpConfig) -> DecisionResult {
        let datatypes = DatatypeRegistry::standard();
        let mut ctx = EvaluationContext::new(request, config, &datatypes);
        rule.evaluate(&mut ctx)
    }

    fn lit(b: bool) -> Expression {
        Expression::Value(AttributeValue::Boolean(b))
    }

    #[test]
    fn false_condition_is_not_applicable() {
        for effect in [Effect::Permit, Effect::Deny] {
            let rule = Rule::builder("r", effect).condition(lit(false)).build().unwrap();
            let result = evaluate(&rule, &Request::new(), &PdpConfig::default());
            assert_eq!(result.decision(), Decision::NotApplicable);
        }
    }

    #[test]
    fn condition_error_carries_effect() {
        let registry = FunctionRegistry::standard();
        let divide = registry.get("urn:oasis:names:tc:xacml:1.0:function:integer-divide").unwrap();
        let equal = registry.get("urn:oasis:names:tc:xacml:1.0:function:integer-equal").unwrap();
        let quotient = Expression::apply(
            divide,
            vec![AttributeValue::integer(10).into(), AttributeValue::integer(0).into()],
        )
        .unwrap();
        let condition = Expression::apply(equal, vec![quotient, AttributeValue::integer(1).into()]).unwrap();
        let rule = Rule::builder("r", Effect::Deny).condition(condition).build().unwrap();
        let result = evaluate(&rule, &Request::new(), &PdpConfig::default());
        assert_eq!(result.decision(), Decision::Indeterminate);
        assert_eq!(result.extended_indeterminate(), ExtendedIndeterminate::D);
        assert_eq!(result.status().error_kind, Some(ErrorKind::Arithmetic));
    }

    #[test]
    fn target_error_has_no_extended_indeterminate_by_default() {
        let rule = Rule::builder("r", Effect::Permit).target(subject_is("alice")).build().unwrap();
        let result = evaluate(&rule, &Request::new(), &PdpConfig::default());
        assert_eq!(result.decision(), Decision::Indeterminate);
        assert_eq!(result.extended_indeterminate(), ExtendedIndeterminate::None);
    }

    #[test]
    fn target_error_uses_effect_when_configured() {
        let config = PdpConfig {
            rule_target_extended_indeterminate: true,
            ..PdpConfig::default()
        };
        let rule = Rule::builder("r", Effect::Permit).target(subject_is("alice")).build().unwrap();
        let result = evaluate(&rule, &Request::new(), &config);
        assert_eq!(result.extended_indeterminate(), ExtendedIndeterminate::P);
    }

    #[test]
    fn obligations_follow_the_effect() {
        let rule = Rule::builder("r", Effect::Permit)
            .obligation(
                PepActionExpression::new("urn:example:log", Effect::Permit).assignment(
                    AttributeAssignmentExpression::new("urn:example:msg", AttributeValue::string("hi").into())
                        .unwrap(),
                ),
            )
            .obligation(PepActionExpression::new("urn:example:on-deny", Effect::Deny))
            .build()
            .unwrap();
        let result = evaluate(&rule, &Request::new(), &PdpConfig::default());
        assert_eq!(result.decision(), Decision::Permit);
        let obligations = result.pep_actions().obligations();
        assert_eq!(obligations.len(), 1);
        assert_eq!(obligations[0].id, "urn:example:log");
        assert_eq!(obligations[0].assignments[0].value, AttributeValue::string("hi"));
    }

    #[test]
    fn failing_obligation_makes_rule_indeterminate() {
        let missing = AttributeDesignator::new(category::RESOURCE, "urn:example:owner", Datatype::String, true);
        let rule = Rule::builder("r", Effect::Deny)
            .obligation(
                PepActionExpression::new("urn:example:notify", Effect::Deny)
                    .assignment(AttributeAssignmentExpression::new("urn:example:owner", missing.into()).unwrap()),
            )
            .build()
            .unwrap();
        let result = evaluate(&rule, &Request::new(), &PdpConfig::default());
        assert_eq!(result.decision(), Decision::Indeterminate);
        assert_eq!(result.extended_indeterminate(), ExtendedIndeterminate::D);
        assert_eq!(result.status().error_kind, Some(ErrorKind::MissingAttribute));
    }

    #[test]
    fn non_boolean_condition_is_rejected() {
        let err = Rule::builder("r", Effect::Permit)
            .condition(AttributeValue::integer(1).into())
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::NotBoolean { .. }));
    }
}
