// scenarios.rs - End-to-end decisions through the public API.
//
// Each test builds a small policy tree with a standard Registry, wraps it
// in a Pdp and checks the decision for concrete requests:
//
//   A. alice matches the subject-id target      => Permit
//   B. bob does not                             => NotApplicable
//   C. subject-id absent, must be present       => Indeterminate (missing attribute)
//   D. deny-overrides over a Permit and a Deny  => Deny
//   E. string-concatenate                       => "This is my test !"
//   F. integer-divide by zero                   => Indeterminate (arithmetic)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use xacml_model::{AttributeValue, ErrorKind, StatusCode, Value, ValueType};
use xacml_pdp::context::{attribute_id, category};
use xacml_pdp::functions::FirstOrderFunction;
use xacml_pdp::{
    Decision, EvaluationContext, Expression, ExtendedIndeterminate, Pdp, PdpConfig, Policy, PolicySet, Registry,
    Request, Rule, Effect, Target,
};

const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
const STRING_EQUAL: &str = "urn:oasis:names:tc:xacml:1.0:function:string-equal";
const RULE_DENY_OVERRIDES: &str = "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-overrides";
const RULE_FIRST_APPLICABLE: &str = "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:first-applicable";
const POLICY_DENY_OVERRIDES: &str = "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:deny-overrides";

fn subject_is(registry: &Registry, name: &str) -> Target {
    let designator = registry
        .designator(category::ACCESS_SUBJECT, attribute_id::SUBJECT_ID, STRING, true)
        .unwrap();
    Target::single(registry.match_(STRING_EQUAL, AttributeValue::string(name), designator).unwrap())
}

fn subject(name: &str) -> Request {
    Request::new().with_attribute(category::ACCESS_SUBJECT, attribute_id::SUBJECT_ID, name)
}

/// One policy holding `rule`.
fn pdp_for(registry: Arc<Registry>, rule: Rule) -> Pdp {
    let policy = Policy::builder("policy", registry.rule_combining_algorithm(RULE_DENY_OVERRIDES).unwrap())
        .rule(rule)
        .build()
        .unwrap();
    Pdp::new(policy, registry, PdpConfig::default())
}

fn alice_rule(registry: &Registry) -> Rule {
    Rule::builder("permit-alice", Effect::Permit)
        .target(subject_is(registry, "alice"))
        .build()
        .unwrap()
}

/// Evaluate a standalone expression against an empty request.
fn evaluate_expression(registry: &Registry, expr: &Expression) -> Result<Value, xacml_model::IndeterminateError> {
    let request = Request::new();
    let config = PdpConfig::default();
    let mut ctx = EvaluationContext::new(&request, &config, registry.datatypes());
    expr.evaluate(&mut ctx)
}

#[test]
fn scenario_a_matching_subject_is_permitted() {
    let registry = Arc::new(Registry::standard());
    let pdp = pdp_for(Arc::clone(&registry), alice_rule(&registry));
    assert_eq!(pdp.evaluate(&subject("alice")).decision(), Decision::Permit);
}

#[test]
fn scenario_b_other_subject_is_not_applicable() {
    let registry = Arc::new(Registry::standard());
    let pdp = pdp_for(Arc::clone(&registry), alice_rule(&registry));
    assert_eq!(pdp.evaluate(&subject("bob")).decision(), Decision::NotApplicable);
}

#[test]
fn scenario_c_absent_subject_is_missing_attribute() {
    let registry = Arc::new(Registry::standard());
    let pdp = pdp_for(Arc::clone(&registry), alice_rule(&registry));
    let result = pdp.evaluate(&Request::new());

    assert_eq!(result.decision(), Decision::Indeterminate);
    let status = result.status();
    assert_eq!(status.code, StatusCode::MissingAttribute);
    assert_eq!(status.error_kind, Some(ErrorKind::MissingAttribute));
    let missing = status.missing_attribute.as_ref().unwrap();
    assert_eq!(missing.attribute_id, attribute_id::SUBJECT_ID);
    assert_eq!(missing.category, category::ACCESS_SUBJECT);
    assert!(status.message.as_deref().unwrap().contains("permit-alice"));
}

#[test]
fn scenario_d_deny_overrides_policy_set() {
    let registry = Arc::new(Registry::standard());
    let rules = registry.rule_combining_algorithm(RULE_DENY_OVERRIDES).unwrap();
    let permitting = Policy::builder("permitting", Arc::clone(&rules))
        .rule(Rule::builder("permit", Effect::Permit).build().unwrap())
        .build()
        .unwrap();
    let denying = Policy::builder("denying", rules)
        .rule(Rule::builder("deny", Effect::Deny).build().unwrap())
        .build()
        .unwrap();
    let set = PolicySet::builder("root", registry.policy_combining_algorithm(POLICY_DENY_OVERRIDES).unwrap())
        .policy(permitting)
        .policy(denying)
        .build()
        .unwrap();

    let pdp = Pdp::new(set, Arc::clone(&registry), PdpConfig::default());
    assert_eq!(pdp.evaluate(&Request::new()).decision(), Decision::Deny);
}

#[test]
fn scenario_e_string_concatenate() {
    let registry = Registry::standard();
    let args = ["This ", "is ", "my ", "test !"]
        .into_iter()
        .map(|s| AttributeValue::string(s).into())
        .collect();
    let expr = registry
        .apply("urn:oasis:names:tc:xacml:2.0:function:string-concatenate", args)
        .unwrap();
    let value = evaluate_expression(&registry, &expr).unwrap();
    assert_eq!(value, Value::Single(AttributeValue::string("This is my test !")));
}

#[test]
fn scenario_f_integer_divide_by_zero_is_indeterminate() {
    let registry = Arc::new(Registry::standard());
    let quotient = registry
        .apply(
            "urn:oasis:names:tc:xacml:1.0:function:integer-divide",
            vec![AttributeValue::integer(10).into(), AttributeValue::integer(0).into()],
        )
        .unwrap();
    let err = evaluate_expression(&registry, &quotient).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Arithmetic);

    let condition = registry
        .apply(
            "urn:oasis:names:tc:xacml:1.0:function:integer-equal",
            vec![quotient, AttributeValue::integer(0).into()],
        )
        .unwrap();
    let rule = Rule::builder("divide", Effect::Permit).condition(condition).build().unwrap();
    let result = pdp_for(Arc::clone(&registry), rule).evaluate(&Request::new());
    assert_eq!(result.decision(), Decision::Indeterminate);
    assert_eq!(result.extended_indeterminate(), ExtendedIndeterminate::P);
    assert_eq!(result.status().code, StatusCode::ProcessingError);
}

#[test]
fn integer_conditions_go_past_64_bits() {
    const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    let registry = Arc::new(Registry::standard());
    let above_i64 = registry.literal(INTEGER, "9223372036854775808").unwrap();
    let two_to_32 = registry.literal(INTEGER, "4294967296").unwrap();
    let product = registry
        .apply(
            "urn:oasis:names:tc:xacml:1.0:function:integer-multiply",
            vec![two_to_32.clone().into(), two_to_32.into()],
        )
        .unwrap();
    assert_eq!(
        evaluate_expression(&registry, &product).unwrap().to_string(),
        "18446744073709551616"
    );

    let condition = registry
        .apply(
            "urn:oasis:names:tc:xacml:1.0:function:integer-greater-than",
            vec![product, above_i64.into()],
        )
        .unwrap();
    let rule = Rule::builder("large", Effect::Permit).condition(condition).build().unwrap();
    let result = pdp_for(Arc::clone(&registry), rule).evaluate(&Request::new());
    assert_eq!(result.decision(), Decision::Permit);
}

#[test]
fn deny_rule_with_false_condition_is_never_indeterminate() {
    let registry = Arc::new(Registry::standard());
    let rule = Rule::builder("deny", Effect::Deny)
        .condition(AttributeValue::Boolean(false).into())
        .build()
        .unwrap();
    let pdp = pdp_for(Arc::clone(&registry), rule);
    for request in [Request::new(), subject("alice"), subject("bob")] {
        assert_eq!(pdp.evaluate(&request).decision(), Decision::NotApplicable);
    }
}

#[test]
fn empty_target_matches_every_request() {
    let registry = Arc::new(Registry::standard());
    let rule = Rule::builder("anyone", Effect::Permit).target(Target::default()).build().unwrap();
    let pdp = pdp_for(Arc::clone(&registry), rule);
    for request in [Request::new(), subject("alice"), subject("bob")] {
        assert_eq!(pdp.evaluate(&request).decision(), Decision::Permit);
    }
}

#[test]
fn first_applicable_never_evaluates_later_rules() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let spy = FirstOrderFunction::new(
        "urn:example:function:spy",
        Vec::new(),
        ValueType::boolean(),
        move |_args: &[Value]| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Single(AttributeValue::Boolean(true)))
        },
    );
    let mut registry = Registry::standard();
    registry.register_function(Arc::new(spy)).unwrap();
    let registry = Arc::new(registry);

    let spied = registry.apply("urn:example:function:spy", Vec::new()).unwrap();
    let policy = Policy::builder("ordered", registry.rule_combining_algorithm(RULE_FIRST_APPLICABLE).unwrap())
        .rule(alice_rule(&registry))
        .rule(Rule::builder("spied", Effect::Deny).condition(spied).build().unwrap())
        .build()
        .unwrap();
    let pdp = Pdp::new(policy, Arc::clone(&registry), PdpConfig::default());

    assert_eq!(pdp.evaluate(&subject("alice")).decision(), Decision::Permit);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert_eq!(pdp.evaluate(&subject("bob")).decision(), Decision::Deny);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn set_functions_ignore_order() {
    let registry = Registry::standard();
    let bag = |values: [&str; 2]| {
        registry
            .apply(
                "urn:oasis:names:tc:xacml:1.0:function:string-bag",
                values.into_iter().map(|v| AttributeValue::string(v).into()).collect(),
            )
            .unwrap()
    };
    let equals = registry
        .apply(
            "urn:oasis:names:tc:xacml:1.0:function:string-set-equals",
            vec![bag(["1", "2"]), bag(["2", "1"])],
        )
        .unwrap();
    assert_eq!(
        evaluate_expression(&registry, &equals).unwrap(),
        Value::Single(AttributeValue::Boolean(true))
    );

    let is_in = registry
        .apply(
            "urn:oasis:names:tc:xacml:1.0:function:string-is-in",
            vec![AttributeValue::string("1").into(), bag(["2", "1"])],
        )
        .unwrap();
    assert_eq!(
        evaluate_expression(&registry, &is_in).unwrap(),
        Value::Single(AttributeValue::Boolean(true))
    );
}
