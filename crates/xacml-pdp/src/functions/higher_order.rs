// higher_order.rs - any-of, all-of, any-of-any, all-of-any, any-of-all,
// all-of-all and map.
//
// The first argument is a function reference, applied to bag members. A
// quantifier stops as soon as its result is decided; an Indeterminate
// application is only reported when nothing decided the result.

use xacml_model::{AttributeValue, Bag, IndeterminateError, Value, ValueType};

use super::{Function, FunctionRegistry, XACML3};
use crate::context::EvaluationContext;
use crate::error::BuildError;
use crate::expression::Expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quantifier {
    AnyOf,
    AllOf,
    AnyOfAny,
    AllOfAny,
    AnyOfAll,
    AllOfAll,
    Map,
}

struct HigherOrder {
    id: String,
    quantifier: Quantifier,
}

/// Run `test` over `items`; true as soon as one passes.
fn exists<T>(
    items: impl IntoIterator<Item = T>,
    mut test: impl FnMut(T) -> Result<bool, IndeterminateError>,
) -> Result<bool, IndeterminateError> {
    let mut first_error = None;
    for item in items {
        match test(item) {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    first_error.map_or(Ok(false), Err)
}

/// Run `test` over `items`; false as soon as one fails.
fn for_all<T>(
    items: impl IntoIterator<Item = T>,
    mut test: impl FnMut(T) -> Result<bool, IndeterminateError>,
) -> Result<bool, IndeterminateError> {
    exists(items, |item| test(item).map(|b| !b)).map(|b| !b)
}

fn predicate(function: &dyn Function, args: &[Value]) -> Result<bool, IndeterminateError> {
    let value = function.call(args)?;
    value.as_bool().ok_or_else(|| {
        IndeterminateError::type_mismatch(format!(
            "{} returned {}, expected a boolean",
            function.id(),
            value.value_type()
        ))
    })
}

fn single(value: &AttributeValue) -> Value {
    Value::Single(value.clone())
}

impl HigherOrder {
    fn invalid(&self, reason: impl Into<String>) -> BuildError {
        BuildError::invalid_arguments(&self.id, reason)
    }

    /// Element types the sub-function is applied to, checked against the
    /// argument shapes this quantifier requires.
    fn element_types(&self, arg_types: &[ValueType]) -> Result<Vec<ValueType>, BuildError> {
        match self.quantifier {
            Quantifier::AnyOf | Quantifier::AllOf | Quantifier::Map => {
                let Some((last, fixed)) = arg_types.split_last() else {
                    return Err(self.invalid("expected a bag argument"));
                };
                if !last.is_bag {
                    return Err(self.invalid(format!("last argument must be a bag, found {}", last)));
                }
                if let Some(bag) = fixed.iter().find(|t| t.is_bag) {
                    return Err(self.invalid(format!("only the last argument may be a bag, found {}", bag)));
                }
                let mut types = fixed.to_vec();
                types.push(ValueType::single(last.datatype.clone()));
                Ok(types)
            }
            Quantifier::AnyOfAny => {
                if arg_types.is_empty() {
                    return Err(self.invalid("expected at least one argument after the function"));
                }
                Ok(arg_types
                    .iter()
                    .map(|t| ValueType::single(t.datatype.clone()))
                    .collect())
            }
            Quantifier::AllOfAny | Quantifier::AnyOfAll | Quantifier::AllOfAll => {
                if arg_types.len() != 2 || arg_types.iter().any(|t| !t.is_bag) {
                    return Err(self.invalid("expected exactly two bag arguments after the function"));
                }
                Ok(arg_types
                    .iter()
                    .map(|t| ValueType::single(t.datatype.clone()))
                    .collect())
            }
        }
    }

    fn result_type(&self, function: &dyn Function, arg_types: &[ValueType]) -> Result<ValueType, BuildError> {
        let returns = function.check_types(&self.element_types(arg_types)?)?;
        if self.quantifier == Quantifier::Map {
            if returns.is_bag {
                return Err(self.invalid(format!("{} must return a single value", function.id())));
            }
            return Ok(ValueType::bag(returns.datatype));
        }
        if returns != ValueType::boolean() {
            return Err(BuildError::NotBoolean {
                context: format!("{} argument {}", self.id, function.id()),
                found: returns.to_string(),
            });
        }
        Ok(ValueType::boolean())
    }

    fn apply(&self, function: &dyn Function, values: &[Value]) -> Result<Value, IndeterminateError> {
        let bag_at = |i: usize| {
            values.get(i).and_then(Value::as_bag).ok_or_else(|| {
                IndeterminateError::type_mismatch(format!("argument {}: expected a bag", i + 2))
            })
        };
        let decided = match self.quantifier {
            Quantifier::AnyOf | Quantifier::AllOf => {
                let (fixed, bag) = self.fixed_and_bag(values)?;
                let call = |member: &AttributeValue| {
                    let mut args = fixed.to_vec();
                    args.push(single(member));
                    predicate(function, &args)
                };
                if self.quantifier == Quantifier::AnyOf {
                    exists(bag, call)?
                } else {
                    for_all(bag, call)?
                }
            }
            Quantifier::AnyOfAny => {
                let lists: Vec<Vec<AttributeValue>> = values
                    .iter()
                    .map(|v| match v {
                        Value::Single(s) => vec![s.clone()],
                        Value::Bag(b) => b.values().to_vec(),
                    })
                    .collect();
                any_combination(function, &lists, &mut Vec::with_capacity(lists.len()))?
            }
            Quantifier::AllOfAny => {
                let (a, b) = (bag_at(0)?, bag_at(1)?);
                for_all(a, |x| exists(b, |y| predicate(function, &[single(x), single(y)])))?
            }
            Quantifier::AnyOfAll => {
                let (a, b) = (bag_at(0)?, bag_at(1)?);
                exists(a, |x| for_all(b, |y| predicate(function, &[single(x), single(y)])))?
            }
            Quantifier::AllOfAll => {
                let (a, b) = (bag_at(0)?, bag_at(1)?);
                for_all(a, |x| for_all(b, |y| predicate(function, &[single(x), single(y)])))?
            }
            Quantifier::Map => return self.map(function, values),
        };
        Ok(Value::Single(AttributeValue::Boolean(decided)))
    }

    fn fixed_and_bag<'a>(&self, values: &'a [Value]) -> Result<(&'a [Value], &'a Bag), IndeterminateError> {
        let (last, fixed) = values
            .split_last()
            .ok_or_else(|| IndeterminateError::processing(format!("{}: missing bag argument", self.id)))?;
        let bag = last
            .as_bag()
            .ok_or_else(|| IndeterminateError::type_mismatch(format!("{}: last argument must be a bag", self.id)))?;
        Ok((fixed, bag))
    }

    fn map(&self, function: &dyn Function, values: &[Value]) -> Result<Value, IndeterminateError> {
        let (fixed, bag) = self.fixed_and_bag(values)?;
        let mut arg_types: Vec<ValueType> = fixed.iter().map(Value::value_type).collect();
        arg_types.push(ValueType::single(bag.datatype().clone()));
        let returns = function
            .check_types(&arg_types)
            .map_err(|e| IndeterminateError::processing(e.to_string()))?;
        let mut out = Bag::empty(returns.datatype);
        for member in bag {
            let mut args = fixed.to_vec();
            args.push(single(member));
            let value = function.call(&args)?;
            let value = value.as_single().cloned().ok_or_else(|| {
                IndeterminateError::type_mismatch(format!("{} returned a bag inside map", function.id()))
            })?;
            out.push(value)?;
        }
        Ok(Value::Bag(out))
    }
}

/// True when some choice of one member per list satisfies `function`.
fn any_combination(
    function: &dyn Function,
    lists: &[Vec<AttributeValue>],
    chosen: &mut Vec<Value>,
) -> Result<bool, IndeterminateError> {
    let Some((head, tail)) = lists.split_first() else {
        return predicate(function, chosen);
    };
    exists(head, |member| {
        chosen.push(single(member));
        let result = any_combination(function, tail, chosen);
        chosen.pop();
        result
    })
}

impl Function for HigherOrder {
    fn id(&self) -> &str {
        &self.id
    }

    fn check_types(&self, _arg_types: &[ValueType]) -> Result<ValueType, BuildError> {
        Err(self.invalid("the first argument must be a function reference"))
    }

    fn check(&self, args: &[Expression]) -> Result<ValueType, BuildError> {
        let Some((Expression::Function(function), rest)) = args.split_first() else {
            return Err(self.invalid("the first argument must be a function reference"));
        };
        let arg_types = rest
            .iter()
            .map(|arg| {
                arg.return_type()
                    .ok_or_else(|| self.invalid("only the first argument may be a function reference"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.result_type(function.as_ref(), &arg_types)
    }

    fn call(&self, _args: &[Value]) -> Result<Value, IndeterminateError> {
        Err(IndeterminateError::processing(format!(
            "{} cannot be applied to plain values",
            self.id
        )))
    }

    fn evaluate(
        &self,
        args: &[Expression],
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Value, IndeterminateError> {
        let Some((Expression::Function(function), rest)) = args.split_first() else {
            return Err(IndeterminateError::processing(format!(
                "{}: the first argument must be a function reference",
                self.id
            )));
        };
        let mut values = Vec::with_capacity(rest.len());
        for arg in rest {
            values.push(arg.evaluate(ctx)?);
        }
        self.apply(function.as_ref(), &values)
            .map_err(|e| e.context(&self.id))
    }
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    for (name, quantifier) in [
        ("any-of", Quantifier::AnyOf),
        ("all-of", Quantifier::AllOf),
        ("any-of-any", Quantifier::AnyOfAny),
        ("all-of-any", Quantifier::AllOfAny),
        ("any-of-all", Quantifier::AnyOfAll),
        ("all-of-all", Quantifier::AllOfAll),
        ("map", Quantifier::Map),
    ] {
        registry.add(HigherOrder {
            id: format!("{}{}", XACML3, name),
            quantifier,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PdpConfig;
    use crate::context::Request;
    use std::sync::Arc;

    use crate::functions::{str_arg, FirstOrderFunction, XACML1};
    use xacml_model::{Datatype, DatatypeRegistry, ErrorKind};

    fn function(name: &str) -> Expression {
        Expression::Function(FunctionRegistry::standard().get(name).unwrap())
    }

    fn bag_literal(dt: Datatype, values: Vec<AttributeValue>) -> Expression {
        let registry = FunctionRegistry::standard();
        let constructor = registry
            .get(&format!("{}{}-bag", crate::functions::prefix_for(&dt), dt.short_name()))
            .unwrap();
        Expression::apply(constructor, values.into_iter().map(Expression::Value).collect()).unwrap()
    }

    fn strings(values: &[&str]) -> Expression {
        bag_literal(Datatype::String, values.iter().map(|s| AttributeValue::string(*s)).collect())
    }

    fn ints(values: &[i64]) -> Expression {
        bag_literal(Datatype::Integer, values.iter().map(|i| AttributeValue::integer(*i)).collect())
    }

    fn eval(name: &str, args: Vec<Expression>) -> Result<Value, IndeterminateError> {
        let registry = FunctionRegistry::standard();
        let apply = Expression::apply(registry.get(&format!("{}{}", XACML3, name)).unwrap(), args).unwrap();
        let request = Request::new();
        let config = PdpConfig::default();
        let datatypes = DatatypeRegistry::standard();
        let mut ctx = EvaluationContext::new(&request, &config, &datatypes);
        apply.evaluate(&mut ctx)
    }

    fn yes() -> Value {
        Value::Single(AttributeValue::Boolean(true))
    }

    fn no() -> Value {
        Value::Single(AttributeValue::Boolean(false))
    }

    /// string-equal that fails whenever the bag member is "?".
    fn strict_equal() -> Expression {
        let string = || ValueType::single(Datatype::String);
        let f: Arc<dyn Function> = Arc::new(FirstOrderFunction::new(
            "urn:test:function:strict-string-equal",
            vec![string(), string()],
            ValueType::boolean(),
            |args| {
                let (value, member) = (str_arg(args, 0)?, str_arg(args, 1)?);
                if member == "?" {
                    return Err(IndeterminateError::processing("undecidable member"));
                }
                Ok(Value::Single(AttributeValue::Boolean(value == member)))
            },
        ));
        Expression::Function(f)
    }

    const STRING_EQUAL: &str = "urn:oasis:names:tc:xacml:1.0:function:string-equal";
    const REGEXP_MATCH: &str = "urn:oasis:names:tc:xacml:1.0:function:string-regexp-match";
    const INT_GT: &str = "urn:oasis:names:tc:xacml:1.0:function:integer-greater-than";

    #[test]
    fn any_of_and_all_of() {
        let paul = Expression::Value(AttributeValue::string("Paul"));
        assert_eq!(
            eval("any-of", vec![function(STRING_EQUAL), paul.clone(), strings(&["John", "Paul"])]).unwrap(),
            yes()
        );
        assert_eq!(
            eval("all-of", vec![function(STRING_EQUAL), paul, strings(&["John", "Paul"])]).unwrap(),
            no()
        );
        let ten = Expression::Value(AttributeValue::integer(10));
        assert_eq!(eval("all-of", vec![function(INT_GT), ten, ints(&[1, 3, 5])]).unwrap(), yes());
    }

    #[test]
    fn any_of_empty_bag_is_false_all_of_empty_bag_is_true() {
        let x = Expression::Value(AttributeValue::string("x"));
        assert_eq!(eval("any-of", vec![function(STRING_EQUAL), x.clone(), strings(&[])]).unwrap(), no());
        assert_eq!(eval("all-of", vec![function(STRING_EQUAL), x, strings(&[])]).unwrap(), yes());
    }

    #[test]
    fn two_bag_quantifiers() {
        assert_eq!(
            eval("any-of-any", vec![function(STRING_EQUAL), strings(&["a", "b"]), strings(&["c", "b"])]).unwrap(),
            yes()
        );
        assert_eq!(
            eval("all-of-any", vec![function(INT_GT), ints(&[10, 20]), ints(&[1, 15])]).unwrap(),
            yes()
        );
        assert_eq!(
            eval("any-of-all", vec![function(INT_GT), ints(&[3, 5]), ints(&[1, 2, 4])]).unwrap(),
            yes()
        );
        assert_eq!(
            eval("all-of-all", vec![function(INT_GT), ints(&[3, 5]), ints(&[1, 2, 4])]).unwrap(),
            no()
        );
    }

    #[test]
    fn one_element_quantifiers_remember_errors_until_decided() {
        let value = |s: &str| Expression::Value(AttributeValue::string(s));

        let hit = eval("any-of", vec![strict_equal(), value("b"), strings(&["?", "b"])]);
        assert_eq!(hit.unwrap(), yes());
        let miss = eval("any-of", vec![strict_equal(), value("x"), strings(&["?", "b"])]);
        assert_eq!(miss.unwrap_err().kind(), ErrorKind::Processing);

        let refuted = eval("all-of", vec![strict_equal(), value("b"), strings(&["?", "c"])]);
        assert_eq!(refuted.unwrap(), no());
        let unrefuted = eval("all-of", vec![strict_equal(), value("b"), strings(&["?", "b"])]);
        assert_eq!(unrefuted.unwrap_err().kind(), ErrorKind::Processing);
    }

    #[test]
    fn two_bag_quantifiers_remember_errors_until_decided() {
        let input = || strings(&["abc"]);

        let hit = eval("any-of-any", vec![function(REGEXP_MATCH), strings(&["[", "a"]), input()]);
        assert_eq!(hit.unwrap(), yes());
        let miss = eval("any-of-any", vec![function(REGEXP_MATCH), strings(&["[", "z"]), input()]);
        assert_eq!(miss.unwrap_err().kind(), ErrorKind::Syntax);

        let refuted = eval("all-of-all", vec![function(REGEXP_MATCH), strings(&["[", "z"]), input()]);
        assert_eq!(refuted.unwrap(), no());
        let unrefuted = eval("all-of-all", vec![function(REGEXP_MATCH), strings(&["[", "a"]), input()]);
        assert_eq!(unrefuted.unwrap_err().kind(), ErrorKind::Syntax);
    }

    #[test]
    fn map_applies_to_every_member() {
        let lower = function(&format!("{}string-normalize-to-lower-case", XACML1));
        assert_eq!(
            eval("map", vec![lower, strings(&["Hello", "WORLD"])]).unwrap(),
            Value::Bag(
                Bag::new(Datatype::String, vec![AttributeValue::string("hello"), AttributeValue::string("world")])
                    .unwrap()
            )
        );
    }

    #[test]
    fn build_rejects_non_boolean_predicates_and_missing_function() {
        let registry = FunctionRegistry::standard();
        let any_of = registry.get(&format!("{}any-of", XACML3)).unwrap();
        let concat = function("urn:oasis:names:tc:xacml:2.0:function:string-concatenate");
        let x = Expression::Value(AttributeValue::string("x"));
        assert!(Expression::apply(any_of.clone(), vec![concat, x.clone(), strings(&["a"])]).is_err());
        assert!(Expression::apply(any_of, vec![x, strings(&["a"])]).is_err());
    }
}
