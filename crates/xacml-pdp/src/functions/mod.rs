//! Function library.
//!
//! Every function has a fixed signature checked when an Apply is built, and
//! an evaluation body. Most functions are first-order: their arguments are
//! evaluated left to right, the first Indeterminate wins, and the body runs
//! on plain values. The logical functions and the higher-order functions
//! override [`Function::evaluate`] to control argument evaluation.

pub mod arithmetic;
pub mod bag;
pub mod comparison;
pub mod conversion;
pub mod date;
pub mod higher_order;
pub mod logical;
pub mod matching;
pub mod string;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;
use xacml_model::{AttributeValue, Bag, Datatype, IndeterminateError, Value, ValueType};

use crate::context::EvaluationContext;
use crate::error::BuildError;
use crate::expression::Expression;

pub const XACML1: &str = "urn:oasis:names:tc:xacml:1.0:function:";
pub const XACML2: &str = "urn:oasis:names:tc:xacml:2.0:function:";
pub const XACML3: &str = "urn:oasis:names:tc:xacml:3.0:function:";

/// A function callable from an Apply, a Match or a higher-order function.
pub trait Function: Send + Sync {
    fn id(&self) -> &str;

    /// Check argument types; returns the result type.
    fn check_types(&self, arg_types: &[ValueType]) -> Result<ValueType, BuildError>;

    /// Check argument expressions. Only higher-order functions accept a
    /// bare function reference.
    fn check(&self, args: &[Expression]) -> Result<ValueType, BuildError> {
        let types = args
            .iter()
            .map(|arg| {
                arg.return_type().ok_or_else(|| {
                    BuildError::invalid_arguments(
                        self.id(),
                        "a function reference is only allowed as the first argument of a higher-order function",
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.check_types(&types)
    }

    /// Apply the function to already-evaluated arguments.
    fn call(&self, args: &[Value]) -> Result<Value, IndeterminateError>;

    fn evaluate(
        &self,
        args: &[Expression],
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Value, IndeterminateError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(arg.evaluate(ctx)?);
        }
        self.call(&values).map_err(|e| e.context(self.id()))
    }
}

impl fmt::Debug for dyn Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.id())
    }
}

/// Parameter list of a first-order function.
#[derive(Debug, Clone)]
pub enum Params {
    Fixed(Vec<ValueType>),
    /// The `fixed` parameters, then at least `min` more of `repeated`.
    Variadic {
        fixed: Vec<ValueType>,
        repeated: ValueType,
        min: usize,
    },
}

impl Params {
    fn check(&self, function: &str, arg_types: &[ValueType]) -> Result<(), BuildError> {
        let (fixed, rest) = match self {
            Params::Fixed(params) => {
                if arg_types.len() != params.len() {
                    return Err(BuildError::invalid_arguments(
                        function,
                        format!("expected {} arguments, found {}", params.len(), arg_types.len()),
                    ));
                }
                (params, None)
            }
            Params::Variadic {
                fixed,
                repeated,
                min,
            } => {
                if arg_types.len() < fixed.len() + min {
                    return Err(BuildError::invalid_arguments(
                        function,
                        format!(
                            "expected at least {} arguments, found {}",
                            fixed.len() + min,
                            arg_types.len()
                        ),
                    ));
                }
                (fixed, Some(repeated))
            }
        };
        for (i, actual) in arg_types.iter().enumerate() {
            let expected = fixed.get(i).or(rest);
            if expected != Some(actual) {
                return Err(BuildError::invalid_arguments(
                    function,
                    format!(
                        "argument {}: expected {}, found {}",
                        i + 1,
                        expected.map(ToString::to_string).unwrap_or_default(),
                        actual
                    ),
                ));
            }
        }
        Ok(())
    }
}

type Body = Arc<dyn Fn(&[Value]) -> Result<Value, IndeterminateError> + Send + Sync>;

/// A function that is a plain mapping from argument values to a value.
#[derive(Clone)]
pub struct FirstOrderFunction {
    id: String,
    params: Params,
    returns: ValueType,
    body: Body,
}

impl FirstOrderFunction {
    pub fn new<F>(id: impl Into<String>, params: Vec<ValueType>, returns: ValueType, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, IndeterminateError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            params: Params::Fixed(params),
            returns,
            body: Arc::new(body),
        }
    }

    pub fn variadic<F>(
        id: impl Into<String>,
        fixed: Vec<ValueType>,
        repeated: ValueType,
        min: usize,
        returns: ValueType,
        body: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, IndeterminateError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            params: Params::Variadic {
                fixed,
                repeated,
                min,
            },
            returns,
            body: Arc::new(body),
        }
    }
}

impl Function for FirstOrderFunction {
    fn id(&self) -> &str {
        &self.id
    }

    fn check_types(&self, arg_types: &[ValueType]) -> Result<ValueType, BuildError> {
        self.params.check(&self.id, arg_types)?;
        Ok(self.returns.clone())
    }

    fn call(&self, args: &[Value]) -> Result<Value, IndeterminateError> {
        (self.body)(args)
    }
}

/// Functions known to an engine, keyed by identifier.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    /// Every standard XACML 3.0 function.
    pub fn standard() -> Self {
        let mut registry = Self::default();
        logical::register(&mut registry);
        comparison::register(&mut registry);
        arithmetic::register(&mut registry);
        string::register(&mut registry);
        conversion::register(&mut registry);
        bag::register(&mut registry);
        higher_order::register(&mut registry);
        matching::register(&mut registry);
        date::register(&mut registry);
        registry
    }

    /// Register an extension function. Identifiers are unique.
    pub fn register(&mut self, function: Arc<dyn Function>) -> Result<(), BuildError> {
        if self.functions.contains_key(function.id()) {
            return Err(BuildError::Registry(format!(
                "function '{}' is already registered",
                function.id()
            )));
        }
        self.functions.insert(function.id().to_string(), function);
        Ok(())
    }

    pub(crate) fn add(&mut self, function: impl Function + 'static) {
        self.functions
            .insert(function.id().to_string(), Arc::new(function));
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Function>, BuildError> {
        self.functions
            .get(id)
            .cloned()
            .ok_or_else(|| BuildError::UnknownFunction(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.functions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.len())
            .finish()
    }
}

// Shorthands shared by the function modules.

pub(crate) fn one(datatype: Datatype) -> ValueType {
    ValueType::single(datatype)
}

pub(crate) fn bag_of(datatype: Datatype) -> ValueType {
    ValueType::bag(datatype)
}

/// Identifier prefix under which the standard defines the per-datatype
/// functions of `datatype` (bag, set, equality).
pub(crate) fn prefix_for(datatype: &Datatype) -> &'static str {
    match datatype {
        Datatype::DayTimeDuration | Datatype::YearMonthDuration => XACML3,
        Datatype::IpAddress | Datatype::DnsName => XACML2,
        _ => XACML1,
    }
}

fn argument_error(i: usize, expected: &str, found: &Value) -> IndeterminateError {
    IndeterminateError::type_mismatch(format!(
        "argument {}: expected {}, found {}",
        i + 1,
        expected,
        found.value_type()
    ))
}

fn argument(args: &[Value], i: usize) -> Result<&Value, IndeterminateError> {
    args.get(i)
        .ok_or_else(|| IndeterminateError::processing(format!("missing argument {}", i + 1)))
}

pub(crate) fn single_arg(args: &[Value], i: usize) -> Result<&AttributeValue, IndeterminateError> {
    let value = argument(args, i)?;
    value.as_single().ok_or_else(|| argument_error(i, "a single value", value))
}

pub(crate) fn bag_arg(args: &[Value], i: usize) -> Result<&Bag, IndeterminateError> {
    let value = argument(args, i)?;
    value.as_bag().ok_or_else(|| argument_error(i, "a bag", value))
}

pub(crate) fn bool_arg(args: &[Value], i: usize) -> Result<bool, IndeterminateError> {
    let value = argument(args, i)?;
    value.as_bool().ok_or_else(|| argument_error(i, "boolean", value))
}

pub(crate) fn int_arg(args: &[Value], i: usize) -> Result<&BigInt, IndeterminateError> {
    let value = argument(args, i)?;
    value
        .as_single()
        .and_then(AttributeValue::as_integer)
        .ok_or_else(|| argument_error(i, "integer", value))
}

pub(crate) fn double_arg(args: &[Value], i: usize) -> Result<f64, IndeterminateError> {
    let value = argument(args, i)?;
    value
        .as_single()
        .and_then(AttributeValue::as_double)
        .ok_or_else(|| argument_error(i, "double", value))
}

/// Text of a string or anyURI argument.
pub(crate) fn str_arg(args: &[Value], i: usize) -> Result<&str, IndeterminateError> {
    let value = argument(args, i)?;
    value
        .as_single()
        .and_then(AttributeValue::as_str)
        .ok_or_else(|| argument_error(i, "string", value))
}

pub(crate) fn boolean(b: bool) -> Value {
    Value::Single(AttributeValue::Boolean(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_resolves_known_ids() {
        let registry = FunctionRegistry::standard();
        for id in [
            "urn:oasis:names:tc:xacml:1.0:function:string-equal",
            "urn:oasis:names:tc:xacml:1.0:function:integer-divide",
            "urn:oasis:names:tc:xacml:2.0:function:string-concatenate",
            "urn:oasis:names:tc:xacml:3.0:function:any-of",
            "urn:oasis:names:tc:xacml:3.0:function:dayTimeDuration-one-and-only",
            "urn:oasis:names:tc:xacml:2.0:function:ipAddress-bag",
            "urn:oasis:names:tc:xacml:1.0:function:x500Name-match",
        ] {
            assert!(registry.contains(id), "missing {}", id);
        }
        assert!(matches!(
            registry.get("urn:example:no-such-function"),
            Err(BuildError::UnknownFunction(_))
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = FunctionRegistry::standard();
        let shadow = FirstOrderFunction::new(
            format!("{}string-equal", XACML1),
            vec![one(Datatype::String), one(Datatype::String)],
            ValueType::boolean(),
            |_| Ok(boolean(true)),
        );
        assert!(matches!(
            registry.register(Arc::new(shadow)),
            Err(BuildError::Registry(_))
        ));
    }

    #[test]
    fn signature_check_reports_arity_and_types() {
        let registry = FunctionRegistry::standard();
        let f = registry.get(&format!("{}integer-add", XACML1)).unwrap();
        assert!(f.check_types(&[one(Datatype::Integer)]).is_err());
        assert!(f
            .check_types(&[one(Datatype::Integer), one(Datatype::Double)])
            .is_err());
        assert_eq!(
            f.check_types(&vec![one(Datatype::Integer); 3]).unwrap(),
            one(Datatype::Integer)
        );
    }
}
