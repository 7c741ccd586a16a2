// logical.rs - and, or, n-of, not.
//
// and/or/n-of evaluate their arguments lazily, left to right, and stop as
// soon as the result is decided. An Indeterminate argument only makes the
// result Indeterminate when no later argument decides it.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};
use xacml_model::{Datatype, IndeterminateError, Value, ValueType};

use super::{bool_arg, boolean, int_arg, one, FirstOrderFunction, Function, FunctionRegistry, Params, XACML1};
use crate::context::EvaluationContext;
use crate::error::BuildError;
use crate::expression::Expression;

/// `and` (decisive = false) and `or` (decisive = true).
struct Junction {
    id: String,
    decisive: bool,
}

impl Function for Junction {
    fn id(&self) -> &str {
        &self.id
    }

    fn check_types(&self, arg_types: &[ValueType]) -> Result<ValueType, BuildError> {
        Params::Variadic {
            fixed: vec![],
            repeated: ValueType::boolean(),
            min: 0,
        }
        .check(&self.id, arg_types)?;
        Ok(ValueType::boolean())
    }

    fn call(&self, args: &[Value]) -> Result<Value, IndeterminateError> {
        for i in 0..args.len() {
            if bool_arg(args, i)? == self.decisive {
                return Ok(boolean(self.decisive));
            }
        }
        Ok(boolean(!self.decisive))
    }

    fn evaluate(
        &self,
        args: &[Expression],
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Value, IndeterminateError> {
        let mut first_error = None;
        for arg in args {
            match arg.evaluate_boolean(ctx) {
                Ok(b) if b == self.decisive => return Ok(boolean(self.decisive)),
                Ok(_) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(boolean(!self.decisive)),
        }
    }
}

/// `n-of`: true when at least n of the remaining arguments are true.
struct NOf;

impl NOf {
    fn required(n: &BigInt, available: usize) -> Result<usize, IndeterminateError> {
        if n.is_negative() {
            return Err(IndeterminateError::processing(format!(
                "n-of: n must not be negative, got {}",
                n
            )));
        }
        n.to_usize().filter(|required| *required <= available).ok_or_else(|| {
            IndeterminateError::processing(format!(
                "n-of: {} true arguments required but only {} given",
                n, available
            ))
        })
    }
}

impl Function for NOf {
    fn id(&self) -> &str {
        "urn:oasis:names:tc:xacml:1.0:function:n-of"
    }

    fn check_types(&self, arg_types: &[ValueType]) -> Result<ValueType, BuildError> {
        Params::Variadic {
            fixed: vec![one(Datatype::Integer)],
            repeated: ValueType::boolean(),
            min: 0,
        }
        .check(self.id(), arg_types)?;
        Ok(ValueType::boolean())
    }

    fn call(&self, args: &[Value]) -> Result<Value, IndeterminateError> {
        let n = Self::required(int_arg(args, 0)?, args.len() - 1)?;
        let mut trues = 0;
        for i in 1..args.len() {
            if bool_arg(args, i)? {
                trues += 1;
            }
        }
        Ok(boolean(trues >= n))
    }

    fn evaluate(
        &self,
        args: &[Expression],
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Value, IndeterminateError> {
        let Some((first, rest)) = args.split_first() else {
            return Err(IndeterminateError::processing("n-of: missing n"));
        };
        let n_value = first.evaluate(ctx)?;
        let n = Self::required(int_arg(std::slice::from_ref(&n_value), 0)?, rest.len())?;
        if n == 0 {
            return Ok(boolean(true));
        }

        let mut trues = 0;
        let mut errors = 0;
        let mut first_error = None;
        for (i, arg) in rest.iter().enumerate() {
            match arg.evaluate_boolean(ctx) {
                Ok(true) => {
                    trues += 1;
                    if trues >= n {
                        return Ok(boolean(true));
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    errors += 1;
                    first_error.get_or_insert(e);
                }
            }
            let unevaluated = rest.len() - i - 1;
            if trues + errors + unevaluated < n {
                return Ok(boolean(false));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(boolean(false)),
        }
    }
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.add(Junction {
        id: format!("{}and", XACML1),
        decisive: false,
    });
    registry.add(Junction {
        id: format!("{}or", XACML1),
        decisive: true,
    });
    registry.add(NOf);
    registry.add(FirstOrderFunction::new(
        format!("{}not", XACML1),
        vec![ValueType::boolean()],
        ValueType::boolean(),
        |args| Ok(boolean(!bool_arg(args, 0)?)),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PdpConfig;
    use crate::context::{category, EvaluationContext, Request};
    use crate::expression::AttributeDesignator;
    use xacml_model::{AttributeValue, DatatypeRegistry, ErrorKind};

    fn lit(b: bool) -> Expression {
        Expression::Value(AttributeValue::Boolean(b))
    }

    fn missing() -> Expression {
        // A designator that must be present but is not, wrapped to a boolean.
        let registry = FunctionRegistry::standard();
        let one_and_only = registry
            .get("urn:oasis:names:tc:xacml:1.0:function:boolean-one-and-only")
            .unwrap();
        Expression::apply(
            one_and_only,
            vec![AttributeDesignator::new(category::ACCESS_SUBJECT, "flag", Datatype::Boolean, true).into()],
        )
        .unwrap()
    }

    fn eval(id: &str, args: Vec<Expression>) -> Result<Value, IndeterminateError> {
        let registry = FunctionRegistry::standard();
        let apply = Expression::apply(registry.get(id).unwrap(), args).unwrap();
        let request = Request::new();
        let config = PdpConfig::default();
        let datatypes = DatatypeRegistry::standard();
        let mut ctx = EvaluationContext::new(&request, &config, &datatypes);
        apply.evaluate(&mut ctx)
    }

    const AND: &str = "urn:oasis:names:tc:xacml:1.0:function:and";
    const OR: &str = "urn:oasis:names:tc:xacml:1.0:function:or";
    const N_OF: &str = "urn:oasis:names:tc:xacml:1.0:function:n-of";

    #[test]
    fn empty_and_is_true_empty_or_is_false() {
        assert_eq!(eval(AND, vec![]).unwrap(), boolean(true));
        assert_eq!(eval(OR, vec![]).unwrap(), boolean(false));
    }

    #[test]
    fn and_short_circuits_past_indeterminate() {
        assert_eq!(eval(AND, vec![missing(), lit(false)]).unwrap(), boolean(false));
        let err = eval(AND, vec![missing(), lit(true)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingAttribute);
    }

    #[test]
    fn or_short_circuits_past_indeterminate() {
        assert_eq!(eval(OR, vec![missing(), lit(true)]).unwrap(), boolean(true));
        assert!(eval(OR, vec![lit(false), missing()]).is_err());
    }

    #[test]
    fn n_of_counts_and_stops_early() {
        let n = |i: i64| Expression::Value(AttributeValue::integer(i));
        assert_eq!(
            eval(N_OF, vec![n(2), lit(true), lit(false), lit(true)]).unwrap(),
            boolean(true)
        );
        assert_eq!(eval(N_OF, vec![n(2), lit(true), missing(), lit(true)]).unwrap(), boolean(true));
        assert_eq!(eval(N_OF, vec![n(2), lit(false), lit(false), missing()]).unwrap(), boolean(false));
        assert!(eval(N_OF, vec![n(2), lit(true), missing(), lit(false)]).is_err());
        assert_eq!(eval(N_OF, vec![n(0)]).unwrap(), boolean(true));
        assert!(eval(N_OF, vec![n(3), lit(true)]).is_err());
        assert!(eval(N_OF, vec![n(-1), lit(true)]).is_err());
        let beyond_usize = Expression::Value(AttributeValue::integer(BigInt::from(u64::MAX) * 2u32));
        assert!(eval(N_OF, vec![beyond_usize, lit(true)]).is_err());
    }

    #[test]
    fn not_rejects_non_boolean_at_build_time() {
        let registry = FunctionRegistry::standard();
        let not = registry.get("urn:oasis:names:tc:xacml:1.0:function:not").unwrap();
        let err = Expression::apply(not, vec![Expression::Value(AttributeValue::integer(1))]);
        assert!(matches!(err, Err(BuildError::InvalidArguments { .. })));
    }
}
