// arithmetic.rs - Integer and double arithmetic.
//
// Integers are unbounded, so the only integer arithmetic error is a zero
// divisor. Double operations follow IEEE-754, except that a non-finite
// result from finite operands and any division by zero are arithmetic
// errors too.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use xacml_model::{AttributeValue, Datatype, IndeterminateError, Value};

use super::{double_arg, int_arg, one, FirstOrderFunction, FunctionRegistry, XACML1};

fn integer(i: BigInt) -> Value {
    Value::Single(AttributeValue::Integer(i))
}

fn double(d: f64) -> Value {
    Value::Single(AttributeValue::Double(d))
}

fn fold_integers(args: &[Value], f: fn(BigInt, &BigInt) -> BigInt) -> Result<Value, IndeterminateError> {
    let mut acc = int_arg(args, 0)?.clone();
    for i in 1..args.len() {
        acc = f(acc, int_arg(args, i)?);
    }
    Ok(integer(acc))
}

/// Both operands of divide and mod, rejecting a zero divisor.
fn divisor_pair<'a>(args: &'a [Value], op: &str) -> Result<(&'a BigInt, &'a BigInt), IndeterminateError> {
    let (a, b) = (int_arg(args, 0)?, int_arg(args, 1)?);
    if b.is_zero() {
        return Err(IndeterminateError::arithmetic(format!("{} by zero", op)));
    }
    Ok((a, b))
}

/// Reject a non-finite result unless an operand was already non-finite.
fn finite(result: f64, operands: &[f64], op: &str) -> Result<Value, IndeterminateError> {
    if !result.is_finite() && operands.iter().all(|o| o.is_finite()) {
        return Err(IndeterminateError::arithmetic(format!(
            "{} of finite operands is not finite",
            op
        )));
    }
    Ok(double(result))
}

fn fold_doubles(args: &[Value], op: &str, f: fn(f64, f64) -> f64) -> Result<Value, IndeterminateError> {
    let operands = (0..args.len())
        .map(|i| double_arg(args, i))
        .collect::<Result<Vec<_>, _>>()?;
    let (first, rest) = operands
        .split_first()
        .ok_or_else(|| IndeterminateError::processing(format!("{} needs operands", op)))?;
    let result = rest.iter().fold(*first, |acc, x| f(acc, *x));
    finite(result, &operands, op)
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    let int = || one(Datatype::Integer);
    let dbl = || one(Datatype::Double);

    registry.add(FirstOrderFunction::variadic(
        format!("{}integer-add", XACML1),
        vec![],
        int(),
        2,
        int(),
        |args| fold_integers(args, |a, b| a + b),
    ));
    registry.add(FirstOrderFunction::variadic(
        format!("{}integer-multiply", XACML1),
        vec![],
        int(),
        2,
        int(),
        |args| fold_integers(args, |a, b| a * b),
    ));
    registry.add(FirstOrderFunction::new(
        format!("{}integer-subtract", XACML1),
        vec![int(), int()],
        int(),
        |args| fold_integers(args, |a, b| a - b),
    ));
    registry.add(FirstOrderFunction::new(
        format!("{}integer-divide", XACML1),
        vec![int(), int()],
        int(),
        // Truncates toward zero.
        |args| divisor_pair(args, "division").map(|(a, b)| integer(a / b)),
    ));
    registry.add(FirstOrderFunction::new(
        format!("{}integer-mod", XACML1),
        vec![int(), int()],
        int(),
        |args| divisor_pair(args, "modulo").map(|(a, b)| integer(a % b)),
    ));
    registry.add(FirstOrderFunction::new(
        format!("{}integer-abs", XACML1),
        vec![int()],
        int(),
        |args| Ok(integer(int_arg(args, 0)?.abs())),
    ));

    registry.add(FirstOrderFunction::variadic(
        format!("{}double-add", XACML1),
        vec![],
        dbl(),
        2,
        dbl(),
        |args| fold_doubles(args, "double-add", |a, b| a + b),
    ));
    registry.add(FirstOrderFunction::variadic(
        format!("{}double-multiply", XACML1),
        vec![],
        dbl(),
        2,
        dbl(),
        |args| fold_doubles(args, "double-multiply", |a, b| a * b),
    ));
    registry.add(FirstOrderFunction::new(
        format!("{}double-subtract", XACML1),
        vec![dbl(), dbl()],
        dbl(),
        |args| fold_doubles(args, "double-subtract", |a, b| a - b),
    ));
    registry.add(FirstOrderFunction::new(
        format!("{}double-divide", XACML1),
        vec![dbl(), dbl()],
        dbl(),
        |args| {
            if double_arg(args, 1)? == 0.0 {
                return Err(IndeterminateError::arithmetic("division by zero"));
            }
            fold_doubles(args, "double-divide", |a, b| a / b)
        },
    ));
    registry.add(FirstOrderFunction::new(
        format!("{}double-abs", XACML1),
        vec![dbl()],
        dbl(),
        |args| Ok(double(double_arg(args, 0)?.abs())),
    ));
    // Half-way cases round to the even neighbour.
    registry.add(FirstOrderFunction::new(
        format!("{}round", XACML1),
        vec![dbl()],
        dbl(),
        |args| Ok(double(double_arg(args, 0)?.round_ties_even())),
    ));
    registry.add(FirstOrderFunction::new(
        format!("{}floor", XACML1),
        vec![dbl()],
        dbl(),
        |args| Ok(double(double_arg(args, 0)?.floor())),
    ));
}
