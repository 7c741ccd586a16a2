// date.rs - Date and dateTime arithmetic with durations.
//
// Results keep the timezone of the dateTime or date operand. Adding
// months clamps to the last day of the month: 2024-01-31 + P1M is
// 2024-02-29.

use xacml_model::{AttributeValue, Datatype, IndeterminateError, Value};

use super::{one, single_arg, FirstOrderFunction, FunctionRegistry, XACML3};

fn out_of_range(function: &str) -> IndeterminateError {
    IndeterminateError::arithmetic(format!("{} result is out of range", function))
}

fn mismatch(expected: &str, found: &AttributeValue) -> IndeterminateError {
    IndeterminateError::type_mismatch(format!("expected {}, found {}", expected, found.datatype()))
}

/// Shift a dateTime or date by a duration; `sign` is 1 or -1.
fn shift(args: &[Value], sign: i64, function: &str) -> Result<Value, IndeterminateError> {
    let base = single_arg(args, 0)?;
    let duration = single_arg(args, 1)?;
    let shifted = match (base, duration) {
        (AttributeValue::DateTime(dt), AttributeValue::DayTimeDuration(d)) => {
            let delta = if sign < 0 { -d.0 } else { d.0 };
            dt.checked_add(delta).map(AttributeValue::DateTime)
        }
        (AttributeValue::DateTime(dt), AttributeValue::YearMonthDuration(d)) => d
            .months
            .checked_mul(sign)
            .and_then(|months| dt.checked_add_months(months))
            .map(AttributeValue::DateTime),
        (AttributeValue::Date(date), AttributeValue::YearMonthDuration(d)) => d
            .months
            .checked_mul(sign)
            .and_then(|months| date.checked_add_months(months))
            .map(AttributeValue::Date),
        (AttributeValue::DateTime(_) | AttributeValue::Date(_), other) => {
            return Err(mismatch("a duration", other))
        }
        (other, _) => return Err(mismatch("dateTime or date", other)),
    };
    shifted.map(Value::Single).ok_or_else(|| out_of_range(function))
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    for (base, duration) in [
        (Datatype::DateTime, Datatype::DayTimeDuration),
        (Datatype::DateTime, Datatype::YearMonthDuration),
        (Datatype::Date, Datatype::YearMonthDuration),
    ] {
        for (op, sign) in [("add", 1), ("subtract", -1)] {
            let id = format!("{}{}-{}-{}", XACML3, base.short_name(), op, duration.short_name());
            let name = id.clone();
            registry.add(FirstOrderFunction::new(
                id,
                vec![one(base.clone()), one(duration.clone())],
                one(base.clone()),
                move |args| shift(args, sign, &name),
            ));
        }
    }
}
