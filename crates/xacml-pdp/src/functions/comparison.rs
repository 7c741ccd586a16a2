// comparison.rs - Equality and ordering predicates, time-in-range.

use std::cmp::Ordering;

use xacml_model::{AttributeValue, Datatype, IndeterminateError, Value, ValueType};

use super::{boolean, one, prefix_for, single_arg, str_arg, FirstOrderFunction, FunctionRegistry, XACML1, XACML2, XACML3};

/// Datatypes with an `-equal` function.
const EQUALITY_TYPES: [Datatype; 14] = [
    Datatype::String,
    Datatype::Boolean,
    Datatype::Integer,
    Datatype::Double,
    Datatype::Date,
    Datatype::Time,
    Datatype::DateTime,
    Datatype::DayTimeDuration,
    Datatype::YearMonthDuration,
    Datatype::AnyUri,
    Datatype::X500Name,
    Datatype::Rfc822Name,
    Datatype::HexBinary,
    Datatype::Base64Binary,
];

/// Datatypes with greater-than / less-than functions.
const ORDERED_TYPES: [Datatype; 6] = [
    Datatype::Integer,
    Datatype::Double,
    Datatype::String,
    Datatype::Time,
    Datatype::DateTime,
    Datatype::Date,
];

const ORDERINGS: [(&str, fn(Ordering) -> bool); 4] = [
    ("greater-than", Ordering::is_gt),
    ("greater-than-or-equal", Ordering::is_ge),
    ("less-than", Ordering::is_lt),
    ("less-than-or-equal", Ordering::is_le),
];

fn compare(args: &[Value], accept: fn(Ordering) -> bool) -> Result<Value, IndeterminateError> {
    let a = single_arg(args, 0)?;
    let b = single_arg(args, 1)?;
    // Incomparable pairs (NaN) satisfy no ordering.
    Ok(boolean(a.compare(b).is_some_and(accept)))
}

fn nanos_of_day(value: &AttributeValue) -> Result<i64, IndeterminateError> {
    match value {
        AttributeValue::Time(t) => Ok(t.utc_nanos_of_day()),
        other => Err(IndeterminateError::type_mismatch(format!(
            "expected time, found {}",
            other.datatype()
        ))),
    }
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    for datatype in EQUALITY_TYPES {
        registry.add(FirstOrderFunction::new(
            format!("{}{}-equal", prefix_for(&datatype), datatype.short_name()),
            vec![one(datatype.clone()), one(datatype.clone())],
            ValueType::boolean(),
            |args| Ok(boolean(single_arg(args, 0)? == single_arg(args, 1)?)),
        ));
    }

    registry.add(FirstOrderFunction::new(
        format!("{}string-equal-ignore-case", XACML3),
        vec![one(Datatype::String), one(Datatype::String)],
        ValueType::boolean(),
        |args| {
            let a = str_arg(args, 0)?;
            let b = str_arg(args, 1)?;
            Ok(boolean(a.to_lowercase() == b.to_lowercase()))
        },
    ));

    for datatype in ORDERED_TYPES {
        for (name, accept) in ORDERINGS {
            registry.add(FirstOrderFunction::new(
                format!("{}{}-{}", XACML1, datatype.short_name(), name),
                vec![one(datatype.clone()), one(datatype.clone())],
                ValueType::boolean(),
                move |args| compare(args, accept),
            ));
        }
    }

    // True when the first time lies in [lower, upper]. An upper bound below
    // the lower one means the range spans midnight. Zoneless times are in
    // the PDP's implicit timezone, UTC.
    registry.add(FirstOrderFunction::new(
        format!("{}time-in-range", XACML2),
        vec![one(Datatype::Time); 3],
        ValueType::boolean(),
        |args| {
            let t = nanos_of_day(single_arg(args, 0)?)?;
            let lower = nanos_of_day(single_arg(args, 1)?)?;
            let upper = nanos_of_day(single_arg(args, 2)?)?;
            let inside = if lower <= upper {
                lower <= t && t <= upper
            } else {
                t >= lower || t <= upper
            };
            Ok(boolean(inside))
        },
    ));
}
