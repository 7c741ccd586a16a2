// conversion.rs - X-from-string, string-from-X and numeric conversions.

use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};
use xacml_model::{AttributeValue, Datatype, IndeterminateError, Value};

use super::{double_arg, int_arg, one, single_arg, str_arg, FirstOrderFunction, FunctionRegistry, XACML1, XACML3};

const CONVERTIBLE: [Datatype; 13] = [
    Datatype::Boolean,
    Datatype::Integer,
    Datatype::Double,
    Datatype::Time,
    Datatype::Date,
    Datatype::DateTime,
    Datatype::AnyUri,
    Datatype::DayTimeDuration,
    Datatype::YearMonthDuration,
    Datatype::X500Name,
    Datatype::Rfc822Name,
    Datatype::IpAddress,
    Datatype::DnsName,
];

/// Truncate toward zero; NaN and infinities fail.
fn double_to_integer(d: f64) -> Result<BigInt, IndeterminateError> {
    BigInt::from_f64(d.trunc()).ok_or_else(|| {
        IndeterminateError::arithmetic(format!("{} cannot be converted to an integer", d))
    })
}

/// Nearest double; integers beyond the double range fail.
fn integer_to_double(i: &BigInt) -> Result<f64, IndeterminateError> {
    i.to_f64().filter(|d| d.is_finite()).ok_or_else(|| {
        IndeterminateError::arithmetic(format!("{} is out of the double range", i))
    })
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    for datatype in CONVERTIBLE {
        let name = datatype.short_name().to_string();
        let target = datatype.clone();
        registry.add(FirstOrderFunction::new(
            format!("{}{}-from-string", XACML3, name),
            vec![one(Datatype::String)],
            one(datatype.clone()),
            move |args| Ok(Value::Single(AttributeValue::parse(&target, str_arg(args, 0)?)?)),
        ));
        registry.add(FirstOrderFunction::new(
            format!("{}string-from-{}", XACML3, name),
            vec![one(datatype)],
            one(Datatype::String),
            |args| Ok(Value::Single(AttributeValue::String(single_arg(args, 0)?.to_string()))),
        ));
    }

    registry.add(FirstOrderFunction::new(
        format!("{}double-to-integer", XACML1),
        vec![one(Datatype::Double)],
        one(Datatype::Integer),
        |args| Ok(Value::Single(AttributeValue::Integer(double_to_integer(double_arg(args, 0)?)?))),
    ));
    registry.add(FirstOrderFunction::new(
        format!("{}integer-to-double", XACML1),
        vec![one(Datatype::Integer)],
        one(Datatype::Double),
        |args| Ok(Value::Single(AttributeValue::Double(integer_to_double(int_arg(args, 0)?)?))),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::Function;
    use xacml_model::ErrorKind;

    fn call(id: &str, arg: AttributeValue) -> Result<Value, IndeterminateError> {
        let registry = FunctionRegistry::standard();
        registry.get(id).unwrap().call(&[Value::Single(arg)])
    }

    #[test]
    fn from_string_parses_and_reports_syntax_errors() {
        let id = "urn:oasis:names:tc:xacml:3.0:function:dayTimeDuration-from-string";
        let v = call(id, AttributeValue::string("PT90M")).unwrap();
        assert_eq!(v.to_string(), "PT1H30M");
        let err = call(
            "urn:oasis:names:tc:xacml:3.0:function:integer-from-string",
            AttributeValue::string("twelve"),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn string_from_uses_canonical_form() {
        let id = "urn:oasis:names:tc:xacml:3.0:function:string-from-boolean";
        assert_eq!(
            call(id, AttributeValue::Boolean(true)).unwrap(),
            Value::Single(AttributeValue::string("true"))
        );
    }

    #[test]
    fn double_to_integer_truncates() {
        assert_eq!(double_to_integer(2.9).unwrap(), BigInt::from(2));
        assert_eq!(double_to_integer(-2.9).unwrap(), BigInt::from(-2));
        assert!(double_to_integer(f64::NAN).is_err());
        assert!(double_to_integer(f64::INFINITY).is_err());
        assert_eq!(double_to_integer(1e19).unwrap(), "10000000000000000000".parse::<BigInt>().unwrap());
    }

    #[test]
    fn integer_to_double_fails_only_past_the_double_range() {
        let huge = BigInt::from(10).pow(400);
        assert_eq!(integer_to_double(&BigInt::from(i64::MAX)).unwrap(), 9.223_372_036_854_775_807e18);
        assert_eq!(integer_to_double(&huge).unwrap_err().kind(), ErrorKind::Arithmetic);
    }
}
