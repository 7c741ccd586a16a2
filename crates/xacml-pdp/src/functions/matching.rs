// matching.rs - Regular-expression and name matching functions.
//
// Regular expressions search anywhere in the input; a policy that wants a
// full match anchors its pattern with ^ and $.

use regex::Regex;
use xacml_model::{AttributeValue, Datatype, IndeterminateError, Value, ValueType};

use super::{boolean, one, single_arg, str_arg, FirstOrderFunction, FunctionRegistry, XACML1, XACML2};

fn regexp_match(pattern: &str, input: &str) -> Result<Value, IndeterminateError> {
    let regex = Regex::new(pattern)
        .map_err(|e| IndeterminateError::syntax(format!("invalid regular expression '{}': {}", pattern, e)))?;
    Ok(boolean(regex.is_match(input)))
}

fn type_error(expected: &str, found: &AttributeValue) -> IndeterminateError {
    IndeterminateError::type_mismatch(format!("expected {}, found {}", expected, found.datatype()))
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.add(FirstOrderFunction::new(
        format!("{}string-regexp-match", XACML1),
        vec![one(Datatype::String), one(Datatype::String)],
        ValueType::boolean(),
        |args| regexp_match(str_arg(args, 0)?, str_arg(args, 1)?),
    ));

    // The non-string variants match against the value's canonical text.
    for datatype in [
        Datatype::AnyUri,
        Datatype::IpAddress,
        Datatype::DnsName,
        Datatype::Rfc822Name,
        Datatype::X500Name,
    ] {
        registry.add(FirstOrderFunction::new(
            format!("{}{}-regexp-match", XACML2, datatype.short_name()),
            vec![one(Datatype::String), one(datatype)],
            ValueType::boolean(),
            |args| regexp_match(str_arg(args, 0)?, &single_arg(args, 1)?.to_string()),
        ));
    }

    registry.add(FirstOrderFunction::new(
        format!("{}x500Name-match", XACML1),
        vec![one(Datatype::X500Name), one(Datatype::X500Name)],
        ValueType::boolean(),
        |args| match (single_arg(args, 0)?, single_arg(args, 1)?) {
            (AttributeValue::X500Name(suffix), AttributeValue::X500Name(name)) => {
                Ok(boolean(suffix.is_suffix_of(name)))
            }
            (AttributeValue::X500Name(_), other) | (other, _) => Err(type_error("x500Name", other)),
        },
    ));
    registry.add(FirstOrderFunction::new(
        format!("{}rfc822Name-match", XACML1),
        vec![one(Datatype::String), one(Datatype::Rfc822Name)],
        ValueType::boolean(),
        |args| match single_arg(args, 1)? {
            AttributeValue::Rfc822Name(name) => Ok(boolean(name.matches_pattern(str_arg(args, 0)?))),
            other => Err(type_error("rfc822Name", other)),
        },
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::Function;
    use xacml_model::ErrorKind;

    fn call(id: &str, args: Vec<AttributeValue>) -> Result<Value, IndeterminateError> {
        let registry = FunctionRegistry::standard();
        let args: Vec<Value> = args.into_iter().map(Value::Single).collect();
        registry.get(id).unwrap().call(&args)
    }

    fn parse(dt: Datatype, s: &str) -> AttributeValue {
        AttributeValue::parse(&dt, s).unwrap()
    }

    #[test]
    fn regexp_is_unanchored() {
        let id = "urn:oasis:names:tc:xacml:1.0:function:string-regexp-match";
        let s = AttributeValue::string;
        assert_eq!(call(id, vec![s("ell"), s("hello")]).unwrap(), boolean(true));
        assert_eq!(call(id, vec![s("^ell$"), s("hello")]).unwrap(), boolean(false));
        let err = call(id, vec![s("(unclosed"), s("x")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn regexp_over_ip_address_text() {
        let id = "urn:oasis:names:tc:xacml:2.0:function:ipAddress-regexp-match";
        assert_eq!(
            call(
                id,
                vec![AttributeValue::string(r"^10\.0\."), parse(Datatype::IpAddress, "10.0.3.4")]
            )
            .unwrap(),
            boolean(true)
        );
    }

    #[test]
    fn x500_name_match_is_a_suffix_test() {
        let id = "urn:oasis:names:tc:xacml:1.0:function:x500Name-match";
        let suffix = parse(Datatype::X500Name, "O=Medico Corp,C=US");
        let name = parse(Datatype::X500Name, "cn=John Smith,o=Medico Corp, c=US");
        assert_eq!(call(id, vec![suffix.clone(), name.clone()]).unwrap(), boolean(true));
        assert_eq!(call(id, vec![name, suffix]).unwrap(), boolean(false));
    }

    #[test]
    fn rfc822_name_match_patterns() {
        let id = "urn:oasis:names:tc:xacml:1.0:function:rfc822Name-match";
        let anne = || parse(Datatype::Rfc822Name, "Anne.Smith@EAST.sun.com");
        for (pattern, expected) in [
            ("Anne.Smith@east.sun.com", true),
            ("anne.smith@east.sun.com", false),
            ("east.sun.com", true),
            ("sun.com", false),
            (".sun.com", true),
        ] {
            assert_eq!(
                call(id, vec![AttributeValue::string(pattern), anne()]).unwrap(),
                boolean(expected),
                "pattern {}",
                pattern
            );
        }
    }
}
