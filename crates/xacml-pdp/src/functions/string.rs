// string.rs - String normalization, concatenation and search functions.

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use xacml_model::{AttributeValue, Datatype, IndeterminateError, Value};

use super::{boolean, int_arg, one, str_arg, FirstOrderFunction, FunctionRegistry, XACML1, XACML2, XACML3};

/// XML whitespace only; U+00A0 and other Unicode spaces are kept.
const XML_WHITESPACE: [char; 4] = [' ', '\t', '\r', '\n'];

fn string(s: String) -> Value {
    Value::Single(AttributeValue::String(s))
}

/// Characters `[begin, end)` of `s`; `end == -1` means to the end.
fn substring(s: &str, begin: &BigInt, end: &BigInt) -> Result<String, IndeterminateError> {
    let len = s.chars().count();
    let out_of_range = || {
        IndeterminateError::processing(format!(
            "substring [{}, {}) is out of range for a string of length {}",
            begin, end, len
        ))
    };
    let begin = begin.to_usize().ok_or_else(out_of_range)?;
    let end = if *end == BigInt::from(-1) {
        len
    } else {
        end.to_usize().ok_or_else(out_of_range)?
    };
    if begin > end || end > len {
        return Err(out_of_range());
    }
    Ok(s.chars().skip(begin).take(end - begin).collect())
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    let str_t = || one(Datatype::String);

    registry.add(FirstOrderFunction::new(
        format!("{}string-normalize-space", XACML1),
        vec![str_t()],
        str_t(),
        |args| Ok(string(str_arg(args, 0)?.trim_matches(&XML_WHITESPACE[..]).to_string())),
    ));
    registry.add(FirstOrderFunction::new(
        format!("{}string-normalize-to-lower-case", XACML1),
        vec![str_t()],
        str_t(),
        |args| Ok(string(str_arg(args, 0)?.to_lowercase())),
    ));
    registry.add(FirstOrderFunction::variadic(
        format!("{}string-concatenate", XACML2),
        vec![],
        str_t(),
        2,
        str_t(),
        |args| {
            let mut out = String::new();
            for i in 0..args.len() {
                out.push_str(str_arg(args, i)?);
            }
            Ok(string(out))
        },
    ));

    // (needle, haystack) predicates over string and anyURI haystacks.
    let searches: [(&str, fn(&str, &str) -> bool); 3] = [
        ("starts-with", |needle, s| s.starts_with(needle)),
        ("ends-with", |needle, s| s.ends_with(needle)),
        ("contains", |needle, s| s.contains(needle)),
    ];
    for (haystack, name) in [(Datatype::String, "string"), (Datatype::AnyUri, "anyURI")] {
        for (op, predicate) in searches {
            registry.add(FirstOrderFunction::new(
                format!("{}{}-{}", XACML3, name, op),
                vec![str_t(), one(haystack.clone())],
                one(Datatype::Boolean),
                move |args| Ok(boolean(predicate(str_arg(args, 0)?, str_arg(args, 1)?))),
            ));
        }
        registry.add(FirstOrderFunction::new(
            format!("{}{}-substring", XACML3, name),
            vec![one(haystack), one(Datatype::Integer), one(Datatype::Integer)],
            str_t(),
            |args| {
                substring(str_arg(args, 0)?, int_arg(args, 1)?, int_arg(args, 2)?).map(string)
            },
        ));
    }
}
