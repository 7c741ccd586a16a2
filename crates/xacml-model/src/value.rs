// value.rs - Typed attribute values.
//
// `AttributeValue` is a single typed value; `Value` is what an expression
// produces: one value, or a bag of values of one datatype. Equality and
// ordering are datatype-specific and never cross datatypes.

use std::cmp::Ordering;
use std::fmt;

use base64::Engine as _;
use num_bigint::BigInt;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::bag::Bag;
use crate::datatype::{Datatype, ValueType};
use crate::error::ValueError;
use crate::names::{Rfc822Name, X500Name};
use crate::network::{DnsNameValue, IpAddressValue};
use crate::temporal::{DayTimeDuration, XsDate, XsDateTime, XsTime, YearMonthDuration};

/// A value of an extension datatype, held in its canonical lexical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomValue {
    pub datatype: Datatype,
    pub canonical: String,
}

#[derive(Debug, Clone)]
pub enum AttributeValue {
    String(String),
    Boolean(bool),
    /// xs:integer, unbounded.
    Integer(BigInt),
    Double(f64),
    Date(XsDate),
    Time(XsTime),
    DateTime(XsDateTime),
    DayTimeDuration(DayTimeDuration),
    YearMonthDuration(YearMonthDuration),
    AnyUri(String),
    HexBinary(Vec<u8>),
    Base64Binary(Vec<u8>),
    Rfc822Name(Rfc822Name),
    X500Name(X500Name),
    IpAddress(IpAddressValue),
    DnsName(DnsNameValue),
    Custom(CustomValue),
}

impl AttributeValue {
    pub fn string(s: impl Into<String>) -> Self {
        AttributeValue::String(s.into())
    }

    pub fn any_uri(s: impl Into<String>) -> Self {
        AttributeValue::AnyUri(s.into())
    }

    pub fn integer(i: impl Into<BigInt>) -> Self {
        AttributeValue::Integer(i.into())
    }

    pub fn datatype(&self) -> Datatype {
        match self {
            AttributeValue::String(_) => Datatype::String,
            AttributeValue::Boolean(_) => Datatype::Boolean,
            AttributeValue::Integer(_) => Datatype::Integer,
            AttributeValue::Double(_) => Datatype::Double,
            AttributeValue::Date(_) => Datatype::Date,
            AttributeValue::Time(_) => Datatype::Time,
            AttributeValue::DateTime(_) => Datatype::DateTime,
            AttributeValue::DayTimeDuration(_) => Datatype::DayTimeDuration,
            AttributeValue::YearMonthDuration(_) => Datatype::YearMonthDuration,
            AttributeValue::AnyUri(_) => Datatype::AnyUri,
            AttributeValue::HexBinary(_) => Datatype::HexBinary,
            AttributeValue::Base64Binary(_) => Datatype::Base64Binary,
            AttributeValue::Rfc822Name(_) => Datatype::Rfc822Name,
            AttributeValue::X500Name(_) => Datatype::X500Name,
            AttributeValue::IpAddress(_) => Datatype::IpAddress,
            AttributeValue::DnsName(_) => Datatype::DnsName,
            AttributeValue::Custom(c) => c.datatype.clone(),
        }
    }

    /// Parse the lexical form of a standard datatype. Custom datatypes go
    /// through [`crate::DatatypeRegistry::parse_as`], which knows their factory.
    pub fn parse(datatype: &Datatype, lexical: &str) -> Result<Self, ValueError> {
        let collapsed = lexical.trim();
        let value = match datatype {
            Datatype::String => AttributeValue::String(lexical.to_string()),
            Datatype::Boolean => AttributeValue::Boolean(match collapsed {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(ValueError::syntax("boolean", lexical, "expected true or false")),
            }),
            Datatype::Integer => AttributeValue::Integer(parse_integer(lexical, collapsed)?),
            Datatype::Double => AttributeValue::Double(parse_double(lexical, collapsed)?),
            Datatype::Date => AttributeValue::Date(XsDate::parse(collapsed)?),
            Datatype::Time => AttributeValue::Time(XsTime::parse(collapsed)?),
            Datatype::DateTime => AttributeValue::DateTime(XsDateTime::parse(collapsed)?),
            Datatype::DayTimeDuration => {
                AttributeValue::DayTimeDuration(DayTimeDuration::parse(collapsed)?)
            }
            Datatype::YearMonthDuration => {
                AttributeValue::YearMonthDuration(YearMonthDuration::parse(collapsed)?)
            }
            Datatype::AnyUri => {
                if collapsed.chars().any(char::is_whitespace) {
                    return Err(ValueError::syntax("anyURI", lexical, "contains whitespace"));
                }
                AttributeValue::AnyUri(collapsed.to_string())
            }
            Datatype::HexBinary => AttributeValue::HexBinary(
                hex::decode(collapsed)
                    .map_err(|e| ValueError::syntax("hexBinary", lexical, e.to_string()))?,
            ),
            Datatype::Base64Binary => {
                let compact: String = collapsed.chars().filter(|c| !c.is_whitespace()).collect();
                AttributeValue::Base64Binary(
                    base64::engine::general_purpose::STANDARD
                        .decode(compact)
                        .map_err(|e| ValueError::syntax("base64Binary", lexical, e.to_string()))?,
                )
            }
            Datatype::Rfc822Name => AttributeValue::Rfc822Name(Rfc822Name::parse(collapsed)?),
            Datatype::X500Name => AttributeValue::X500Name(X500Name::parse(collapsed)?),
            Datatype::IpAddress => AttributeValue::IpAddress(IpAddressValue::parse(collapsed)?),
            Datatype::DnsName => AttributeValue::DnsName(DnsNameValue::parse(collapsed)?),
            Datatype::Custom(uri) => return Err(ValueError::UnknownDatatype(uri.to_string())),
        };
        Ok(value)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            AttributeValue::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            AttributeValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// String content of string-like values (string and anyURI).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) | AttributeValue::AnyUri(s) => Some(s),
            _ => None,
        }
    }

    /// Total order within the datatypes that have one. `None` when the
    /// datatypes differ, the datatype is unordered, or a double is NaN.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (AttributeValue::String(a), AttributeValue::String(b)) => Some(a.cmp(b)),
            (AttributeValue::Integer(a), AttributeValue::Integer(b)) => Some(a.cmp(b)),
            (AttributeValue::Double(a), AttributeValue::Double(b)) => a.partial_cmp(b),
            (AttributeValue::Date(a), AttributeValue::Date(b)) => a.partial_cmp(b),
            (AttributeValue::Time(a), AttributeValue::Time(b)) => a.partial_cmp(b),
            (AttributeValue::DateTime(a), AttributeValue::DateTime(b)) => a.partial_cmp(b),
            (AttributeValue::DayTimeDuration(a), AttributeValue::DayTimeDuration(b)) => {
                Some(a.cmp(b))
            }
            (AttributeValue::YearMonthDuration(a), AttributeValue::YearMonthDuration(b)) => {
                Some(a.cmp(b))
            }
            _ => None,
        }
    }
}

/// Optional sign then decimal digits; BigInt's own parser also takes `_`.
fn parse_integer(lexical: &str, collapsed: &str) -> Result<BigInt, ValueError> {
    let digits = collapsed.strip_prefix(&['+', '-'][..]).unwrap_or(collapsed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValueError::syntax("integer", lexical, "expected decimal digits"));
    }
    collapsed
        .parse::<BigInt>()
        .map_err(|e| ValueError::syntax("integer", lexical, e.to_string()))
}

fn parse_double(lexical: &str, collapsed: &str) -> Result<f64, ValueError> {
    match collapsed {
        "INF" | "+INF" => return Ok(f64::INFINITY),
        "-INF" => return Ok(f64::NEG_INFINITY),
        "NaN" => return Ok(f64::NAN),
        _ => {}
    }
    // Rust also accepts "inf" and "infinity", which xs:double does not.
    if collapsed
        .chars()
        .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
    {
        return Err(ValueError::syntax("double", lexical, "not a number"));
    }
    collapsed
        .parse::<f64>()
        .map_err(|e| ValueError::syntax("double", lexical, e.to_string()))
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        use AttributeValue::*;
        match (self, other) {
            (String(a), String(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Double(a), Double(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (Time(a), Time(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (DayTimeDuration(a), DayTimeDuration(b)) => a == b,
            (YearMonthDuration(a), YearMonthDuration(b)) => a == b,
            (AnyUri(a), AnyUri(b)) => a == b,
            (HexBinary(a), HexBinary(b)) => a == b,
            (Base64Binary(a), Base64Binary(b)) => a == b,
            (Rfc822Name(a), Rfc822Name(b)) => a == b,
            (X500Name(a), X500Name(b)) => a == b,
            (IpAddress(a), IpAddress(b)) => a == b,
            (DnsName(a), DnsName(b)) => a == b,
            (Custom(a), Custom(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) | AttributeValue::AnyUri(s) => f.write_str(s),
            AttributeValue::Boolean(b) => write!(f, "{}", b),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Double(d) => {
                if d.is_nan() {
                    f.write_str("NaN")
                } else if d.is_infinite() {
                    f.write_str(if *d > 0.0 { "INF" } else { "-INF" })
                } else {
                    write!(f, "{}", d)
                }
            }
            AttributeValue::Date(v) => write!(f, "{}", v),
            AttributeValue::Time(v) => write!(f, "{}", v),
            AttributeValue::DateTime(v) => write!(f, "{}", v),
            AttributeValue::DayTimeDuration(v) => write!(f, "{}", v),
            AttributeValue::YearMonthDuration(v) => write!(f, "{}", v),
            AttributeValue::HexBinary(bytes) => f.write_str(&hex::encode_upper(bytes)),
            AttributeValue::Base64Binary(bytes) => {
                f.write_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            AttributeValue::Rfc822Name(v) => write!(f, "{}", v),
            AttributeValue::X500Name(v) => write!(f, "{}", v),
            AttributeValue::IpAddress(v) => write!(f, "{}", v),
            AttributeValue::DnsName(v) => write!(f, "{}", v),
            AttributeValue::Custom(c) => f.write_str(&c.canonical),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AttributeValue", 2)?;
        state.serialize_field("datatype", &self.datatype())?;
        state.serialize_field("value", &self.to_string())?;
        state.end()
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Boolean(b)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Integer(i.into())
    }
}

impl From<BigInt> for AttributeValue {
    fn from(i: BigInt) -> Self {
        AttributeValue::Integer(i)
    }
}

impl From<f64> for AttributeValue {
    fn from(d: f64) -> Self {
        AttributeValue::Double(d)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Single(AttributeValue),
    Bag(Bag),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Single(v) => ValueType::single(v.datatype()),
            Value::Bag(b) => ValueType::bag(b.datatype().clone()),
        }
    }

    pub fn as_single(&self) -> Option<&AttributeValue> {
        match self {
            Value::Single(v) => Some(v),
            Value::Bag(_) => None,
        }
    }

    pub fn as_bag(&self) -> Option<&Bag> {
        match self {
            Value::Bag(b) => Some(b),
            Value::Single(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_single().and_then(AttributeValue::as_bool)
    }
}

impl From<AttributeValue> for Value {
    fn from(v: AttributeValue) -> Self {
        Value::Single(v)
    }
}

impl From<Bag> for Value {
    fn from(b: Bag) -> Self {
        Value::Bag(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Single(v) => write!(f, "{}", v),
            Value::Bag(b) => write!(f, "{}", b),
        }
    }
}
