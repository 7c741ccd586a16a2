// datatype.rs - Datatype identifiers and the datatype registry.
//
// Standard XACML datatypes are enum variants so the function library can
// match on them. Extension datatypes are `Datatype::Custom(uri)` and get
// their parsing from a `DatatypeFactory` registered once at startup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::error::ValueError;
use crate::value::{AttributeValue, CustomValue};

/// A datatype, identified by its URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Datatype {
    String,
    Boolean,
    Integer,
    Double,
    Date,
    Time,
    DateTime,
    DayTimeDuration,
    YearMonthDuration,
    AnyUri,
    HexBinary,
    Base64Binary,
    Rfc822Name,
    X500Name,
    IpAddress,
    DnsName,
    /// Extension datatype registered through [`DatatypeFactory`].
    Custom(Arc<str>),
}

impl Datatype {
    /// Every standard datatype, in a stable order.
    pub const STANDARD: [Datatype; 16] = [
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
        Datatype::HexBinary,
        Datatype::Base64Binary,
        Datatype::Rfc822Name,
        Datatype::X500Name,
        Datatype::IpAddress,
        Datatype::DnsName,
    ];

    pub fn uri(&self) -> &str {
        match self {
            Datatype::String => "http://www.w3.org/2001/XMLSchema#string",
            Datatype::Boolean => "http://www.w3.org/2001/XMLSchema#boolean",
            Datatype::Integer => "http://www.w3.org/2001/XMLSchema#integer",
            Datatype::Double => "http://www.w3.org/2001/XMLSchema#double",
            Datatype::Date => "http://www.w3.org/2001/XMLSchema#date",
            Datatype::Time => "http://www.w3.org/2001/XMLSchema#time",
            Datatype::DateTime => "http://www.w3.org/2001/XMLSchema#dateTime",
            Datatype::DayTimeDuration => "http://www.w3.org/2001/XMLSchema#dayTimeDuration",
            Datatype::YearMonthDuration => "http://www.w3.org/2001/XMLSchema#yearMonthDuration",
            Datatype::AnyUri => "http://www.w3.org/2001/XMLSchema#anyURI",
            Datatype::HexBinary => "http://www.w3.org/2001/XMLSchema#hexBinary",
            Datatype::Base64Binary => "http://www.w3.org/2001/XMLSchema#base64Binary",
            Datatype::Rfc822Name => "urn:oasis:names:tc:xacml:1.0:data-type:rfc822Name",
            Datatype::X500Name => "urn:oasis:names:tc:xacml:1.0:data-type:x500Name",
            Datatype::IpAddress => "urn:oasis:names:tc:xacml:2.0:data-type:ipAddress",
            Datatype::DnsName => "urn:oasis:names:tc:xacml:2.0:data-type:dnsName",
            Datatype::Custom(uri) => uri,
        }
    }

    /// Look up a standard datatype by URI.
    pub fn from_standard_uri(uri: &str) -> Option<Datatype> {
        Datatype::STANDARD.into_iter().find(|dt| dt.uri() == uri)
    }

    /// The short name used to build function identifiers, e.g. "anyURI".
    pub fn short_name(&self) -> &str {
        match self {
            Datatype::String => "string",
            Datatype::Boolean => "boolean",
            Datatype::Integer => "integer",
            Datatype::Double => "double",
            Datatype::Date => "date",
            Datatype::Time => "time",
            Datatype::DateTime => "dateTime",
            Datatype::DayTimeDuration => "dayTimeDuration",
            Datatype::YearMonthDuration => "yearMonthDuration",
            Datatype::AnyUri => "anyURI",
            Datatype::HexBinary => "hexBinary",
            Datatype::Base64Binary => "base64Binary",
            Datatype::Rfc822Name => "rfc822Name",
            Datatype::X500Name => "x500Name",
            Datatype::IpAddress => "ipAddress",
            Datatype::DnsName => "dnsName",
            Datatype::Custom(uri) => uri.rsplit(['#', ':', '/']).next().unwrap_or(&**uri),
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl Serialize for Datatype {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.uri())
    }
}

/// Static type of an expression: a datatype, and whether it is a bag of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ValueType {
    pub datatype: Datatype,
    pub is_bag: bool,
}

impl ValueType {
    pub fn single(datatype: Datatype) -> Self {
        Self {
            datatype,
            is_bag: false,
        }
    }

    pub fn bag(datatype: Datatype) -> Self {
        Self {
            datatype,
            is_bag: true,
        }
    }

    pub fn boolean() -> Self {
        Self::single(Datatype::Boolean)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bag {
            write!(f, "bag<{}>", self.datatype)
        } else {
            write!(f, "{}", self.datatype)
        }
    }
}

/// Parsing contract for an extension datatype.
///
/// `canonicalize` must map equal values to the same string; equality of
/// custom values is equality of their canonical forms.
pub trait DatatypeFactory: Send + Sync {
    fn uri(&self) -> &str;
    fn canonicalize(&self, lexical: &str) -> Result<String, ValueError>;
}

/// Datatypes known to an engine, keyed by URI. Built once, read-only after.
#[derive(Clone, Default)]
pub struct DatatypeRegistry {
    custom: HashMap<String, Arc<dyn DatatypeFactory>>,
    standard_enabled: bool,
}

impl DatatypeRegistry {
    /// Registry with every standard datatype.
    pub fn standard() -> Self {
        Self {
            custom: HashMap::new(),
            standard_enabled: true,
        }
    }

    /// Registry with no datatypes at all; only registered extensions resolve.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: Arc<dyn DatatypeFactory>) -> Result<(), ValueError> {
        let uri = factory.uri().to_string();
        if self.standard_enabled && Datatype::from_standard_uri(&uri).is_some() {
            return Err(ValueError::syntax(
                "datatype",
                uri,
                "cannot override a standard datatype",
            ));
        }
        self.custom.insert(uri, factory);
        Ok(())
    }

    /// Resolve a datatype URI. Unknown URIs fail here, at build time.
    pub fn get(&self, uri: &str) -> Result<Datatype, ValueError> {
        if self.standard_enabled {
            if let Some(dt) = Datatype::from_standard_uri(uri) {
                return Ok(dt);
            }
        }
        if self.custom.contains_key(uri) {
            return Ok(Datatype::Custom(Arc::from(uri)));
        }
        Err(ValueError::UnknownDatatype(uri.to_string()))
    }

    /// Parse a lexical value of the datatype named by `uri`.
    pub fn parse(&self, uri: &str, lexical: &str) -> Result<AttributeValue, ValueError> {
        let datatype = self.get(uri)?;
        self.parse_as(&datatype, lexical)
    }

    pub fn parse_as(&self, datatype: &Datatype, lexical: &str) -> Result<AttributeValue, ValueError> {
        match datatype {
            Datatype::Custom(uri) => {
                let factory = self
                    .custom
                    .get(uri.as_ref())
                    .ok_or_else(|| ValueError::UnknownDatatype(uri.to_string()))?;
                Ok(AttributeValue::Custom(CustomValue {
                    datatype: datatype.clone(),
                    canonical: factory.canonicalize(lexical)?,
                }))
            }
            standard => AttributeValue::parse(standard, lexical),
        }
    }

    pub fn custom_uris(&self) -> impl Iterator<Item = &str> {
        self.custom.keys().map(String::as_str)
    }
}

impl fmt::Debug for DatatypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatatypeRegistry")
            .field("standard_enabled", &self.standard_enabled)
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperCaseCode;

    impl DatatypeFactory for UpperCaseCode {
        fn uri(&self) -> &str {
            "urn:example:datatype:code"
        }

        fn canonicalize(&self, lexical: &str) -> Result<String, ValueError> {
            if lexical.chars().all(|c| c.is_ascii_alphanumeric()) {
                Ok(lexical.to_ascii_uppercase())
            } else {
                Err(ValueError::syntax("code", lexical, "alphanumeric only"))
            }
        }
    }

    #[test]
    fn standard_uris_round_trip() {
        for dt in Datatype::STANDARD {
            assert_eq!(Datatype::from_standard_uri(dt.uri()), Some(dt.clone()));
        }
    }

    #[test]
    fn unknown_datatype_fails_at_lookup() {
        let registry = DatatypeRegistry::standard();
        let err = registry.get("urn:example:nope").unwrap_err();
        assert_eq!(err, ValueError::UnknownDatatype("urn:example:nope".into()));
    }

    #[test]
    fn custom_datatype_equality_uses_canonical_form() {
        let mut registry = DatatypeRegistry::standard();
        registry.register(Arc::new(UpperCaseCode)).unwrap();

        let a = registry.parse("urn:example:datatype:code", "ab12").unwrap();
        let b = registry.parse("urn:example:datatype:code", "AB12").unwrap();
        assert_eq!(a, b);
        assert!(registry.parse("urn:example:datatype:code", "a-b").is_err());
    }

    #[test]
    fn standard_datatype_cannot_be_overridden() {
        struct Shadow;
        impl DatatypeFactory for Shadow {
            fn uri(&self) -> &str {
                "http://www.w3.org/2001/XMLSchema#string"
            }
            fn canonicalize(&self, lexical: &str) -> Result<String, ValueError> {
                Ok(lexical.to_string())
            }
        }
        let mut registry = DatatypeRegistry::standard();
        assert!(registry.register(Arc::new(Shadow)).is_err());
    }

    #[test]
    fn value_type_display() {
        assert_eq!(ValueType::bag(Datatype::AnyUri).to_string(), "bag<anyURI>");
        assert_eq!(ValueType::single(Datatype::Integer).to_string(), "integer");
    }
}
