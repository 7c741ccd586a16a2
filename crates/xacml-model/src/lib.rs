//! # xacml-model
//!
//! Typed values for the XACML policy decision point.
//!
//! Datatypes, attribute values, bags, and the error types shared by the
//! evaluator: `ValueError` for build-time value problems and
//! `IndeterminateError` for evaluation-time failures.

pub mod bag;
pub mod datatype;
pub mod error;
pub mod names;
pub mod network;
pub mod temporal;
pub mod value;

pub use bag::Bag;
pub use datatype::{Datatype, DatatypeFactory, DatatypeRegistry, ValueType};
pub use error::{ErrorKind, IndeterminateError, MissingAttributeDetail, StatusCode, ValueError};
pub use names::{Rfc822Name, X500Name};
pub use network::{DnsNameValue, IpAddressValue, PortRange};
pub use temporal::{DayTimeDuration, XsDate, XsDateTime, XsTime, YearMonthDuration};
pub use value::{AttributeValue, CustomValue, Value};
pub use num_bigint::BigInt;
