// bag.rs - Bags: unordered multisets of values of one datatype.

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::datatype::Datatype;
use crate::error::ValueError;
use crate::value::AttributeValue;

/// An unordered multiset of values sharing one datatype. Never nested.
///
/// Storage order is insertion order, but no operation here depends on it:
/// equality and the set operations treat the bag as unordered.
#[derive(Debug, Clone)]
pub struct Bag {
    datatype: Datatype,
    values: Vec<AttributeValue>,
}

impl Bag {
    pub fn empty(datatype: Datatype) -> Self {
        Self {
            datatype,
            values: Vec::new(),
        }
    }

    pub fn singleton(value: AttributeValue) -> Self {
        Self {
            datatype: value.datatype(),
            values: vec![value],
        }
    }

    /// Build a bag, rejecting values of any other datatype.
    pub fn new(datatype: Datatype, values: Vec<AttributeValue>) -> Result<Self, ValueError> {
        let mut bag = Self::empty(datatype);
        for value in values {
            bag.push(value)?;
        }
        Ok(bag)
    }

    pub fn push(&mut self, value: AttributeValue) -> Result<(), ValueError> {
        let found = value.datatype();
        if found != self.datatype {
            return Err(ValueError::MixedBag {
                expected: self.datatype.uri().to_string(),
                found: found.uri().to_string(),
            });
        }
        self.values.push(value);
        Ok(())
    }

    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AttributeValue> {
        self.values.iter()
    }

    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    /// The single member of a one-element bag.
    pub fn one_and_only(&self) -> Option<&AttributeValue> {
        match self.values.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Membership by datatype equality.
    pub fn contains(&self, value: &AttributeValue) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// The same bag with duplicates removed, keeping first occurrences.
    pub fn distinct(&self) -> Bag {
        let mut out = Bag::empty(self.datatype.clone());
        for v in &self.values {
            if !out.contains(v) {
                out.values.push(v.clone());
            }
        }
        out
    }

    /// Values present in both bags, without duplicates.
    pub fn intersection(&self, other: &Bag) -> Bag {
        let mut out = Bag::empty(self.datatype.clone());
        for v in &self.values {
            if other.contains(v) && !out.contains(v) {
                out.values.push(v.clone());
            }
        }
        out
    }

    /// Values present in either bag, without duplicates.
    pub fn union(&self, other: &Bag) -> Bag {
        let mut out = self.distinct();
        for v in &other.values {
            if !out.contains(v) {
                out.values.push(v.clone());
            }
        }
        out
    }

    pub fn at_least_one_member_of(&self, other: &Bag) -> bool {
        self.values.iter().any(|v| other.contains(v))
    }

    /// Every value of `self` is in `other` (set semantics).
    pub fn is_subset_of(&self, other: &Bag) -> bool {
        self.values.iter().all(|v| other.contains(v))
    }

    pub fn set_equals(&self, other: &Bag) -> bool {
        self.is_subset_of(other) && other.is_subset_of(self)
    }
}

/// Multiset equality: same datatype and the same members with the same
/// multiplicities, in any order.
impl PartialEq for Bag {
    fn eq(&self, other: &Self) -> bool {
        if self.datatype != other.datatype || self.values.len() != other.values.len() {
            return false;
        }
        let mut remaining: Vec<&AttributeValue> = other.values.iter().collect();
        for v in &self.values {
            match remaining.iter().position(|o| *o == v) {
                Some(i) => {
                    remaining.swap_remove(i);
                }
                None => return false,
            }
        }
        true
    }
}

impl<'a> IntoIterator for &'a Bag {
    type Item = &'a AttributeValue;
    type IntoIter = std::slice::Iter<'a, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl fmt::Display for Bag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", v)?;
        }
        f.write_str("}")
    }
}

impl Serialize for Bag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let lexical: Vec<String> = self.values.iter().map(ToString::to_string).collect();
        let mut state = serializer.serialize_struct("Bag", 2)?;
        state.serialize_field("datatype", &self.datatype)?;
        state.serialize_field("values", &lexical)?;
        state.end()
    }
}
