// target.rs - Match, AllOf, AnyOf and Target.
//
// Each level evaluates to `Ok(true)` (Match), `Ok(false)` (NoMatch) or
// `Err(_)` (Indeterminate).
//
// - AllOf: NoMatch decides immediately, then Indeterminate, then Match.
// - AnyOf: Match decides immediately, then Indeterminate, then NoMatch.
// - Target: AND over AnyOfs; an empty Target always matches.

use std::sync::Arc;

use serde::{Serialize, Serializer};
use xacml_model::{AttributeValue, IndeterminateError, Value, ValueType};

use crate::context::EvaluationContext;
use crate::error::BuildError;
use crate::expression::Expression;
use crate::functions::Function;

fn serialize_function<S: Serializer>(function: &Arc<dyn Function>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(function.id())
}

/// Compares a literal against every value an attribute designator or
/// selector resolves to.
#[derive(Debug, Clone, Serialize)]
pub struct Match {
    #[serde(serialize_with = "serialize_function")]
    function: Arc<dyn Function>,
    value: AttributeValue,
    source: Expression,
}

impl Match {
    /// `function` is called as `function(value, member)` and must return a
    /// single boolean; `source` must be a designator or selector.
    pub fn new(function: Arc<dyn Function>, value: AttributeValue, source: Expression) -> Result<Self, BuildError> {
        let member_type = match &source {
            Expression::Designator(d) => d.datatype().clone(),
            Expression::Selector(s) => s.datatype().clone(),
            _ => {
                return Err(BuildError::invalid_arguments(
                    function.id(),
                    "a Match must read an attribute designator or selector",
                ))
            }
        };
        let returns = function.check_types(&[
            ValueType::single(value.datatype()),
            ValueType::single(member_type),
        ])?;
        if returns != ValueType::boolean() {
            return Err(BuildError::NotBoolean {
                context: format!("match function {}", function.id()),
                found: returns.to_string(),
            });
        }
        Ok(Self {
            function,
            value,
            source,
        })
    }

    pub fn function(&self) -> &Arc<dyn Function> {
        &self.function
    }

    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    pub fn source(&self) -> &Expression {
        &self.source
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, IndeterminateError> {
        let bag = match &self.source {
            Expression::Designator(d) => d.evaluate(ctx)?,
            Expression::Selector(s) => s.evaluate(ctx)?,
            other => other.evaluate(ctx)?.as_bag().cloned().ok_or_else(|| {
                IndeterminateError::type_mismatch("a Match source must evaluate to a bag")
            })?,
        };
        let literal = Value::Single(self.value.clone());
        let mut first_error = None;
        for member in &bag {
            let outcome = self
                .function
                .call(&[literal.clone(), Value::Single(member.clone())])
                .and_then(|v| {
                    v.as_bool()
                        .ok_or_else(|| IndeterminateError::type_mismatch("match function returned a non-boolean"))
                });
            match outcome {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => {
                    first_error.get_or_insert(e.context(self.function.id()));
                }
            }
        }
        first_error.map_or(Ok(false), Err)
    }
}

/// Conjunction of Matches.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AllOf {
    matches: Vec<Match>,
}

impl AllOf {
    pub fn new(matches: Vec<Match>) -> Self {
        Self { matches }
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, IndeterminateError> {
        let mut first_error = None;
        for m in &self.matches {
            match m.evaluate(ctx) {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(true), Err)
    }
}

/// Disjunction of AllOfs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnyOf {
    all_of: Vec<AllOf>,
}

impl AnyOf {
    pub fn new(all_of: Vec<AllOf>) -> Self {
        Self { all_of }
    }

    pub fn all_of(&self) -> &[AllOf] {
        &self.all_of
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, IndeterminateError> {
        let mut first_error = None;
        for all_of in &self.all_of {
            match all_of.evaluate(ctx) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(false), Err)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Target {
    any_of: Vec<AnyOf>,
}

impl Target {
    pub fn new(any_of: Vec<AnyOf>) -> Self {
        Self { any_of }
    }

    /// A target with a single Match.
    pub fn single(m: Match) -> Self {
        Self::new(vec![AnyOf::new(vec![AllOf::new(vec![m])])])
    }

    pub fn any_of(&self) -> &[AnyOf] {
        &self.any_of
    }

    pub fn is_empty(&self) -> bool {
        self.any_of.is_empty()
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, IndeterminateError> {
        let mut first_error = None;
        for any_of in &self.any_of {
            match any_of.evaluate(ctx) {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(true), Err)
    }
}
