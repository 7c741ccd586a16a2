// expression.rs - The expression tree and its evaluator.
//
// Expressions are immutable once built and shared across evaluations. Every
// node knows its static type at build time, so a malformed Apply never
// reaches evaluation.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use xacml_model::{
    AttributeValue, Bag, Datatype, IndeterminateError, MissingAttributeDetail, Value, ValueType,
};

use crate::context::{AttributeFqn, EvaluationContext};
use crate::error::BuildError;
use crate::functions::Function;

fn serialize_function<S: Serializer>(function: &Arc<dyn Function>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(function.id())
}

/// Looks an attribute up by name in the request context.
#[derive(Debug, Clone, Serialize)]
pub struct AttributeDesignator {
    #[serde(flatten)]
    fqn: AttributeFqn,
    datatype: Datatype,
    must_be_present: bool,
}

impl AttributeDesignator {
    pub fn new(
        category: impl Into<String>,
        attribute_id: impl Into<String>,
        datatype: Datatype,
        must_be_present: bool,
    ) -> Self {
        Self {
            fqn: AttributeFqn::new(category, attribute_id),
            datatype,
            must_be_present,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.fqn.issuer = Some(issuer.into());
        self
    }

    pub fn fqn(&self) -> &AttributeFqn {
        &self.fqn
    }

    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    pub fn must_be_present(&self) -> bool {
        self.must_be_present
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<Bag, IndeterminateError> {
        let bag = ctx.attribute_bag(&self.fqn, &self.datatype)?;
        if bag.is_empty() && self.must_be_present {
            return Err(IndeterminateError::missing_attribute(MissingAttributeDetail {
                category: self.fqn.category.clone(),
                attribute_id: self.fqn.id.clone(),
                datatype: self.datatype.uri().to_string(),
                issuer: self.fqn.issuer.clone(),
            }));
        }
        Ok(bag)
    }
}

/// Selects values from a category's content with an XPath expression.
#[derive(Debug, Clone, Serialize)]
pub struct AttributeSelector {
    category: String,
    path: String,
    datatype: Datatype,
    must_be_present: bool,
}

impl AttributeSelector {
    pub fn new(
        category: impl Into<String>,
        path: impl Into<String>,
        datatype: Datatype,
        must_be_present: bool,
    ) -> Self {
        Self {
            category: category.into(),
            path: path.into(),
            datatype,
            must_be_present,
        }
    }

    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<Bag, IndeterminateError> {
        if !ctx.config().enable_xpath {
            return Err(IndeterminateError::feature_disabled("AttributeSelector"));
        }
        let bag = ctx.select(&self.category, &self.path, &self.datatype)?;
        if bag.is_empty() && self.must_be_present {
            return Err(IndeterminateError::missing_attribute(MissingAttributeDetail {
                category: self.category.clone(),
                attribute_id: self.path.clone(),
                datatype: self.datatype.uri().to_string(),
                issuer: None,
            }));
        }
        Ok(bag)
    }
}

/// Function application. Arguments are type-checked against the function
/// when the node is built.
#[derive(Debug, Clone, Serialize)]
pub struct Apply {
    #[serde(serialize_with = "serialize_function")]
    function: Arc<dyn Function>,
    args: Vec<Expression>,
    #[serde(skip)]
    return_type: ValueType,
}

impl Apply {
    pub fn new(function: Arc<dyn Function>, args: Vec<Expression>) -> Result<Self, BuildError> {
        let return_type = function.check(&args)?;
        Ok(Self {
            function,
            args,
            return_type,
        })
    }

    pub fn function(&self) -> &Arc<dyn Function> {
        &self.function
    }

    pub fn args(&self) -> &[Expression] {
        &self.args
    }
}

/// Reference to a VariableDefinition of the enclosing policy. The declared
/// type is checked against the definition when the policy is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableReference {
    id: String,
    value_type: ValueType,
}

impl VariableReference {
    pub fn new(id: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            id: id.into(),
            value_type,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Value(AttributeValue),
    Designator(AttributeDesignator),
    Selector(AttributeSelector),
    Apply(Apply),
    Variable(VariableReference),
    /// A function passed as an argument to a higher-order function.
    Function(#[serde(serialize_with = "serialize_function")] Arc<dyn Function>),
}

impl Expression {
    pub fn apply(function: Arc<dyn Function>, args: Vec<Expression>) -> Result<Self, BuildError> {
        Ok(Expression::Apply(Apply::new(function, args)?))
    }

    pub fn variable(id: impl Into<String>, value_type: ValueType) -> Self {
        Expression::Variable(VariableReference::new(id, value_type))
    }

    /// Static type of the node; `None` for a bare function reference.
    pub fn return_type(&self) -> Option<ValueType> {
        match self {
            Expression::Value(v) => Some(ValueType::single(v.datatype())),
            Expression::Designator(d) => Some(ValueType::bag(d.datatype.clone())),
            Expression::Selector(s) => Some(ValueType::bag(s.datatype.clone())),
            Expression::Apply(a) => Some(a.return_type.clone()),
            Expression::Variable(v) => Some(v.value_type.clone()),
            Expression::Function(_) => None,
        }
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<Value, IndeterminateError> {
        match self {
            Expression::Value(v) => Ok(Value::Single(v.clone())),
            Expression::Designator(d) => d.evaluate(ctx).map(Value::Bag),
            Expression::Selector(s) => s.evaluate(ctx).map(Value::Bag),
            Expression::Apply(a) => a.function.evaluate(&a.args, ctx),
            Expression::Variable(v) => ctx.variable_value(&v.id),
            Expression::Function(f) => Err(IndeterminateError::processing(format!(
                "function '{}' cannot be evaluated as a value",
                f.id()
            ))),
        }
    }

    /// Evaluate and require a single boolean.
    pub fn evaluate_boolean(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, IndeterminateError> {
        let value = self.evaluate(ctx)?;
        value.as_bool().ok_or_else(|| {
            IndeterminateError::type_mismatch(format!("expected a boolean, found {}", value.value_type()))
        })
    }

    /// Collect every VariableReference in this tree.
    pub fn variable_references<'a>(&'a self, out: &mut Vec<&'a VariableReference>) {
        match self {
            Expression::Variable(v) => out.push(v),
            Expression::Apply(a) => {
                for arg in &a.args {
                    arg.variable_references(out);
                }
            }
            _ => {}
        }
    }
}

impl From<AttributeValue> for Expression {
    fn from(value: AttributeValue) -> Self {
        Expression::Value(value)
    }
}

impl From<AttributeDesignator> for Expression {
    fn from(designator: AttributeDesignator) -> Self {
        Expression::Designator(designator)
    }
}

impl From<AttributeSelector> for Expression {
    fn from(selector: AttributeSelector) -> Self {
        Expression::Selector(selector)
    }
}

#[derive(Debug, Clone)]
pub struct VariableDefinition {
    id: String,
    expression: Expression,
}

impl VariableDefinition {
    pub fn new(id: impl Into<String>, expression: Expression) -> Result<Self, BuildError> {
        let id = id.into();
        if expression.return_type().is_none() {
            return Err(BuildError::invalid_arguments(
                &id,
                "a variable cannot be bound to a bare function",
            ));
        }
        Ok(Self { id, expression })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn value_type(&self) -> Option<ValueType> {
        self.expression.return_type()
    }
}

/// The VariableDefinitions of one policy, by id.
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    definitions: HashMap<String, VariableDefinition>,
}

impl VariableTable {
    pub fn insert(&mut self, definition: VariableDefinition) -> Result<(), BuildError> {
        if self.definitions.contains_key(definition.id()) {
            return Err(BuildError::DuplicateVariable(definition.id().to_string()));
        }
        self.definitions.insert(definition.id().to_string(), definition);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&VariableDefinition> {
        self.definitions.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableDefinition> {
        self.definitions.values()
    }

    /// Every reference must name a definition and declare its type.
    pub fn validate_reference(&self, reference: &VariableReference) -> Result<(), BuildError> {
        let definition = self
            .get(reference.id())
            .ok_or_else(|| BuildError::UnknownVariable(reference.id().to_string()))?;
        let actual = definition.value_type();
        if actual.as_ref() != Some(reference.value_type()) {
            return Err(BuildError::VariableTypeMismatch {
                id: reference.id().to_string(),
                expected: reference.value_type().to_string(),
                actual: actual.map(|t| t.to_string()).unwrap_or_default(),
            });
        }
        Ok(())
    }
}
