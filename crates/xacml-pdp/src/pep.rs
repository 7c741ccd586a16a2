// pep.rs - Obligations and advice.
//
// Policies and rules carry *expressions* (ObligationExpression /
// AdviceExpression); evaluating the ones whose FulfillOn/AppliesTo equals
// the decision yields concrete `PepAction`s for the PEP. Combining
// algorithms decide which children's actions survive into the final result.

use serde::Serialize;
use xacml_model::{AttributeValue, IndeterminateError, Value};

use crate::context::EvaluationContext;
use crate::decision::Effect;
use crate::error::BuildError;
use crate::expression::{Expression, VariableReference};

/// One evaluated attribute assignment handed to the PEP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeAssignment {
    pub attribute_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    pub value: AttributeValue,
}

/// An obligation or advice with its evaluated assignments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PepAction {
    pub id: String,
    pub assignments: Vec<AttributeAssignment>,
}

/// Obligations and advice attached to a decision, in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PepActions {
    obligations: Vec<PepAction>,
    advice: Vec<PepAction>,
}

impl PepActions {
    pub fn new(obligations: Vec<PepAction>, advice: Vec<PepAction>) -> Self {
        Self { obligations, advice }
    }

    pub fn obligations(&self) -> &[PepAction] {
        &self.obligations
    }

    pub fn advice(&self) -> &[PepAction] {
        &self.advice
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty() && self.advice.is_empty()
    }

    pub fn append(&mut self, mut other: PepActions) {
        self.obligations.append(&mut other.obligations);
        self.advice.append(&mut other.advice);
    }
}

/// AttributeAssignmentExpression: an expression whose value (or each bag
/// member) becomes one assignment.
#[derive(Debug, Clone)]
pub struct AttributeAssignmentExpression {
    attribute_id: String,
    category: Option<String>,
    issuer: Option<String>,
    expression: Expression,
}

impl AttributeAssignmentExpression {
    pub fn new(attribute_id: impl Into<String>, expression: Expression) -> Result<Self, BuildError> {
        let attribute_id = attribute_id.into();
        if expression.return_type().is_none() {
            return Err(BuildError::invalid_arguments(
                &attribute_id,
                "a function reference cannot be assigned to an attribute",
            ));
        }
        Ok(Self {
            attribute_id,
            category: None,
            issuer: None,
            expression,
        })
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<Vec<AttributeAssignment>, IndeterminateError> {
        let assignment = |value: AttributeValue| AttributeAssignment {
            attribute_id: self.attribute_id.clone(),
            category: self.category.clone(),
            issuer: self.issuer.clone(),
            value,
        };
        let assignments = match self.expression.evaluate(ctx)? {
            Value::Single(v) => vec![assignment(v)],
            Value::Bag(bag) => bag.iter().cloned().map(assignment).collect(),
        };
        Ok(assignments)
    }
}

/// An ObligationExpression or AdviceExpression.
#[derive(Debug, Clone)]
pub struct PepActionExpression {
    id: String,
    applies_to: Effect,
    assignments: Vec<AttributeAssignmentExpression>,
}

impl PepActionExpression {
    pub fn new(id: impl Into<String>, applies_to: Effect) -> Self {
        Self {
            id: id.into(),
            applies_to,
            assignments: Vec::new(),
        }
    }

    pub fn assignment(mut self, assignment: AttributeAssignmentExpression) -> Self {
        self.assignments.push(assignment);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn applies_to(&self) -> Effect {
        self.applies_to
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<PepAction, IndeterminateError> {
        let mut assignments = Vec::new();
        for expr in &self.assignments {
            let values = expr
                .evaluate(ctx)
                .map_err(|e| e.context(format_args!("obligation/advice '{}'", self.id)))?;
            assignments.extend(values);
        }
        Ok(PepAction {
            id: self.id.clone(),
            assignments,
        })
    }
}

/// The obligation and advice expressions of one rule, policy or policy set.
#[derive(Debug, Clone, Default)]
pub struct PepActionExpressions {
    obligations: Vec<PepActionExpression>,
    advice: Vec<PepActionExpression>,
}

impl PepActionExpressions {
    pub fn push_obligation(&mut self, obligation: PepActionExpression) {
        self.obligations.push(obligation);
    }

    pub fn push_advice(&mut self, advice: PepActionExpression) {
        self.advice.push(advice);
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty() && self.advice.is_empty()
    }

    /// Evaluate the expressions that apply to `effect`. Any failing
    /// assignment fails the whole set.
    pub fn evaluate(
        &self,
        effect: Effect,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<PepActions, IndeterminateError> {
        let mut actions = PepActions::default();
        for obligation in self.obligations.iter().filter(|o| o.applies_to == effect) {
            actions.obligations.push(obligation.evaluate(ctx)?);
        }
        for advice in self.advice.iter().filter(|a| a.applies_to == effect) {
            actions.advice.push(advice.evaluate(ctx)?);
        }
        Ok(actions)
    }

    pub(crate) fn variable_references<'a>(&'a self, out: &mut Vec<&'a VariableReference>) {
        for action in self.obligations.iter().chain(&self.advice) {
            for assignment in &action.assignments {
                assignment.expression.variable_references(out);
            }
        }
    }
}
