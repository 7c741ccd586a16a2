// context.rs - The request and the per-request evaluation context.
//
// A `Request` is the decision request as handed over by an adapter: named
// attribute values per category plus optional per-category content for
// AttributeSelectors. An `EvaluationContext` wraps one request for the
// duration of one evaluation and memoizes everything it resolves. It is
// never shared between evaluations or threads.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Offset, Utc};
use serde::Serialize;
use uuid::Uuid;
use xacml_model::{
    AttributeValue, Bag, Datatype, DatatypeRegistry, IndeterminateError, Value, XsDate,
    XsDateTime, XsTime,
};

use crate::config::{PdpConfig, StandardEnvAttributeSource};
use crate::expression::VariableTable;

/// Standard attribute category identifiers.
pub mod category {
    pub const ACCESS_SUBJECT: &str = "urn:oasis:names:tc:xacml:1.0:subject-category:access-subject";
    pub const RESOURCE: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:resource";
    pub const ACTION: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:action";
    pub const ENVIRONMENT: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:environment";
}

/// Standard attribute identifiers.
pub mod attribute_id {
    pub const SUBJECT_ID: &str = "urn:oasis:names:tc:xacml:1.0:subject:subject-id";
    pub const RESOURCE_ID: &str = "urn:oasis:names:tc:xacml:1.0:resource:resource-id";
    pub const ACTION_ID: &str = "urn:oasis:names:tc:xacml:1.0:action:action-id";
    pub const CURRENT_TIME: &str = "urn:oasis:names:tc:xacml:1.0:environment:current-time";
    pub const CURRENT_DATE: &str = "urn:oasis:names:tc:xacml:1.0:environment:current-date";
    pub const CURRENT_DATETIME: &str = "urn:oasis:names:tc:xacml:1.0:environment:current-dateTime";
}

/// Fully-qualified attribute name: category, id and optional issuer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AttributeFqn {
    pub category: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl AttributeFqn {
    pub fn new(category: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            id: id.into(),
            issuer: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }
}

impl fmt::Display for AttributeFqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.id)?;
        if let Some(issuer) = &self.issuer {
            write!(f, " (issuer '{}')", issuer)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct IssuedValue {
    issuer: Option<String>,
    value: AttributeValue,
}

/// Outcome of looking an attribute up in the request itself.
pub(crate) enum RequestLookup {
    Found(Bag),
    /// Values exist under the name, but none of the requested datatype.
    WrongDatatype(Datatype),
    Absent,
}

/// A decision request.
#[derive(Debug, Clone, Default)]
pub struct Request {
    attributes: HashMap<(String, String), Vec<IssuedValue>>,
    content: HashMap<String, String>,
    return_policy_id_list: bool,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(
        mut self,
        category: impl Into<String>,
        id: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.push(category.into(), id.into(), None, value.into());
        self
    }

    pub fn with_issued_attribute(
        mut self,
        category: impl Into<String>,
        id: impl Into<String>,
        issuer: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.push(category.into(), id.into(), Some(issuer.into()), value.into());
        self
    }

    /// Content of a category (an XML fragment), the input of AttributeSelectors.
    pub fn with_content(mut self, category: impl Into<String>, content: impl Into<String>) -> Self {
        self.content.insert(category.into(), content.into());
        self
    }

    /// Ask for the list of applicable policies in the result.
    pub fn with_return_policy_id_list(mut self, enabled: bool) -> Self {
        self.return_policy_id_list = enabled;
        self
    }

    fn push(&mut self, category: String, id: String, issuer: Option<String>, value: AttributeValue) {
        self.attributes
            .entry((category, id))
            .or_default()
            .push(IssuedValue { issuer, value });
    }

    pub fn content(&self, category: &str) -> Option<&str> {
        self.content.get(category).map(String::as_str)
    }

    pub fn return_policy_id_list(&self) -> bool {
        self.return_policy_id_list
    }

    pub(crate) fn lookup(
        &self,
        fqn: &AttributeFqn,
        datatype: &Datatype,
        strict_issuer: bool,
    ) -> Result<RequestLookup, IndeterminateError> {
        let Some(values) = self
            .attributes
            .get(&(fqn.category.clone(), fqn.id.clone()))
        else {
            return Ok(RequestLookup::Absent);
        };
        let issued: Vec<&IssuedValue> = values
            .iter()
            .filter(|v| match (&fqn.issuer, &v.issuer) {
                (Some(wanted), Some(actual)) => wanted == actual,
                (Some(_), None) => false,
                (None, Some(_)) => !strict_issuer,
                (None, None) => true,
            })
            .collect();
        let Some(first) = issued.first() else {
            return Ok(RequestLookup::Absent);
        };
        let matching: Vec<AttributeValue> = issued
            .iter()
            .filter(|v| v.value.datatype() == *datatype)
            .map(|v| v.value.clone())
            .collect();
        if matching.is_empty() {
            return Ok(RequestLookup::WrongDatatype(first.value.datatype()));
        }
        Ok(RequestLookup::Found(Bag::new(datatype.clone(), matching)?))
    }
}

/// Source of attributes the request does not carry (a PIP).
///
/// Called synchronously at most once per (attribute, datatype) per request;
/// `Ok(None)` means the attribute does not exist.
pub trait AttributeProvider: Send + Sync {
    fn provide(
        &self,
        attribute: &AttributeFqn,
        datatype: &Datatype,
        request: &Request,
    ) -> Result<Option<Bag>, IndeterminateError>;
}

/// XPath capability used by AttributeSelectors.
pub trait XPathEvaluator: Send + Sync {
    /// Evaluate `path` against one category's content and return the string
    /// value of every selected node, in document order.
    fn select(&self, content: &str, path: &str) -> Result<Vec<String>, IndeterminateError>;
}

/// Per-request state: attribute and selector caches, variable memo, clock.
pub struct EvaluationContext<'a> {
    request_id: Uuid,
    request: &'a Request,
    config: &'a PdpConfig,
    datatypes: &'a DatatypeRegistry,
    provider: Option<&'a dyn AttributeProvider>,
    xpath: Option<&'a dyn XPathEvaluator>,
    now: DateTime<Utc>,
    attributes: HashMap<(AttributeFqn, Datatype), Result<Bag, IndeterminateError>>,
    selections: HashMap<(String, String, Datatype), Bag>,
    variable_scope: Option<Arc<VariableTable>>,
    variable_values: HashMap<String, Value>,
    variables_in_progress: Vec<String>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(request: &'a Request, config: &'a PdpConfig, datatypes: &'a DatatypeRegistry) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            request,
            config,
            datatypes,
            provider: None,
            xpath: None,
            now: Utc::now(),
            attributes: HashMap::new(),
            selections: HashMap::new(),
            variable_scope: None,
            variable_values: HashMap::new(),
            variables_in_progress: Vec::new(),
        }
    }

    /// Freeze the PDP clock at `now` instead of the creation time.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_attribute_provider(mut self, provider: &'a dyn AttributeProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_xpath_evaluator(mut self, xpath: &'a dyn XPathEvaluator) -> Self {
        self.xpath = Some(xpath);
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn request(&self) -> &Request {
        self.request
    }

    pub fn config(&self) -> &PdpConfig {
        self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// The bag for an attribute, resolved once per request.
    ///
    /// Absent attributes resolve to an empty bag; it is the designator's job
    /// to turn that into a missing-attribute error when it must be present.
    pub fn attribute_bag(
        &mut self,
        fqn: &AttributeFqn,
        datatype: &Datatype,
    ) -> Result<Bag, IndeterminateError> {
        let key = (fqn.clone(), datatype.clone());
        if let Some(cached) = self.attributes.get(&key) {
            return cached.clone();
        }
        let resolved = self.resolve_attribute(fqn, datatype);
        match &resolved {
            Ok(bag) => tracing::trace!("attribute {} ({}) resolved to {}", fqn, datatype, bag),
            Err(e) => tracing::trace!("attribute {} ({}) failed: {}", fqn, datatype, e),
        }
        self.attributes.insert(key, resolved.clone());
        resolved
    }

    fn resolve_attribute(
        &self,
        fqn: &AttributeFqn,
        datatype: &Datatype,
    ) -> Result<Bag, IndeterminateError> {
        let env_value = self.standard_env_value(fqn, datatype);
        let source = self.config.standard_env_attributes;
        if let (Some(value), StandardEnvAttributeSource::PdpOnly) = (&env_value, source) {
            return Ok(Bag::singleton(value.clone()));
        }

        match self
            .request
            .lookup(fqn, datatype, self.config.strict_attribute_issuer_match)?
        {
            RequestLookup::Found(bag) => return Ok(bag),
            RequestLookup::WrongDatatype(found) => {
                return Err(IndeterminateError::type_mismatch(format!(
                    "attribute {} has datatype {}, expected {}",
                    fqn, found, datatype
                )))
            }
            RequestLookup::Absent => {}
        }

        if let (Some(value), StandardEnvAttributeSource::RequestElsePdp) = (env_value, source) {
            return Ok(Bag::singleton(value));
        }

        if let Some(provider) = self.provider {
            if let Some(bag) = provider.provide(fqn, datatype, self.request)? {
                if bag.datatype() != datatype {
                    return Err(IndeterminateError::type_mismatch(format!(
                        "attribute provider returned {} values for {}, expected {}",
                        bag.datatype(),
                        fqn,
                        datatype
                    )));
                }
                return Ok(bag);
            }
        }
        Ok(Bag::empty(datatype.clone()))
    }

    /// current-time / current-date / current-dateTime from the frozen clock.
    fn standard_env_value(&self, fqn: &AttributeFqn, datatype: &Datatype) -> Option<AttributeValue> {
        if fqn.category != category::ENVIRONMENT || fqn.issuer.is_some() {
            return None;
        }
        let utc = Some(Utc.fix());
        match (fqn.id.as_str(), datatype) {
            (attribute_id::CURRENT_DATETIME, Datatype::DateTime) => {
                Some(AttributeValue::DateTime(XsDateTime {
                    datetime: self.now.naive_utc(),
                    offset: utc,
                }))
            }
            (attribute_id::CURRENT_DATE, Datatype::Date) => Some(AttributeValue::Date(XsDate {
                date: self.now.date_naive(),
                offset: utc,
            })),
            (attribute_id::CURRENT_TIME, Datatype::Time) => Some(AttributeValue::Time(XsTime {
                time: self.now.time(),
                offset: utc,
            })),
            _ => None,
        }
    }

    /// Nodes selected by `path` in `category`'s content, parsed as `datatype`.
    /// No content for the category yields an empty bag.
    pub fn select(
        &mut self,
        category: &str,
        path: &str,
        datatype: &Datatype,
    ) -> Result<Bag, IndeterminateError> {
        let key = (category.to_string(), path.to_string(), datatype.clone());
        if let Some(bag) = self.selections.get(&key) {
            return Ok(bag.clone());
        }
        let xpath = self.xpath.ok_or_else(|| {
            IndeterminateError::processing("no XPath evaluator is configured for AttributeSelector")
        })?;
        let mut bag = Bag::empty(datatype.clone());
        if let Some(content) = self.request.content(category) {
            for lexical in xpath.select(content, path)? {
                bag.push(self.datatypes.parse_as(datatype, &lexical)?)?;
            }
        }
        tracing::trace!("selector {} in {} resolved to {}", path, category, bag);
        self.selections.insert(key, bag.clone());
        Ok(bag)
    }

    /// Make `table` the visible variable definitions, returning the previous
    /// scope for [`Self::exit_variable_scope`]. Memoized values never cross
    /// a scope boundary.
    pub(crate) fn enter_variable_scope(
        &mut self,
        table: Arc<VariableTable>,
    ) -> Option<Arc<VariableTable>> {
        self.variable_values.clear();
        self.variable_scope.replace(table)
    }

    pub(crate) fn exit_variable_scope(&mut self, previous: Option<Arc<VariableTable>>) {
        self.variable_values.clear();
        self.variable_scope = previous;
    }

    /// Value of a variable of the current policy, evaluated at most once
    /// per scope.
    pub fn variable_value(&mut self, id: &str) -> Result<Value, IndeterminateError> {
        if let Some(value) = self.variable_values.get(id) {
            tracing::trace!("variable '{}' served from memo", id);
            return Ok(value.clone());
        }
        if self.variables_in_progress.iter().any(|v| v == id) {
            return Err(IndeterminateError::circular_variable(id));
        }
        if let Some(max) = self.config.max_variable_reference_depth {
            if self.variables_in_progress.len() >= max {
                return Err(IndeterminateError::processing(format!(
                    "variable '{}' exceeds the maximum reference depth of {}",
                    id, max
                )));
            }
        }
        let table = self.variable_scope.clone().ok_or_else(|| {
            IndeterminateError::processing(format!(
                "variable '{}' referenced outside of a policy",
                id
            ))
        })?;
        let definition = table.get(id).ok_or_else(|| {
            IndeterminateError::processing(format!("variable '{}' is not defined", id))
        })?;

        self.variables_in_progress.push(id.to_string());
        let result = definition.expression().evaluate(self);
        self.variables_in_progress.pop();

        let value = result?;
        tracing::trace!("variable '{}' evaluated to {}", id, value);
        self.variable_values.insert(id.to_string(), value.clone());
        Ok(value)
    }
}
