// registry.rs - Datatypes, functions and combining algorithms of one engine.
//
// A Registry is built once, before any policy, and then only read. Policy
// builders resolve identifiers through it, so an unknown datatype, function
// or algorithm URI fails while the policy is built, never during evaluation.
// Several independently configured registries can live in one process.

use std::sync::Arc;

use xacml_model::{AttributeValue, Datatype, DatatypeFactory, DatatypeRegistry};

use crate::combining::{CombiningAlgorithm, CombiningAlgorithmRegistry, CombiningLevel};
use crate::error::BuildError;
use crate::expression::{AttributeDesignator, Expression};
use crate::functions::{Function, FunctionRegistry};
use crate::target::Match;

#[derive(Debug, Clone)]
pub struct Registry {
    datatypes: DatatypeRegistry,
    functions: FunctionRegistry,
    algorithms: CombiningAlgorithmRegistry,
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

impl Registry {
    /// Every standard datatype, function and combining algorithm.
    pub fn standard() -> Self {
        Self::new(
            DatatypeRegistry::standard(),
            FunctionRegistry::standard(),
            CombiningAlgorithmRegistry::standard(),
        )
    }

    pub fn new(
        datatypes: DatatypeRegistry,
        functions: FunctionRegistry,
        algorithms: CombiningAlgorithmRegistry,
    ) -> Self {
        tracing::debug!(
            "registry with {} functions and {} combining algorithms",
            functions.len(),
            algorithms.len()
        );
        Self {
            datatypes,
            functions,
            algorithms,
        }
    }

    /// Add a custom datatype. Its URI must not clash with a registered one.
    pub fn register_datatype(&mut self, factory: Arc<dyn DatatypeFactory>) -> Result<(), BuildError> {
        self.datatypes.register(factory)?;
        Ok(())
    }

    pub fn register_function(&mut self, function: Arc<dyn Function>) -> Result<(), BuildError> {
        self.functions.register(function)
    }

    pub fn register_combining_algorithm(&mut self, algorithm: Arc<dyn CombiningAlgorithm>) -> Result<(), BuildError> {
        self.algorithms.register(algorithm)
    }

    pub fn datatypes(&self) -> &DatatypeRegistry {
        &self.datatypes
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn algorithms(&self) -> &CombiningAlgorithmRegistry {
        &self.algorithms
    }

    pub fn datatype(&self, uri: &str) -> Result<Datatype, BuildError> {
        Ok(self.datatypes.get(uri)?)
    }

    pub fn function(&self, id: &str) -> Result<Arc<dyn Function>, BuildError> {
        self.functions.get(id)
    }

    /// Parse a literal of the datatype named by `datatype_uri`.
    pub fn literal(&self, datatype_uri: &str, lexical: &str) -> Result<AttributeValue, BuildError> {
        Ok(self.datatypes.parse(datatype_uri, lexical)?)
    }

    /// An Apply of the function `id`, type-checked against `args`.
    pub fn apply(&self, id: &str, args: Vec<Expression>) -> Result<Expression, BuildError> {
        Expression::apply(self.function(id)?, args)
    }

    pub fn designator(
        &self,
        category: &str,
        attribute_id: &str,
        datatype_uri: &str,
        must_be_present: bool,
    ) -> Result<AttributeDesignator, BuildError> {
        Ok(AttributeDesignator::new(
            category,
            attribute_id,
            self.datatype(datatype_uri)?,
            must_be_present,
        ))
    }

    /// A Match calling `function_id(value, member)` over `source`.
    pub fn match_(
        &self,
        function_id: &str,
        value: AttributeValue,
        source: impl Into<Expression>,
    ) -> Result<Match, BuildError> {
        Match::new(self.function(function_id)?, value, source.into())
    }

    pub fn rule_combining_algorithm(&self, id: &str) -> Result<Arc<dyn CombiningAlgorithm>, BuildError> {
        self.algorithms.get(id, CombiningLevel::Rule)
    }

    pub fn policy_combining_algorithm(&self, id: &str) -> Result<Arc<dyn CombiningAlgorithm>, BuildError> {
        self.algorithms.get(id, CombiningLevel::Policy)
    }
}
