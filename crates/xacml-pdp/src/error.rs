// error.rs - Build-time and configuration errors for the PDP.
//
// Evaluation-time failures are not here: they are `IndeterminateError`s
// (from xacml-model) and end up inside a DecisionResult's Status.

use std::path::PathBuf;

use thiserror::Error;
use xacml_model::ValueError;

/// Errors raised while building expressions, rules, policies or registries.
/// Any of these rejects the element being built; nothing is partially loaded.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A literal or datatype reference could not be resolved or parsed.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// No function is registered under this identifier.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// No combining algorithm is registered under this identifier.
    #[error("unknown combining algorithm '{0}'")]
    UnknownCombiningAlgorithm(String),

    /// The arguments do not fit the function's signature.
    #[error("invalid arguments to '{function}': {reason}")]
    InvalidArguments { function: String, reason: String },

    /// A condition or match function does not produce a single boolean.
    #[error("{context} must evaluate to a single boolean, found {found}")]
    NotBoolean { context: String, found: String },

    /// A VariableReference names no VariableDefinition of the enclosing policy.
    #[error("reference to undefined variable '{0}'")]
    UnknownVariable(String),

    #[error("variable '{0}' is defined more than once")]
    DuplicateVariable(String),

    /// A VariableReference declares a type its definition does not produce.
    #[error("variable '{id}' is declared as {expected} but its definition returns {actual}")]
    VariableTypeMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("rule '{rule}' appears more than once in policy '{policy}'")]
    DuplicateRule { policy: String, rule: String },

    /// The algorithm exists but cannot combine elements at this level,
    /// e.g. only-one-applicable over rules.
    #[error("combining algorithm '{algorithm}' cannot combine {level}")]
    UnsupportedCombiningAlgorithm { algorithm: String, level: String },

    /// Conflicting registration (duplicate identifier).
    #[error("registry error: {0}")]
    Registry(String),
}

impl BuildError {
    pub fn invalid_arguments(function: &str, reason: impl Into<String>) -> Self {
        BuildError::InvalidArguments {
            function: function.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors from loading a [`crate::PdpConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid PDP config: {0}")]
    Parse(#[from] toml::de::Error),
}
