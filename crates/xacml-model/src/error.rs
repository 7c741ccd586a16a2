// error.rs - Value-level errors and the Indeterminate error taxonomy.
//
// Two families live here:
// - `ValueError` is raised while *building* values (bad lexical form,
//   unknown datatype URI, mixed bag). It is fatal to policy loading.
// - `IndeterminateError` is raised while *evaluating*. It never escapes the
//   PDP's evaluate() boundary: the decision layer turns it into a Status.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors raised while parsing or assembling values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The lexical form is not valid for the datatype.
    #[error("invalid {datatype} value '{lexical}': {reason}")]
    Syntax {
        datatype: String,
        lexical: String,
        reason: String,
    },

    /// No datatype is registered under this URI.
    #[error("unknown datatype '{0}'")]
    UnknownDatatype(String),

    /// A bag received a value of a different datatype.
    #[error("bag of {expected} cannot hold a value of {found}")]
    MixedBag { expected: String, found: String },
}

impl ValueError {
    pub fn syntax(
        datatype: impl Into<String>,
        lexical: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ValueError::Syntax {
            datatype: datatype.into(),
            lexical: lexical.into(),
            reason: reason.into(),
        }
    }
}

/// XACML status codes carried by a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    MissingAttribute,
    SyntaxError,
    ProcessingError,
}

impl StatusCode {
    pub fn uri(&self) -> &'static str {
        match self {
            StatusCode::Ok => "urn:oasis:names:tc:xacml:1.0:status:ok",
            StatusCode::MissingAttribute => "urn:oasis:names:tc:xacml:1.0:status:missing-attribute",
            StatusCode::SyntaxError => "urn:oasis:names:tc:xacml:1.0:status:syntax-error",
            StatusCode::ProcessingError => "urn:oasis:names:tc:xacml:1.0:status:processing-error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

/// What went wrong during evaluation. Finer grained than [`StatusCode`],
/// which only has room for the four XACML codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingAttribute,
    TypeMismatch,
    Arithmetic,
    CircularVariableReference,
    FeatureDisabled,
    Syntax,
    Processing,
    /// More than one child was applicable under only-one-applicable.
    MultipleApplicable,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::MissingAttribute => StatusCode::MissingAttribute,
            ErrorKind::Syntax => StatusCode::SyntaxError,
            _ => StatusCode::ProcessingError,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MissingAttribute => "missing attribute",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::Arithmetic => "arithmetic error",
            ErrorKind::CircularVariableReference => "circular variable reference",
            ErrorKind::FeatureDisabled => "feature disabled",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Processing => "processing error",
            ErrorKind::MultipleApplicable => "multiple applicable",
        };
        f.write_str(name)
    }
}

/// Identifies an attribute the PDP needed but could not find, so the PEP
/// can supply it and retry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MissingAttributeDetail {
    pub category: String,
    pub attribute_id: String,
    pub datatype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl fmt::Display for MissingAttributeDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({})",
            self.category, self.attribute_id, self.datatype
        )?;
        if let Some(issuer) = &self.issuer {
            write!(f, " issued by '{}'", issuer)?;
        }
        Ok(())
    }
}

/// An evaluation-time failure. Surfaces as an Indeterminate decision.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct IndeterminateError {
    kind: ErrorKind,
    message: String,
    missing_attribute: Option<MissingAttributeDetail>,
}

impl IndeterminateError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            missing_attribute: None,
        }
    }

    pub fn missing_attribute(detail: MissingAttributeDetail) -> Self {
        Self {
            kind: ErrorKind::MissingAttribute,
            message: format!("attribute {} is required but absent", detail),
            missing_attribute: Some(detail),
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    pub fn arithmetic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Arithmetic, message)
    }

    pub fn circular_variable(variable_id: &str) -> Self {
        Self::new(
            ErrorKind::CircularVariableReference,
            format!("variable '{}' references itself", variable_id),
        )
    }

    pub fn feature_disabled(feature: &str) -> Self {
        Self::new(
            ErrorKind::FeatureDisabled,
            format!("{} support is disabled", feature),
        )
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, message)
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Processing, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn missing_attribute_detail(&self) -> Option<&MissingAttributeDetail> {
        self.missing_attribute.as_ref()
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    /// Prefix the message with where the error happened, keeping the kind.
    pub fn context(mut self, location: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", location, self.message);
        self
    }
}

impl From<ValueError> for IndeterminateError {
    fn from(err: ValueError) -> Self {
        match err {
            ValueError::Syntax { .. } => IndeterminateError::syntax(err.to_string()),
            ValueError::UnknownDatatype(_) | ValueError::MixedBag { .. } => {
                IndeterminateError::type_mismatch(err.to_string())
            }
        }
    }
}
