//! # xacml-pdp
//!
//! XACML 3.0 policy decision point core.
//!
//! Policies are built once into an immutable tree of [`PolicySet`]s,
//! [`Policy`]s and [`Rule`]s, resolving every function, datatype and
//! combining algorithm through a [`Registry`]. A [`Pdp`] then evaluates
//! [`Request`]s against that tree and returns a [`DecisionResult`]:
//! Permit, Deny, NotApplicable or Indeterminate (with its extended
//! Indeterminate value), plus the obligations and advice the PEP must
//! honour.
//!
//! ## Key invariants
//!
//! - **Build-time checking**: unknown identifiers, ill-typed function
//!   applications and dangling variable references are [`BuildError`]s.
//!   A tree that builds never fails structurally during evaluation.
//! - **No errors across `evaluate`**: missing attributes, arithmetic errors
//!   and the like become an Indeterminate result carrying a [`Status`].
//! - **Shared-nothing evaluation**: the tree is read-only; each request gets
//!   its own [`EvaluationContext`], so a `Pdp` can serve many threads.

pub mod combining;
pub mod config;
pub mod context;
pub mod decision;
pub mod engine;
pub mod error;
pub mod expression;
pub mod functions;
pub mod pep;
pub mod policy;
pub mod registry;
pub mod rule;
pub mod target;

pub use combining::{Combinable, CombinerParameter, CombiningAlgorithm, CombiningAlgorithmRegistry, CombiningLevel};
pub use config::{PdpConfig, StandardEnvAttributeSource};
pub use context::{AttributeFqn, AttributeProvider, EvaluationContext, Request, XPathEvaluator};
pub use decision::{Decision, DecisionResult, Effect, ExtendedIndeterminate, PolicyIdentifier, PolicyKind, Status};
pub use engine::Pdp;
pub use error::{BuildError, ConfigError};
pub use expression::{AttributeDesignator, AttributeSelector, Expression, VariableDefinition, VariableReference};
pub use functions::{Function, FunctionRegistry};
pub use pep::{AttributeAssignment, AttributeAssignmentExpression, PepAction, PepActionExpression, PepActions};
pub use policy::{Policy, PolicyElement, PolicySet};
pub use registry::Registry;
pub use rule::Rule;
pub use target::{AllOf, AnyOf, Match, Target};
