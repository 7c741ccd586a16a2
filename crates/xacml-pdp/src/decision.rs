// decision.rs - Decisions, extended Indeterminate, status and DecisionResult.

use std::fmt;

use serde::Serialize;
use xacml_model::{ErrorKind, IndeterminateError, MissingAttributeDetail, StatusCode};

use crate::pep::PepActions;

/// The effect of a rule, and the decision an obligation or advice applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Effect {
    Permit,
    Deny,
}

impl Effect {
    pub fn decision(self) -> Decision {
        match self {
            Effect::Permit => Decision::Permit,
            Effect::Deny => Decision::Deny,
        }
    }

    pub fn opposite(self) -> Effect {
        match self {
            Effect::Permit => Effect::Deny,
            Effect::Deny => Effect::Permit,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Decision {
    Permit,
    Deny,
    NotApplicable,
    Indeterminate,
}

impl Decision {
    /// The effect behind a Permit or Deny.
    pub fn effect(self) -> Option<Effect> {
        match self {
            Decision::Permit => Some(Effect::Permit),
            Decision::Deny => Some(Effect::Deny),
            _ => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Which decisions an Indeterminate might have masked. Only meaningful when
/// the decision is Indeterminate; always `None` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtendedIndeterminate {
    #[default]
    None,
    P,
    D,
    DP,
}

impl ExtendedIndeterminate {
    pub fn for_effect(effect: Effect) -> Self {
        match effect {
            Effect::Permit => ExtendedIndeterminate::P,
            Effect::Deny => ExtendedIndeterminate::D,
        }
    }
}

/// Machine-readable code plus enough text to find the failing attribute,
/// function or policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub code: StatusCode,
    /// Finer-grained cause, e.g. `multiple_applicable` vs `arithmetic`,
    /// both of which share the processing-error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_attribute: Option<MissingAttributeDetail>,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            error_kind: None,
            message: None,
            missing_attribute: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

impl From<&IndeterminateError> for Status {
    fn from(err: &IndeterminateError) -> Self {
        Self {
            code: err.status_code(),
            error_kind: Some(err.kind()),
            message: Some(err.message().to_string()),
            missing_attribute: err.missing_attribute_detail().cloned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Policy,
    PolicySet,
}

/// A policy or policy set that contributed to a decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PolicyIdentifier {
    pub kind: PolicyKind,
    pub id: String,
    pub version: String,
}

impl fmt::Display for PolicyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.id, self.version)
    }
}

/// The outcome of evaluating a rule, policy, policy set or whole request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionResult {
    decision: Decision,
    extended_indeterminate: ExtendedIndeterminate,
    status: Status,
    #[serde(skip_serializing_if = "PepActions::is_empty")]
    pep_actions: PepActions,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    applicable_policies: Vec<PolicyIdentifier>,
}

impl DecisionResult {
    fn with(decision: Decision, pep_actions: PepActions) -> Self {
        Self {
            decision,
            extended_indeterminate: ExtendedIndeterminate::None,
            status: Status::ok(),
            pep_actions,
            applicable_policies: Vec::new(),
        }
    }

    pub fn permit(pep_actions: PepActions) -> Self {
        Self::with(Decision::Permit, pep_actions)
    }

    pub fn deny(pep_actions: PepActions) -> Self {
        Self::with(Decision::Deny, pep_actions)
    }

    pub fn for_effect(effect: Effect, pep_actions: PepActions) -> Self {
        Self::with(effect.decision(), pep_actions)
    }

    pub fn not_applicable() -> Self {
        Self::with(Decision::NotApplicable, PepActions::default())
    }

    pub fn indeterminate(extended: ExtendedIndeterminate, error: &IndeterminateError) -> Self {
        Self::indeterminate_with_status(extended, Status::from(error))
    }

    pub fn indeterminate_with_status(extended: ExtendedIndeterminate, status: Status) -> Self {
        Self {
            decision: Decision::Indeterminate,
            extended_indeterminate: extended,
            status,
            pep_actions: PepActions::default(),
            applicable_policies: Vec::new(),
        }
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn extended_indeterminate(&self) -> ExtendedIndeterminate {
        self.extended_indeterminate
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn pep_actions(&self) -> &PepActions {
        &self.pep_actions
    }

    pub fn applicable_policies(&self) -> &[PolicyIdentifier] {
        &self.applicable_policies
    }

    pub fn is_not_applicable(&self) -> bool {
        self.decision == Decision::NotApplicable
    }

    pub fn is_indeterminate(&self) -> bool {
        self.decision == Decision::Indeterminate
    }

    pub(crate) fn take_pep_actions(&mut self) -> PepActions {
        std::mem::take(&mut self.pep_actions)
    }

    pub(crate) fn append_pep_actions(&mut self, actions: PepActions) {
        self.pep_actions.append(actions);
    }

    pub(crate) fn take_applicable_policies(&mut self) -> Vec<PolicyIdentifier> {
        std::mem::take(&mut self.applicable_policies)
    }

    pub(crate) fn set_applicable_policies(&mut self, ids: Vec<PolicyIdentifier>) {
        self.applicable_policies = ids;
    }

    pub(crate) fn push_applicable_policy(&mut self, id: PolicyIdentifier) {
        self.applicable_policies.push(id);
    }

    pub(crate) fn clear_applicable_policies(&mut self) {
        self.applicable_policies.clear();
    }
}

impl fmt::Display for DecisionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.decision, self.extended_indeterminate) {
            (Decision::Indeterminate, ExtendedIndeterminate::None) => f.write_str("Indeterminate"),
            (Decision::Indeterminate, ext) => write!(f, "Indeterminate{{{:?}}}", ext),
            (decision, _) => write!(f, "{}", decision),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indeterminate_carries_status_from_error() {
        let err = IndeterminateError::arithmetic("division by zero");
        let result = DecisionResult::indeterminate(ExtendedIndeterminate::D, &err);
        assert!(result.is_indeterminate());
        assert_eq!(result.status().code, StatusCode::ProcessingError);
        assert_eq!(result.status().error_kind, Some(ErrorKind::Arithmetic));
        assert_eq!(result.to_string(), "Indeterminate{D}");
    }

    #[test]
    fn permit_and_deny_have_no_extended_indeterminate() {
        let permit = DecisionResult::permit(PepActions::default());
        assert_eq!(permit.extended_indeterminate(), ExtendedIndeterminate::None);
        assert!(permit.status().is_ok());
        assert_eq!(DecisionResult::for_effect(Effect::Deny, PepActions::default()).decision(), Decision::Deny);
    }

    #[test]
    fn serializes_without_empty_sections() {
        let json = serde_json::to_value(DecisionResult::not_applicable()).unwrap();
        assert_eq!(json["decision"], "NotApplicable");
        assert_eq!(json["extended_indeterminate"], "NONE");
        assert_eq!(json["status"]["code"], "ok");
        assert!(json.get("pep_actions").is_none());
        assert!(json.get("applicable_policies").is_none());
    }
}
