use thiserror::Error;

use crate::{Action, ResourceKind, Role};

/// Broad category of an [`AuthzError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request was evaluated and is not permitted.
    Denied,
    /// The rule table is incomplete for the role being evaluated.
    Configuration,
    /// The request could not be evaluated because its input is malformed.
    Validation,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("role {role} may not {action} {resource}")]
    Denied {
        role: Role,
        action: Action,
        resource: ResourceKind,
    },
    #[error("role {0} has no registered rules")]
    UnregisteredRole(Role),
    #[error("unknown role `{0}`")]
    UnknownRole(String),
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("unknown resource type `{0}`")]
    UnknownResource(String),
    #[error("invalid {kind} instance: {reason}")]
    InvalidResource { kind: String, reason: String },
    #[error("{kind} instance is missing `{field}`")]
    MissingField {
        kind: ResourceKind,
        field: &'static str,
    },
    #[error("action {action} is not defined for {kind}")]
    UnsupportedAction { action: Action, kind: ResourceKind },
}

impl AuthzError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AuthzError::Denied { .. } => ErrorClass::Denied,
            AuthzError::UnregisteredRole(_) => ErrorClass::Configuration,
            AuthzError::UnknownRole(_)
            | AuthzError::UnknownAction(_)
            | AuthzError::UnknownResource(_)
            | AuthzError::InvalidResource { .. }
            | AuthzError::MissingField { .. }
            | AuthzError::UnsupportedAction { .. } => ErrorClass::Validation,
        }
    }

    pub fn is_denied(&self) -> bool {
        self.class() == ErrorClass::Denied
    }

    pub(crate) fn invalid(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        AuthzError::InvalidResource {
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

pub type AuthzResult<T> = Result<T, AuthzError>;
