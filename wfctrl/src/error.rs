use std::fmt;
use thiserror::Error;
use wfcore::{
    ac::Role,
    condition::ConditionError,
    error::{
        BackendError,
        ValueError,
    },
};

/// The category an error falls into at the boundary of the platform,
/// mirroring the response classes a caller would report.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Conflict,
    Forbidden,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::BadRequest => "bad request",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Internal => "internal error",
        })
    }
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error(transparent)]
    BackendError(#[from] BackendError),
    #[error(transparent)]
    CtrlError(#[from] CtrlError),
    #[error(transparent)]
    ValueError(#[from] ValueError),
}

#[derive(Debug, PartialEq, Error)]
pub enum CtrlError {
    #[error("document not found: {0}")]
    DocumentNotFound(i64),
    #[error("workflow not found: {0}")]
    WorkflowNotFound(i64),
    #[error("state not found: {0}")]
    StateNotFound(i64),
    #[error("no active approval for document: {0}")]
    NoActiveInstance(i64),
    #[error("no pending step for document: {0}")]
    NoPendingStep(i64),

    #[error("workflow {0} has no initial state")]
    NoInitialState(i64),
    #[error("workflow {0} already has an initial state")]
    InitialStateExists(i64),
    #[error("action {0:?} is not available in the current state")]
    IllegalAction(String),
    #[error("state {0} does not belong to the workflow")]
    ForeignState(i64),
    #[error(transparent)]
    InvalidCondition(#[from] ConditionError),
    #[error("a step cannot be delegated to its current assignee")]
    SelfDelegation,
    #[error("SLA of {0} hours is outside 1..={max}", max = wfcore::workflow::MAX_SLA_HOURS)]
    InvalidSla(i64),

    #[error("document {0} already has an active approval")]
    AlreadyActive(i64),
    #[error("workflow {0} is referenced by active approvals")]
    WorkflowInUse(i64),
    #[error("state key {0:?} already exists in the workflow")]
    DuplicateStateKey(String),
    #[error("action {0:?} already exists on the state")]
    DuplicateActionKey(String),

    #[error("user {0} is not the assignee of the pending step")]
    NotAssignee(i64),
    #[error("role {actual} does not satisfy the required role {required}")]
    InsufficientRole {
        required: Role,
        actual: Role,
    },
}

impl CtrlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CtrlError::DocumentNotFound(_)
            | CtrlError::WorkflowNotFound(_)
            | CtrlError::StateNotFound(_)
            | CtrlError::NoActiveInstance(_)
            | CtrlError::NoPendingStep(_) => ErrorKind::NotFound,
            CtrlError::NoInitialState(_)
            | CtrlError::InitialStateExists(_)
            | CtrlError::IllegalAction(_)
            | CtrlError::ForeignState(_)
            | CtrlError::InvalidCondition(_)
            | CtrlError::SelfDelegation
            | CtrlError::InvalidSla(_) => ErrorKind::BadRequest,
            CtrlError::AlreadyActive(_)
            | CtrlError::WorkflowInUse(_)
            | CtrlError::DuplicateStateKey(_)
            | CtrlError::DuplicateActionKey(_) => ErrorKind::Conflict,
            CtrlError::NotAssignee(_)
            | CtrlError::InsufficientRole { .. } => ErrorKind::Forbidden,
        }
    }
}

fn backend_kind(e: &BackendError) -> ErrorKind {
    match e {
        BackendError::Contention(_) => ErrorKind::Conflict,
        _ => ErrorKind::Internal,
    }
}

impl PlatformError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlatformError::BackendError(e) => backend_kind(e),
            PlatformError::CtrlError(e) => e.kind(),
            PlatformError::ValueError(ValueError::Backend(e)) => backend_kind(e),
            PlatformError::ValueError(ValueError::Unsupported(_))
            | PlatformError::ValueError(ValueError::UnmappedAction(_)) => ErrorKind::BadRequest,
            PlatformError::ValueError(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            PlatformError::from(CtrlError::AlreadyActive(1)).kind(),
            ErrorKind::Conflict,
        );
        assert_eq!(
            PlatformError::from(BackendError::Contention("lost".into())).kind(),
            ErrorKind::Conflict,
        );
        assert_eq!(
            PlatformError::from(BackendError::Unknown).kind(),
            ErrorKind::Internal,
        );
        assert_eq!(
            PlatformError::from(ValueError::UnmappedAction("escalate".into())).kind(),
            ErrorKind::BadRequest,
        );
        assert_eq!(
            PlatformError::from(CtrlError::InvalidSla(0)).kind(),
            ErrorKind::BadRequest,
        );
        assert_eq!(
            PlatformError::from(CtrlError::InsufficientRole {
                required: Role::Editor,
                actual: Role::Viewer,
            }).kind(),
            ErrorKind::Forbidden,
        );
        assert_eq!(ErrorKind::NotFound.to_string(), "not found");
    }
}
