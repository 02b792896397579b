use super::states::ReleaseStatus;
use crate::models::ReleaseId;
use crate::retry::ClassifiableError;
use crate::store::{StoreError, StoreErrorKind};
use thiserror::Error;

/// A transition request rejected by business rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("Cannot {operation} release with status: {current}")]
    InvalidState {
        current: ReleaseStatus,
        operation: &'static str,
    },

    #[error("Actor {actor_id} cannot verify a release they staged")]
    SelfVerificationDenied { actor_id: String },

    #[error("{field}: {reason}")]
    Validation { field: &'static str, reason: String },
}

pub type GuardResult<T> = Result<T, GuardError>;

pub(crate) fn validation_error(field: &'static str, reason: impl Into<String>) -> GuardError {
    GuardError::Validation {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Error)]
pub enum StateMachineError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error("Release {release_id} not found")]
    NotFound { release_id: ReleaseId },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

impl ClassifiableError for StateMachineError {
    fn store_kind(&self) -> Option<StoreErrorKind> {
        match self {
            Self::Store(err) => Some(err.kind),
            _ => None,
        }
    }

    fn is_domain_error(&self) -> bool {
        matches!(self, Self::Guard(_) | Self::NotFound { .. })
    }

    fn into_store_error(self) -> StoreError {
        match self {
            Self::Store(err) => err,
            other => StoreError::internal(other.to_string()),
        }
    }
}
