//! Error types for the release workflow engine.
//!
//! Every public operation returns [`WorkflowError`] so callers can tell a
//! denied transition (current status, offending actor, bad payload) apart from
//! storage trouble and present actionable feedback.

use crate::retry::{ClassifiableError, RetryError};
use crate::state_machine::{GuardError, ReleaseStatus, StateMachineError};
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Release {release_id} not found")]
    NotFound { release_id: String },

    #[error("Cannot {operation} release with status: {current}")]
    InvalidState {
        current: ReleaseStatus,
        operation: &'static str,
    },

    #[error("Actor {actor_id} cannot verify a release they staged")]
    SelfVerificationDenied { actor_id: String },

    #[error("Validation error: {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Raised only once the retry executor has exhausted its attempts.
    #[error("Transaction failed after {attempts} attempts: {source}")]
    Contention {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("Circuit breaker open for {component}")]
    CircuitOpen { component: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl WorkflowError {
    /// Whether the caller may reasonably retry the whole operation later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Contention { .. } | Self::CircuitOpen { .. } => true,
            Self::Store(err) => err.kind.is_transient(),
            _ => false,
        }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

impl From<GuardError> for WorkflowError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::InvalidState { current, operation } => {
                Self::InvalidState { current, operation }
            }
            GuardError::SelfVerificationDenied { actor_id } => {
                Self::SelfVerificationDenied { actor_id }
            }
            GuardError::Validation { field, reason } => Self::Validation { field, reason },
        }
    }
}

impl From<StateMachineError> for WorkflowError {
    fn from(err: StateMachineError) -> Self {
        match err {
            StateMachineError::Guard(guard) => guard.into(),
            StateMachineError::NotFound { release_id } => Self::NotFound {
                release_id: release_id.to_string(),
            },
            StateMachineError::Store(store) => Self::Store(store),
        }
    }
}

impl From<RetryError<StateMachineError>> for WorkflowError {
    fn from(err: RetryError<StateMachineError>) -> Self {
        match err {
            RetryError::Failed(inner) => inner.into(),
            RetryError::Exhausted { attempts, last } => Self::Contention {
                attempts,
                source: last.into_store_error(),
            },
            RetryError::CircuitOpen { component } => Self::CircuitOpen { component },
        }
    }
}

impl From<crate::config::ConfigError> for WorkflowError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
