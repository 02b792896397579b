//! # Transaction Error Classification
//!
//! Decides whether a failed transaction attempt is worth repeating.
//!
//! An attempt is retryable when the store reports a transient condition
//! (aborted, failed-precondition, unavailable, resource-exhausted,
//! deadline-exceeded, internal) or when the error text mentions contention or a
//! timeout. Domain failures raised by the operation itself, such as a guard
//! rejecting a transition, are always permanent.

use crate::constants::system::CONTENTION_PATTERNS;
use crate::store::{StoreError, StoreErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Will fail the same way if repeated
    Permanent,

    /// Store reported a transient condition
    Transient,

    /// Write conflict or lock wait reported in the message
    Contention,

    /// Timed out somewhere between us and the store
    Timeout,
}

impl ErrorCategory {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent => write!(f, "Permanent"),
            Self::Transient => write!(f, "Transient"),
            Self::Contention => write!(f, "Contention"),
            Self::Timeout => write!(f, "Timeout"),
        }
    }
}

/// Errors the retry executor knows how to inspect
pub trait ClassifiableError: std::error::Error + Send + Sync + 'static {
    /// Store failure category, when the error came from the store
    fn store_kind(&self) -> Option<StoreErrorKind>;

    /// Failures decided by business rules are never retried
    fn is_domain_error(&self) -> bool {
        false
    }

    /// Store error to report once retries run out
    fn into_store_error(self) -> StoreError
    where
        Self: Sized;
}

impl ClassifiableError for StoreError {
    fn store_kind(&self) -> Option<StoreErrorKind> {
        Some(self.kind)
    }

    fn into_store_error(self) -> StoreError {
        self
    }
}

pub trait ErrorClassifier: Send + Sync + fmt::Debug {
    fn classify(&self, error: &dyn ClassifiableError) -> ErrorCategory;
}

#[derive(Debug, Clone)]
pub struct StandardErrorClassifier {
    patterns: Vec<String>,
}

impl Default for StandardErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardErrorClassifier {
    pub fn new() -> Self {
        Self {
            patterns: CONTENTION_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Additional message fragments (matched case-insensitively) to treat as contention
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns
            .extend(patterns.into_iter().map(|p| p.into().to_lowercase()));
        self
    }

    fn match_message(&self, message: &str) -> Option<ErrorCategory> {
        let message = message.to_lowercase();
        let pattern = self.patterns.iter().find(|p| message.contains(p.as_str()))?;
        if pattern.contains("timeout") || pattern.contains("timedout") {
            Some(ErrorCategory::Timeout)
        } else {
            Some(ErrorCategory::Contention)
        }
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify(&self, error: &dyn ClassifiableError) -> ErrorCategory {
        if error.is_domain_error() {
            return ErrorCategory::Permanent;
        }
        if error.store_kind().is_some_and(|kind| kind.is_transient()) {
            return ErrorCategory::Transient;
        }
        self.match_message(&error.to_string())
            .unwrap_or(ErrorCategory::Permanent)
    }
}
