//! # Document Store
//!
//! Transactional persistence for release documents plus append-only
//! collections (audit logs, workflow events, notifications).
//!
//! The store is the single source of truth: it provides per-document atomic
//! read-modify-write through [`StoreTransaction`], and reports write conflicts
//! as [`StoreErrorKind::Aborted`] so the retry executor can try again.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryDocumentStore;
#[cfg(feature = "postgres")]
pub use postgres::PgDocumentStore;

use crate::models::{ReleaseDocument, ReleaseId};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Failure categories reported by a store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    Aborted,
    FailedPrecondition,
    Unavailable,
    ResourceExhausted,
    DeadlineExceeded,
    Internal,
    NotFound,
    AlreadyExists,
    InvalidArgument,
    PermissionDenied,
    Unknown,
}

impl StoreErrorKind {
    /// Conditions that clear up on their own and are worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Aborted
                | Self::FailedPrecondition
                | Self::Unavailable
                | Self::ResourceExhausted
                | Self::DeadlineExceeded
                | Self::Internal
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Aborted => "aborted",
            Self::FailedPrecondition => "failed-precondition",
            Self::Unavailable => "unavailable",
            Self::ResourceExhausted => "resource-exhausted",
            Self::DeadlineExceeded => "deadline-exceeded",
            Self::Internal => "internal",
            Self::NotFound => "not-found",
            Self::AlreadyExists => "already-exists",
            Self::InvalidArgument => "invalid-argument",
            Self::PermissionDenied => "permission-denied",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Aborted, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Unavailable, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::AlreadyExists, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Internal, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::InvalidArgument, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_argument(format!("malformed document: {err}"))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One atomic read-modify-write unit.
///
/// Reads observe a consistent snapshot. Writes become visible only on
/// [`commit`](StoreTransaction::commit), which fails with
/// [`StoreErrorKind::Aborted`] when a document read by this transaction was
/// changed by someone else in the meantime.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn get(&mut self, id: &ReleaseId) -> StoreResult<Option<ReleaseDocument>>;

    async fn update(&mut self, document: ReleaseDocument) -> StoreResult<()>;

    /// Append `document` to `collection`, returning the generated id
    async fn add(&mut self, collection: &str, document: Value) -> StoreResult<String>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    /// Insert a new release document; fails with `AlreadyExists` on a duplicate id
    async fn create(&self, document: ReleaseDocument) -> StoreResult<()>;

    /// Non-transactional read
    async fn get(&self, id: &ReleaseId) -> StoreResult<Option<ReleaseDocument>>;

    /// Every release document whose lock holder is set
    async fn find_locked(&self) -> StoreResult<Vec<ReleaseDocument>>;

    /// Append a document to a collection outside of any transaction
    async fn add(&self, collection: &str, document: Value) -> StoreResult<String>;
}
