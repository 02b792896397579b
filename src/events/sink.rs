//! Append-only writers for audit entries and workflow events.

use crate::constants::collections;
use crate::models::{AuditLogEntry, WorkflowEvent};
use crate::store::{DocumentStore, StoreError};
use async_trait::async_trait;
use std::sync::Arc;

/// Error types for side-effect writes
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Sink rejected write: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist `entry`, returning the id assigned by the sink
    async fn record(&self, entry: &AuditLogEntry) -> Result<String, SinkError>;
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &WorkflowEvent) -> Result<String, SinkError>;
}

/// Writes audit entries and workflow events into document store collections
#[derive(Debug, Clone)]
pub struct StoreSideEffectSink {
    store: Arc<dyn DocumentStore>,
}

impl StoreSideEffectSink {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuditSink for StoreSideEffectSink {
    async fn record(&self, entry: &AuditLogEntry) -> Result<String, SinkError> {
        let document = serde_json::to_value(entry)?;
        Ok(self.store.add(collections::AUDIT_LOGS, document).await?)
    }
}

#[async_trait]
impl EventSink for StoreSideEffectSink {
    async fn publish(&self, event: &WorkflowEvent) -> Result<String, SinkError> {
        let document = serde_json::to_value(event)?;
        Ok(self.store.add(collections::WORKFLOW_EVENTS, document).await?)
    }
}
