//! In-process consumers of workflow events.
//!
//! Handlers run on the dispatcher's worker task, one event at a time. A
//! failing handler is logged and the remaining handlers still see the event.

use crate::constants::collections;
use crate::models::{ReleaseId, WorkflowEvent, WorkflowEventKind};
use crate::store::{DocumentStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Handler {handler} failed: {reason}")]
    Failed {
        handler: &'static str,
        reason: String,
    },
}

#[async_trait]
pub trait WorkflowEventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this handler wants `event` at all
    fn handles(&self, event: &WorkflowEvent) -> bool;

    async fn handle(&self, event: &WorkflowEvent) -> Result<(), HandlerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    StagingComplete,
    VerificationRejected,
    UnableToStage,
}

/// Who a notification is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// Anyone able to verify a staged release
    Verifiers,
    /// Office staff who reprint pick tickets
    Office,
    Supervisors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    #[default]
    Normal,
    Urgent,
}

/// A queued notification for some external delivery mechanism to pick up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub release_id: ReleaseId,
    pub release_number: Option<String>,
    pub audience: Audience,
    /// Actor who should not receive it (the one who caused it)
    pub exclude_actor_id: Option<String>,
    pub priority: NotificationPriority,
    pub data: Value,
    pub sent: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Notification owed for `event`, if any
    pub fn for_event(event: &WorkflowEvent) -> Option<Self> {
        let (kind, audience, exclude_actor_id, priority, data) = match &event.kind {
            WorkflowEventKind::Staged => (
                NotificationKind::StagingComplete,
                Audience::Verifiers,
                Some(event.actor.id.clone()),
                NotificationPriority::Normal,
                json!({
                    "stagedBy": event.actor.name,
                    "stagingLocation": event.metadata.get("stagingLocation").cloned().unwrap_or(Value::Null),
                }),
            ),
            WorkflowEventKind::VerificationRejected { reason } => (
                NotificationKind::VerificationRejected,
                Audience::Office,
                None,
                NotificationPriority::Normal,
                json!({
                    "rejectedBy": event.actor.name,
                    "reason": reason,
                    "pickTicketRevision": event.metadata.get("pickTicketRevision").cloned().unwrap_or(Value::Null),
                }),
            ),
            WorkflowEventKind::UnableToStage { reason } => (
                NotificationKind::UnableToStage,
                Audience::Supervisors,
                None,
                NotificationPriority::Urgent,
                json!({
                    "reportedBy": event.actor.name,
                    "reason": reason,
                }),
            ),
            _ => return None,
        };

        Some(Self {
            id: Uuid::new_v4(),
            kind,
            release_id: event.release_id.clone(),
            release_number: event.release_number.clone(),
            audience,
            exclude_actor_id,
            priority,
            data,
            sent: false,
            created_at: event.occurred_at,
        })
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), HandlerError>;
}

/// Queues notifications in the `notifications` collection
#[derive(Debug, Clone)]
pub struct StoreNotifier {
    store: Arc<dyn DocumentStore>,
}

impl StoreNotifier {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Notifier for StoreNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), HandlerError> {
        let document = serde_json::to_value(notification)?;
        self.store.add(collections::NOTIFICATIONS, document).await?;
        Ok(())
    }
}

/// Turns staging, rejection and unable-to-stage events into notifications
pub struct NotificationHandler {
    notifier: Arc<dyn Notifier>,
}

impl NotificationHandler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl WorkflowEventHandler for NotificationHandler {
    fn name(&self) -> &'static str {
        "notification"
    }

    fn handles(&self, event: &WorkflowEvent) -> bool {
        matches!(
            event.kind,
            WorkflowEventKind::Staged
                | WorkflowEventKind::VerificationRejected { .. }
                | WorkflowEventKind::UnableToStage { .. }
        )
    }

    async fn handle(&self, event: &WorkflowEvent) -> Result<(), HandlerError> {
        let Some(notification) = Notification::for_event(event) else {
            return Ok(());
        };
        self.notifier.notify(&notification).await?;
        debug!(
            release_id = %event.release_id,
            kind = ?notification.kind,
            priority = ?notification.priority,
            "📣 Notification queued"
        );
        Ok(())
    }
}
