//! # Workflow Events
//!
//! At-least-once messages describing a completed transition. The dispatcher
//! persists them with `processed = false` and hands them to in-process handlers;
//! downstream consumers mark them processed.

use super::actor::ActorRef;
use super::release::{LineItem, Release, ReleaseId};
use crate::constants::events;
use crate::state_machine::ReleaseStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Transition-specific payload of a workflow event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEventKind {
    Staged,
    Verified { line_items: Vec<LineItem> },
    VerificationRejected { reason: String },
    Loaded { truck_number: String },
    Shipped { bol_number: String },
    UnableToStage { reason: String },
}

impl WorkflowEventKind {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Staged => events::RELEASE_STAGED,
            Self::Verified { .. } => events::RELEASE_VERIFIED,
            Self::VerificationRejected { .. } => events::RELEASE_VERIFICATION_REJECTED,
            Self::Loaded { .. } => events::RELEASE_LOADED,
            Self::Shipped { .. } => events::RELEASE_SHIPPED,
            Self::UnableToStage { .. } => events::RELEASE_UNABLE_TO_STAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEvent {
    pub id: Uuid,
    pub name: String,
    pub kind: WorkflowEventKind,
    pub release_id: ReleaseId,
    pub release_number: Option<String>,
    pub status: ReleaseStatus,
    pub actor: ActorRef,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub processed: bool,
}

impl WorkflowEvent {
    /// Event for `release` as it stands after the transition
    pub fn for_release(
        release: &Release,
        kind: WorkflowEventKind,
        actor: ActorRef,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: kind.event_name().to_string(),
            kind,
            release_id: release.id.clone(),
            release_number: release.release_number.clone(),
            status: release.status,
            actor,
            occurred_at,
            metadata: Value::Null,
            processed: false,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}
