use crate::models::{AuditAction, StagedItem, StagingLocation};
use serde::{Deserialize, Serialize};

/// What the stager reports when placing goods at a staging location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingPayload {
    /// Must name one of the staging locations
    pub location: Option<String>,
    #[serde(default)]
    pub items: Vec<StagedItem>,
}

impl StagingPayload {
    pub fn at(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: Vec<StagedItem>) -> Self {
        self.items = items;
        self
    }
}

/// Events that can trigger release status transitions, as requested by callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ReleaseEvent {
    Stage(StagingPayload),
    Verify,
    RejectVerification { reason: String },
    Load { truck_number: String },
    Ship { bol_number: String },
    UnableToStage { reason: String },
}

impl ReleaseEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Stage(_) => "stage",
            Self::Verify => "verify",
            Self::RejectVerification { .. } => "reject_verification",
            Self::Load { .. } => "load",
            Self::Ship { .. } => "ship",
            Self::UnableToStage { .. } => "unable_to_stage",
        }
    }
}

/// A [`ReleaseEvent`] whose payload passed validation: text trimmed, location
/// resolved to a known [`StagingLocation`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedEvent {
    Stage {
        location: StagingLocation,
        items: Vec<StagedItem>,
    },
    Verify,
    RejectVerification {
        reason: String,
    },
    Load {
        truck_number: String,
    },
    Ship {
        bol_number: String,
    },
    UnableToStage {
        reason: String,
    },
}

impl ValidatedEvent {
    /// Verb used in "Cannot {operation} release with status: {status}"
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Stage { .. } => "stage",
            Self::Verify => "verify",
            Self::RejectVerification { .. } => "reject verification of",
            Self::Load { .. } => "load",
            Self::Ship { .. } => "ship",
            Self::UnableToStage { .. } => "mark unable to stage",
        }
    }

    pub fn audit_action(&self) -> AuditAction {
        match self {
            Self::Stage { .. } => AuditAction::Staged,
            Self::Verify => AuditAction::Verified,
            Self::RejectVerification { .. } => AuditAction::VerificationRejected,
            Self::Load { .. } => AuditAction::Loaded,
            Self::Ship { .. } => AuditAction::Shipped,
            Self::UnableToStage { .. } => AuditAction::UnableToStage,
        }
    }

    /// Status the release must be in; `None` when any status is accepted
    pub fn required_status(&self) -> Option<super::ReleaseStatus> {
        use super::ReleaseStatus;
        match self {
            Self::Stage { .. } => Some(ReleaseStatus::Entered),
            Self::Verify | Self::RejectVerification { .. } => Some(ReleaseStatus::Staged),
            Self::Load { .. } => Some(ReleaseStatus::Verified),
            Self::Ship { .. } => Some(ReleaseStatus::Loaded),
            Self::UnableToStage { .. } => None,
        }
    }
}
