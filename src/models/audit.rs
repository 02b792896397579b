use super::actor::ActorRef;
use super::release::ReleaseId;
use crate::state_machine::ReleaseStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// What an audit entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Staged,
    Verified,
    VerificationRejected,
    Loaded,
    Shipped,
    UnableToStage,
    LockAcquired,
    LockReleased,
    LockExpired,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staged => "STAGED",
            Self::Verified => "VERIFIED",
            Self::VerificationRejected => "VERIFICATION_REJECTED",
            Self::Loaded => "LOADED",
            Self::Shipped => "SHIPPED",
            Self::UnableToStage => "UNABLE_TO_STAGE",
            Self::LockAcquired => "LOCK_ACQUIRED",
            Self::LockReleased => "LOCK_RELEASED",
            Self::LockExpired => "LOCK_EXPIRED",
        }
    }

    pub fn is_lock_action(&self) -> bool {
        matches!(self, Self::LockAcquired | Self::LockReleased | Self::LockExpired)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one action taken on a release.
///
/// Entries are only ever appended; nothing in this crate updates or deletes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub release_id: ReleaseId,
    pub actor: ActorRef,
    pub action: AuditAction,
    pub old_status: Option<ReleaseStatus>,
    pub new_status: Option<ReleaseStatus>,
    #[serde(default)]
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        release_id: ReleaseId,
        actor: ActorRef,
        action: AuditAction,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            release_id,
            actor,
            action,
            old_status: None,
            new_status: None,
            details: Value::Null,
            created_at,
        }
    }

    pub fn with_statuses(mut self, old: ReleaseStatus, new: ReleaseStatus) -> Self {
        self.old_status = Some(old);
        self.new_status = Some(new);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_names_match_stored_form() {
        for action in [
            AuditAction::VerificationRejected,
            AuditAction::UnableToStage,
            AuditAction::LockExpired,
        ] {
            assert_eq!(serde_json::to_value(action).unwrap(), json!(action.as_str()));
        }
    }

    #[test]
    fn test_entry_builder() {
        let entry = AuditLogEntry::new(
            ReleaseId::from("R1"),
            ActorRef {
                id: "a".into(),
                name: "A".into(),
            },
            AuditAction::Verified,
            Utc::now(),
        )
        .with_statuses(ReleaseStatus::Staged, ReleaseStatus::Verified)
        .with_details(json!({"verifiedBy": "A"}));

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["action"], "VERIFIED");
        assert_eq!(json["oldStatus"], "Staged");
        assert_eq!(json["newStatus"], "Verified");
        assert!(!entry.action.is_lock_action());
    }
}
