use super::events::ValidatedEvent;
use super::states::ReleaseStatus;
use crate::models::{
    Actor, AuditAction, AuditLogEntry, Release, ReleaseId, StampedReason, WorkflowEvent,
    WorkflowEventKind,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// What a committed transition changed, handed to the side-effect dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRecord {
    pub release_id: ReleaseId,
    pub from_status: ReleaseStatus,
    pub to_status: ReleaseStatus,
    pub action: AuditAction,
    pub details: Value,
    pub event_kind: WorkflowEventKind,
    pub occurred_at: DateTime<Utc>,
}

impl TransitionRecord {
    pub fn audit_entry(&self, actor: &Actor) -> AuditLogEntry {
        AuditLogEntry::new(
            self.release_id.clone(),
            actor.reference(),
            self.action,
            self.occurred_at,
        )
        .with_statuses(self.from_status, self.to_status)
        .with_details(self.details.clone())
    }

    pub fn workflow_event(&self, release: &Release, actor: &Actor) -> WorkflowEvent {
        WorkflowEvent::for_release(
            release,
            self.event_kind.clone(),
            actor.reference(),
            self.occurred_at,
        )
        .with_metadata(self.details.clone())
    }
}

/// Apply the effects of an already guarded `event` to `release`.
///
/// Only business fields are touched; clearing the lock is the caller's job.
pub fn apply_transition(
    release: &mut Release,
    event: &ValidatedEvent,
    actor: &Actor,
    now: DateTime<Utc>,
) -> TransitionRecord {
    let from_status = release.status;
    let by = actor.reference();

    let (details, event_kind) = match event {
        ValidatedEvent::Stage { location, items } => {
            release.status = ReleaseStatus::Staged;
            release.staged_by = Some(by);
            release.staged_at = Some(now);
            release.staging_location = Some(*location);
            (
                json!({
                    "stagingLocation": location.as_str(),
                    "items": items,
                }),
                WorkflowEventKind::Staged,
            )
        }
        ValidatedEvent::Verify => {
            release.status = ReleaseStatus::Verified;
            release.verified_by = Some(by);
            release.verified_at = Some(now);
            (
                json!({ "stagedBy": release.staged_by.as_ref().map(|a| a.name.clone()) }),
                WorkflowEventKind::Verified {
                    line_items: release.line_items.clone(),
                },
            )
        }
        ValidatedEvent::RejectVerification { reason } => {
            let previous_stager = release.staged_by.as_ref().map(|a| a.name.clone());
            let previous_location = release.staging_location.map(|l| l.as_str());
            release.status = ReleaseStatus::Entered;
            release.clear_staging();
            release.pick_ticket_revision += 1;
            release.verification_rejection = Some(StampedReason {
                by,
                at: now,
                reason: reason.clone(),
            });
            (
                json!({
                    "reason": reason,
                    "pickTicketRevision": release.pick_ticket_revision,
                    "previousStagedBy": previous_stager,
                    "previousStagingLocation": previous_location,
                }),
                WorkflowEventKind::VerificationRejected {
                    reason: reason.clone(),
                },
            )
        }
        ValidatedEvent::Load { truck_number } => {
            release.status = ReleaseStatus::Loaded;
            release.loaded_by = Some(by);
            release.loaded_at = Some(now);
            release.truck_number = Some(truck_number.clone());
            (
                json!({ "truckNumber": truck_number }),
                WorkflowEventKind::Loaded {
                    truck_number: truck_number.clone(),
                },
            )
        }
        ValidatedEvent::Ship { bol_number } => {
            release.status = ReleaseStatus::Shipped;
            release.shipped_by = Some(by);
            release.shipped_at = Some(now);
            release.bol_number = Some(bol_number.clone());
            (
                json!({ "bolNumber": bol_number }),
                WorkflowEventKind::Shipped {
                    bol_number: bol_number.clone(),
                },
            )
        }
        ValidatedEvent::UnableToStage { reason } => {
            release.unable_to_stage = Some(StampedReason {
                by,
                at: now,
                reason: reason.clone(),
            });
            (
                json!({ "reason": reason }),
                WorkflowEventKind::UnableToStage {
                    reason: reason.clone(),
                },
            )
        }
    };

    TransitionRecord {
        release_id: release.id.clone(),
        from_status,
        to_status: release.status,
        action: event.audit_action(),
        details,
        event_kind,
        occurred_at: now,
    }
}
