use super::errors::{validation_error, GuardError, GuardResult};
use super::events::{ReleaseEvent, ValidatedEvent};
use super::states::ReleaseStatus;
use crate::models::{Actor, Release, StagingLocation};
use serde::{Deserialize, Serialize};

/// Trait for implementing state transition guards.
///
/// Guards run inside the transition transaction against the freshly read
/// release, so a concurrent transition that moved the status is observed here.
pub trait StateGuard: Send + Sync {
    fn check(&self, release: &Release, event: &ValidatedEvent, actor: &Actor) -> GuardResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// The release must be in the status the event starts from
pub struct RequiredStatusGuard;

impl StateGuard for RequiredStatusGuard {
    fn check(&self, release: &Release, event: &ValidatedEvent, _actor: &Actor) -> GuardResult<()> {
        match event.required_status() {
            Some(required) if release.status != required => Err(GuardError::InvalidState {
                current: release.status,
                operation: event.operation(),
            }),
            _ => Ok(()),
        }
    }

    fn description(&self) -> &'static str {
        "Release must be in the status the transition starts from"
    }
}

/// Whoever staged a release may not verify it, unless elevated
pub struct SelfVerificationGuard;

impl StateGuard for SelfVerificationGuard {
    fn check(&self, release: &Release, event: &ValidatedEvent, actor: &Actor) -> GuardResult<()> {
        if matches!(event, ValidatedEvent::Verify) && !can_user_verify(release, actor) {
            return Err(GuardError::SelfVerificationDenied {
                actor_id: actor.id.clone(),
            });
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Stager cannot verify their own staging"
    }
}

/// Guards applied to every transition, in order
pub fn default_guards() -> Vec<Box<dyn StateGuard>> {
    vec![Box::new(RequiredStatusGuard), Box::new(SelfVerificationGuard)]
}

/// Check the request payload before any store access.
///
/// Text fields are trimmed; blank values and unknown staging locations are
/// rejected, never corrected.
pub fn validate_event(event: ReleaseEvent) -> GuardResult<ValidatedEvent> {
    match event {
        ReleaseEvent::Stage(payload) => {
            let raw = payload
                .location
                .as_deref()
                .map(str::trim)
                .filter(|location| !location.is_empty())
                .ok_or_else(|| validation_error("stagingLocation", "staging location is required"))?;
            let location = raw
                .parse::<StagingLocation>()
                .map_err(|reason| validation_error("stagingLocation", reason))?;
            crate::validation::validate_staged_items(&payload.items)
                .map_err(|reason| validation_error("items", reason))?;
            Ok(ValidatedEvent::Stage {
                location,
                items: payload.items,
            })
        }
        ReleaseEvent::Verify => Ok(ValidatedEvent::Verify),
        ReleaseEvent::RejectVerification { reason } => Ok(ValidatedEvent::RejectVerification {
            reason: require_text("reason", &reason)?,
        }),
        ReleaseEvent::Load { truck_number } => Ok(ValidatedEvent::Load {
            truck_number: require_text("truckNumber", &truck_number)?,
        }),
        ReleaseEvent::Ship { bol_number } => Ok(ValidatedEvent::Ship {
            bol_number: require_text("bolNumber", &bol_number)?,
        }),
        ReleaseEvent::UnableToStage { reason } => Ok(ValidatedEvent::UnableToStage {
            reason: require_text("reason", &reason)?,
        }),
    }
}

fn require_text(field: &'static str, value: &str) -> GuardResult<String> {
    crate::validation::require_text(value)
        .map_err(|reason| validation_error(field, reason))
}

/// False only when `actor` staged the release and is not elevated
pub fn can_user_verify(release: &Release, actor: &Actor) -> bool {
    !release.was_staged_by(&actor.id) || actor.is_elevated()
}

/// Operations offered to an actor for a release in its current status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Stage,
    UnableToStage,
    Verify,
    RejectVerification,
    Load,
    Ship,
}

pub fn available_actions(release: &Release, actor: &Actor) -> Vec<WorkflowAction> {
    match release.status {
        ReleaseStatus::Entered => vec![WorkflowAction::Stage, WorkflowAction::UnableToStage],
        ReleaseStatus::Staged if can_user_verify(release, actor) => {
            vec![WorkflowAction::Verify, WorkflowAction::RejectVerification]
        }
        ReleaseStatus::Staged => Vec::new(),
        ReleaseStatus::Verified => vec![WorkflowAction::Load],
        ReleaseStatus::Loaded => vec![WorkflowAction::Ship],
        ReleaseStatus::Shipped => Vec::new(),
    }
}
