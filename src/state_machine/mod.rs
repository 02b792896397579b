// Release workflow state machine
//
// Statuses, the edges between them, per-edge guards and the atomic transition
// executor. Side effects of a transition are dispatched by `crate::events`.

pub mod actions;
pub mod errors;
pub mod events;
pub mod guards;
pub mod release_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use actions::{apply_transition, TransitionRecord};
pub use errors::{GuardError, GuardResult, StateMachineError, StateMachineResult};
pub use events::{ReleaseEvent, StagingPayload, ValidatedEvent};
pub use guards::{available_actions, can_user_verify, validate_event, StateGuard, WorkflowAction};
pub use release_state_machine::{ReleaseStateMachine, TransitionOutcome};
pub use states::ReleaseStatus;
