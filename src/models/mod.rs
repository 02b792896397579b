pub mod actor;
pub mod audit;
pub mod document;
pub mod lock;
pub mod release;
pub mod workflow_event;

// Re-export core models for easy access
pub use actor::{Actor, ActorRef, ActorRole};
pub use audit::{AuditAction, AuditLogEntry};
pub use document::ReleaseDocument;
pub use lock::LockState;
pub use release::{
    LineItem, Release, ReleaseId, ScanMethod, StagedItem, StagingLocation, StampedReason,
};
pub use workflow_event::{WorkflowEvent, WorkflowEventKind};
