//! # System Constants
//!
//! Collection names, workflow event names and operational defaults shared by
//! the lock manager, state machine and side-effect dispatcher.

/// Document collections written by the core
pub mod collections {
    pub const AUDIT_LOGS: &str = "auditLogs";
    pub const WORKFLOW_EVENTS: &str = "workflowEvents";
    pub const NOTIFICATIONS: &str = "notifications";
}

/// Names of the workflow events emitted after successful transitions
pub mod events {
    pub const RELEASE_STAGED: &str = "release.staged";
    pub const RELEASE_VERIFIED: &str = "release.verified";
    pub const RELEASE_VERIFICATION_REJECTED: &str = "release.verification_rejected";
    pub const RELEASE_LOADED: &str = "release.loaded";
    pub const RELEASE_SHIPPED: &str = "release.shipped";
    pub const RELEASE_UNABLE_TO_STAGE: &str = "release.unable_to_stage";
}

/// Identity recorded on entries written by background maintenance
pub mod actors {
    pub const SYSTEM_ACTOR_ID: &str = "system";
    pub const SYSTEM_ACTOR_NAME: &str = "System";
}

/// Operational defaults
pub mod system {
    pub const DEFAULT_MAX_RETRIES: u32 = 10;
    pub const DEFAULT_INITIAL_DELAY_MS: u64 = 50;
    pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;
    pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.5;
    pub const DEFAULT_JITTER_MAX_MS: u64 = 100;

    pub const DEFAULT_LOCK_TTL_MS: u64 = 5 * 60 * 1_000;
    pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60 * 1_000;

    pub const DEFAULT_HANDLER_QUEUE_CAPACITY: usize = 1_024;
    pub const DEFAULT_SIDE_EFFECT_TIMEOUT_MS: u64 = 5_000;

    pub const DEFAULT_CIRCUIT_FAILURE_THRESHOLD: u32 = 5;
    pub const DEFAULT_CIRCUIT_RESET_TIMEOUT_MS: u64 = 60 * 1_000;

    /// Case-insensitive fragments that mark an error message as contention
    pub const CONTENTION_PATTERNS: [&str; 6] = [
        "contention",
        "conflict",
        "concurrent",
        "locked",
        "timeout",
        "etimedout",
    ];
}
