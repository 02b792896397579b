// Advisory release locks: acquisition, release, status and the stale-lock sweep.

pub mod lock_manager;
pub mod sweeper;

pub use lock_manager::{
    LockDenial, LockError, LockManager, LockOutcome, LockStatus, SweepReport,
};
pub use sweeper::{StaleLockSweeper, SweeperHandle};
