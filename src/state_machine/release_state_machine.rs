use super::{
    actions::{apply_transition, TransitionRecord},
    errors::StateMachineError,
    events::ReleaseEvent,
    guards::{default_guards, validate_event, StateGuard},
};
use crate::clock::Clock;
use crate::models::{Actor, Release, ReleaseId};
use crate::retry::{RetryError, TransactionRetryExecutor};
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Result of a committed transition
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    /// Release as stored after the transition
    pub release: Release,
    pub record: TransitionRecord,
    /// Whether a lock was held (and has now been cleared)
    pub lock_cleared: bool,
}

/// Executes guarded release transitions as single atomic read-modify-writes.
///
/// Every transition also clears whatever lock is held on the release, in the
/// same write. The lock is otherwise ignored: guards look at status only.
#[derive(Clone)]
pub struct ReleaseStateMachine {
    executor: TransactionRetryExecutor,
    clock: Arc<dyn Clock>,
    guards: Arc<Vec<Box<dyn StateGuard>>>,
}

impl std::fmt::Debug for ReleaseStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseStateMachine")
            .field("executor", &self.executor)
            .field(
                "guards",
                &self.guards.iter().map(|g| g.description()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ReleaseStateMachine {
    pub fn new(executor: TransactionRetryExecutor, clock: Arc<dyn Clock>) -> Self {
        Self {
            executor,
            clock,
            guards: Arc::new(default_guards()),
        }
    }

    /// Attempt to transition the release
    #[instrument(skip(self, event, actor), fields(event = event.event_type(), actor_id = %actor.id))]
    pub async fn transition(
        &self,
        release_id: &ReleaseId,
        event: ReleaseEvent,
        actor: &Actor,
    ) -> Result<TransitionOutcome, RetryError<StateMachineError>> {
        let event = validate_event(event)
            .map_err(|err| RetryError::Failed(StateMachineError::Guard(err)))?;
        let operation = event.operation();

        let release_id = release_id.clone();
        let actor = actor.clone();
        let guards = Arc::clone(&self.guards);
        let clock = Arc::clone(&self.clock);

        let outcome = self
            .executor
            .run_with_retry(operation, move |tx| {
                let release_id = release_id.clone();
                let event = event.clone();
                let actor = actor.clone();
                let guards = Arc::clone(&guards);
                let clock = Arc::clone(&clock);
                async move {
                    let mut document = tx.get(&release_id).await?.ok_or_else(|| {
                        StateMachineError::NotFound {
                            release_id: release_id.clone(),
                        }
                    })?;

                    for guard in guards.iter() {
                        guard.check(&document.release, &event, &actor)?;
                    }

                    let record = apply_transition(&mut document.release, &event, &actor, clock.now());
                    let lock_cleared = document.lock.is_held();
                    document.lock.clear();

                    let release = document.release.clone();
                    tx.update(document).await?;

                    Ok::<_, StateMachineError>(TransitionOutcome {
                        release,
                        record,
                        lock_cleared,
                    })
                }
                .boxed()
            })
            .await?;

        debug!(
            release_id = %outcome.release.id,
            from = %outcome.record.from_status,
            to = %outcome.record.to_status,
            lock_cleared = outcome.lock_cleared,
            "Transition committed"
        );
        Ok(outcome)
    }
}
