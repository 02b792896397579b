//! # Lock Manager
//!
//! Advisory, TTL-bounded locks stored on the release document itself. Every
//! read-modify-write goes through the retry executor so concurrent acquirers
//! observe a linear order: exactly one of them sees the lock free and wins.
//!
//! A lock whose age reaches the TTL no longer blocks anyone. It is reclaimed
//! by the next acquirer, by a status check, or by the periodic sweep.

use crate::clock::Clock;
use crate::config::LockConfig;
use crate::error::{Result, WorkflowError};
use crate::events::SideEffectDispatcher;
use crate::logging::log_lock_operation;
use crate::models::{Actor, ActorRef, AuditAction, ReleaseId};
use crate::retry::{ClassifiableError, RetryError, TransactionRetryExecutor};
use crate::store::{StoreError, StoreErrorKind};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Failures inside a lock transaction
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Release {release_id} not found")]
    NotFound { release_id: ReleaseId },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClassifiableError for LockError {
    fn store_kind(&self) -> Option<StoreErrorKind> {
        match self {
            Self::Store(err) => Some(err.kind),
            Self::NotFound { .. } => None,
        }
    }

    fn is_domain_error(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    fn into_store_error(self) -> StoreError {
        match self {
            Self::Store(err) => err,
            other => StoreError::internal(other.to_string()),
        }
    }
}

impl From<LockError> for WorkflowError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::NotFound { release_id } => Self::NotFound {
                release_id: release_id.to_string(),
            },
            LockError::Store(err) => Self::Store(err),
        }
    }
}

impl From<RetryError<LockError>> for WorkflowError {
    fn from(err: RetryError<LockError>) -> Self {
        match err {
            RetryError::Failed(inner) => inner.into(),
            RetryError::Exhausted { attempts, last } => Self::Contention {
                attempts,
                source: last.into_store_error(),
            },
            RetryError::CircuitOpen { component } => Self::CircuitOpen { component },
        }
    }
}

/// Why a lock was not granted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum LockDenial {
    AlreadyLocked {
        holder: ActorRef,
        acquired_at: Option<DateTime<Utc>>,
    },
    /// Retries ran out before the lock could be read and written atomically
    Contention { attempts: u32 },
    /// The store's circuit breaker is open; nothing was attempted
    Unavailable { component: String },
}

impl LockDenial {
    pub fn message(&self) -> String {
        match self {
            Self::AlreadyLocked { holder, .. } => format!("Release is locked by {}", holder.name),
            Self::Contention { .. } => "Release is locked by another user".to_string(),
            Self::Unavailable { .. } => "Release store is temporarily unavailable".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LockOutcome {
    Acquired {
        holder: ActorRef,
        acquired_at: DateTime<Utc>,
        /// The caller already held the lock and refreshed it
        renewed: bool,
    },
    Denied(LockDenial),
}

impl LockOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired { .. })
    }

    /// Holder after the call, when known
    pub fn holder_name(&self) -> Option<&str> {
        match self {
            Self::Acquired { holder, .. }
            | Self::Denied(LockDenial::AlreadyLocked { holder, .. }) => Some(holder.name.as_str()),
            Self::Denied(LockDenial::Contention { .. } | LockDenial::Unavailable { .. }) => None,
        }
    }
}

/// Lock state as seen by one actor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    /// Locked by someone other than the caller
    pub locked: bool,
    pub holder: Option<String>,
    pub acquired_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Locked releases inspected
    pub scanned: usize,
    pub cleared: usize,
    pub failed: usize,
}

enum AcquireDecision {
    Granted {
        holder: ActorRef,
        acquired_at: DateTime<Utc>,
        renewed: bool,
        reclaimed_from: Option<ActorRef>,
    },
    Held {
        holder: ActorRef,
        acquired_at: Option<DateTime<Utc>>,
    },
}

struct StatusRead {
    status: LockStatus,
    reclaimed_from: Option<ActorRef>,
}

#[derive(Debug)]
pub struct LockManager {
    executor: TransactionRetryExecutor,
    clock: Arc<dyn Clock>,
    config: LockConfig,
    dispatcher: Arc<SideEffectDispatcher>,
}

impl LockManager {
    pub fn new(
        executor: TransactionRetryExecutor,
        clock: Arc<dyn Clock>,
        config: LockConfig,
        dispatcher: Arc<SideEffectDispatcher>,
    ) -> Self {
        Self {
            executor,
            clock,
            config,
            dispatcher,
        }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Grant the lock to `actor` if it is free, already theirs, or expired.
    ///
    /// Contention and an open circuit breaker are reported as denials, never
    /// as errors.
    #[instrument(skip(self, actor), fields(release_id = %release_id, actor_id = %actor.id))]
    pub async fn acquire_lock(&self, release_id: &ReleaseId, actor: &Actor) -> Result<LockOutcome> {
        let ttl = self.config.ttl();
        let id = release_id.clone();
        let requester = actor.reference();
        let clock = Arc::clone(&self.clock);

        let result = self
            .executor
            .run_with_retry("acquire_lock", move |tx| {
                let id = id.clone();
                let requester = requester.clone();
                let clock = Arc::clone(&clock);
                async move {
                    let mut document = tx
                        .get(&id)
                        .await?
                        .ok_or_else(|| LockError::NotFound { release_id: id.clone() })?;
                    let now = clock.now();
                    let lock = &mut document.lock;

                    if lock.blocks(&requester.id, now, ttl) {
                        return Ok::<_, LockError>(AcquireDecision::Held {
                            holder: lock.holder.clone().unwrap_or_else(ActorRef::system),
                            acquired_at: lock.acquired_at,
                        });
                    }

                    let renewed = lock.is_held_by(&requester.id);
                    let reclaimed_from = lock.holder.clone().filter(|_| !renewed);
                    lock.grant(requester.clone(), now);
                    tx.update(document).await?;

                    Ok(AcquireDecision::Granted {
                        holder: requester,
                        acquired_at: now,
                        renewed,
                        reclaimed_from,
                    })
                }
                .boxed()
            })
            .await;

        let decision = match result {
            Ok(decision) => decision,
            Err(RetryError::Exhausted { attempts, last }) => {
                warn!(attempts, error = %last, "Lock acquisition gave up under contention");
                log_lock_operation(release_id.as_str(), "acquire", Some(actor.id.as_str()), "denied_contention");
                return Ok(LockOutcome::Denied(LockDenial::Contention { attempts }));
            }
            Err(RetryError::CircuitOpen { component }) => {
                log_lock_operation(release_id.as_str(), "acquire", Some(actor.id.as_str()), "denied_unavailable");
                return Ok(LockOutcome::Denied(LockDenial::Unavailable { component }));
            }
            Err(err) => return Err(err.into()),
        };

        match decision {
            AcquireDecision::Held {
                holder,
                acquired_at,
            } => {
                log_lock_operation(release_id.as_str(), "acquire", Some(actor.id.as_str()), "denied_locked");
                Ok(LockOutcome::Denied(LockDenial::AlreadyLocked {
                    holder,
                    acquired_at,
                }))
            }
            AcquireDecision::Granted {
                holder,
                acquired_at,
                renewed,
                reclaimed_from,
            } => {
                log_lock_operation(
                    release_id.as_str(),
                    "acquire",
                    Some(actor.id.as_str()),
                    if renewed { "renewed" } else { "acquired" },
                );
                if !renewed {
                    let details = match &reclaimed_from {
                        Some(previous) => json!({ "reclaimedFrom": previous }),
                        None => json!({}),
                    };
                    self.dispatcher
                        .record_lock_event(release_id, holder.clone(), AuditAction::LockAcquired, details, acquired_at);
                }
                Ok(LockOutcome::Acquired {
                    holder,
                    acquired_at,
                    renewed,
                })
            }
        }
    }

    /// Clear the lock if `actor_id` holds it; anything else is a silent no-op.
    ///
    /// Returns whether a lock was cleared.
    #[instrument(skip(self), fields(release_id = %release_id))]
    pub async fn release_lock(&self, release_id: &ReleaseId, actor_id: &str) -> Result<bool> {
        let id = release_id.clone();
        let owner = actor_id.to_string();

        let released: Option<ActorRef> = self
            .executor
            .run_with_retry("release_lock", move |tx| {
                let id = id.clone();
                let owner = owner.clone();
                async move {
                    let mut document = tx
                        .get(&id)
                        .await?
                        .ok_or_else(|| LockError::NotFound { release_id: id.clone() })?;
                    if !document.lock.is_held_by(&owner) {
                        return Ok::<_, LockError>(None);
                    }
                    let holder = document.lock.holder.take();
                    document.lock.clear();
                    tx.update(document).await?;
                    Ok(holder)
                }
                .boxed()
            })
            .await?;

        match released {
            Some(holder) => {
                log_lock_operation(release_id.as_str(), "release", Some(actor_id), "released");
                self.dispatcher
                    .record_lock_event(release_id, holder, AuditAction::LockReleased, json!({}), self.clock.now());
                Ok(true)
            }
            None => {
                debug!(actor_id, "Release lock requested by non-holder, ignoring");
                Ok(false)
            }
        }
    }

    /// Whether someone other than `actor_id` holds the lock.
    ///
    /// An expired foreign lock is reported as unlocked and cleared on the way.
    #[instrument(skip(self), fields(release_id = %release_id))]
    pub async fn lock_status(&self, release_id: &ReleaseId, actor_id: &str) -> Result<LockStatus> {
        let ttl = self.config.ttl();
        let id = release_id.clone();
        let viewer = actor_id.to_string();
        let clock = Arc::clone(&self.clock);

        let read = self
            .executor
            .run_with_retry("lock_status", move |tx| {
                let id = id.clone();
                let viewer = viewer.clone();
                let clock = Arc::clone(&clock);
                async move {
                    let mut document = tx
                        .get(&id)
                        .await?
                        .ok_or_else(|| LockError::NotFound { release_id: id.clone() })?;
                    let now = clock.now();
                    let lock = &document.lock;

                    if lock.blocks(&viewer, now, ttl) {
                        return Ok::<_, LockError>(StatusRead {
                            status: LockStatus {
                                locked: true,
                                holder: lock.holder.as_ref().map(|h| h.name.clone()),
                                acquired_at: lock.acquired_at,
                            },
                            reclaimed_from: None,
                        });
                    }

                    let expired_foreign = lock.is_held() && !lock.is_held_by(&viewer);
                    if !expired_foreign {
                        return Ok(StatusRead {
                            status: LockStatus::default(),
                            reclaimed_from: None,
                        });
                    }

                    let previous = document.lock.holder.clone();
                    document.lock.clear();
                    tx.update(document).await?;
                    Ok(StatusRead {
                        status: LockStatus::default(),
                        reclaimed_from: previous,
                    })
                }
                .boxed()
            })
            .await?;

        if let Some(previous) = read.reclaimed_from {
            info!(previous_holder = %previous, "Reclaimed expired lock during status check");
            self.dispatcher.record_lock_event(
                release_id,
                ActorRef::system(),
                AuditAction::LockExpired,
                json!({ "previousHolder": previous }),
                self.clock.now(),
            );
        }
        Ok(read.status)
    }

    /// Clear every lock whose age has reached the TTL.
    ///
    /// Expiry is checked again inside each clearing transaction, so a lock
    /// re-acquired since the scan survives.
    #[instrument(skip(self))]
    pub async fn sweep_stale_locks(&self) -> Result<SweepReport> {
        let ttl = self.config.ttl();
        let scan_time = self.clock.now();
        let locked = self.executor.store().find_locked().await?;

        let mut report = SweepReport {
            scanned: locked.len(),
            ..SweepReport::default()
        };

        for document in locked.iter().filter(|doc| doc.lock.is_expired(scan_time, ttl)) {
            let id = document.id().clone();
            let key = id.clone();
            let clock = Arc::clone(&self.clock);
            let result = self
                .executor
                .run_with_retry("sweep_stale_lock", move |tx| {
                    let key = key.clone();
                    let clock = Arc::clone(&clock);
                    async move {
                        let Some(mut current) = tx.get(&key).await? else {
                            return Ok::<_, LockError>(None);
                        };
                        if !current.lock.is_held() || !current.lock.is_expired(clock.now(), ttl) {
                            return Ok(None);
                        }
                        let previous = current.lock.holder.clone();
                        current.lock.clear();
                        tx.update(current).await?;
                        Ok(previous)
                    }
                    .boxed()
                })
                .await;

            match result {
                Ok(Some(previous)) => {
                    report.cleared += 1;
                    log_lock_operation(id.as_str(), "sweep", Some(previous.id.as_str()), "expired");
                    self.dispatcher.record_lock_event(
                        &id,
                        ActorRef::system(),
                        AuditAction::LockExpired,
                        json!({ "previousHolder": previous }),
                        self.clock.now(),
                    );
                }
                Ok(None) => debug!(release_id = %id, "Lock changed since scan, leaving it"),
                Err(err) => {
                    report.failed += 1;
                    warn!(release_id = %id, error = %err, "Failed to clear stale lock");
                }
            }
        }

        if report.cleared > 0 || report.failed > 0 {
            info!(
                scanned = report.scanned,
                cleared = report.cleared,
                failed = report.failed,
                "🧹 Stale lock sweep finished"
            );
        }
        Ok(report)
    }
}
