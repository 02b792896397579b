//! # Transaction Retry Executor
//!
//! Runs a read-modify-write closure inside a store transaction
//! (begin → operation → commit) and repeats the whole cycle when the attempt
//! fails for a transient reason. The executor knows nothing about releases; the
//! lock manager and the state machine both go through it.
//!
//! Attempt `n` (1-based) that fails retryably sleeps for
//! `min(max_delay, initial_delay * backoff_factor^(n-1)) + uniform(0, jitter_max)`
//! before the next attempt. After `max_retries` retryable failures the last
//! cause is returned wrapped in [`RetryError::Exhausted`].

use super::classifier::{ClassifiableError, ErrorClassifier, StandardErrorClassifier};
use crate::config::RetryConfig;
use crate::resilience::CircuitBreaker;
use crate::store::{DocumentStore, StoreError, StoreTransaction};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The operation failed permanently; retrying would not help
    #[error(transparent)]
    Failed(E),

    #[error("Transaction failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    #[error("Circuit breaker open for {component}")]
    CircuitOpen { component: String },
}

impl<E> RetryError<E> {
    /// The underlying operation error, if an attempt was made
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Failed(err) | Self::Exhausted { last: err, .. } => Some(err),
            Self::CircuitOpen { .. } => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Boxed transactional operation, for running heterogeneous operations in sequence
pub type BoxedOperation<T, E> = Box<
    dyn for<'t> FnMut(&'t mut dyn StoreTransaction) -> BoxFuture<'t, Result<T, E>> + Send,
>;

/// Box a transactional closure as a [`BoxedOperation`]
pub fn boxed_operation<T, E, F>(operation: F) -> BoxedOperation<T, E>
where
    F: for<'t> FnMut(&'t mut dyn StoreTransaction) -> BoxFuture<'t, Result<T, E>>
        + Send
        + 'static,
{
    Box::new(operation)
}

/// Per-operation results of [`TransactionRetryExecutor::run_sequential`]
#[derive(Debug)]
pub struct SequentialOutcome<T, E> {
    pub results: Vec<Result<T, RetryError<E>>>,
    /// Set when `stop_on_failure` cut the run short
    pub stopped_early: bool,
}

impl<T, E> SequentialOutcome<T, E> {
    pub fn all_succeeded(&self) -> bool {
        !self.stopped_early && self.results.iter().all(Result::is_ok)
    }
}

#[derive(Clone)]
pub struct TransactionRetryExecutor {
    store: Arc<dyn DocumentStore>,
    config: RetryConfig,
    classifier: Arc<dyn ErrorClassifier>,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl fmt::Debug for TransactionRetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionRetryExecutor")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("circuit_breaker", &self.circuit_breaker.as_ref().map(|cb| cb.name()))
            .finish()
    }
}

impl TransactionRetryExecutor {
    pub fn new(store: Arc<dyn DocumentStore>, config: RetryConfig) -> Self {
        Self {
            store,
            config,
            classifier: Arc::new(StandardErrorClassifier::new()),
            circuit_breaker: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Guard every run with `breaker`
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Backoff for the 1-based `attempt`, including jitter
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let jitter_ms = fastrand::u64(0..=self.config.jitter_max_ms);
        self.config.delay_for_attempt(attempt) + Duration::from_millis(jitter_ms)
    }

    /// Execute `operation` in a transaction, retrying transient failures.
    ///
    /// The closure is called once per attempt with a fresh transaction and must
    /// not carry state between attempts. Errors the classifier deems permanent
    /// are returned as [`RetryError::Failed`] after a single attempt.
    pub async fn run_with_retry<T, E, F>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        T: Send,
        E: ClassifiableError + From<StoreError>,
        F: for<'t> FnMut(&'t mut dyn StoreTransaction) -> BoxFuture<'t, Result<T, E>> + Send,
    {
        self.execute(operation_name, self.circuit_breaker.as_deref(), operation)
            .await
    }

    /// Like [`run_with_retry`](Self::run_with_retry), but guarded by `breaker`
    /// instead of the executor's own breaker. While the breaker is open the
    /// call fails fast with [`RetryError::CircuitOpen`] without touching the
    /// store.
    pub async fn run_with_circuit_breaker<T, E, F>(
        &self,
        breaker: &CircuitBreaker,
        operation_name: &str,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        T: Send,
        E: ClassifiableError + From<StoreError>,
        F: for<'t> FnMut(&'t mut dyn StoreTransaction) -> BoxFuture<'t, Result<T, E>> + Send,
    {
        self.execute(operation_name, Some(breaker), operation).await
    }

    /// Run `operations` one after another, each with its own retry budget.
    pub async fn run_sequential<T, E>(
        &self,
        operation_name: &str,
        operations: Vec<BoxedOperation<T, E>>,
        stop_on_failure: bool,
    ) -> SequentialOutcome<T, E>
    where
        T: Send,
        E: ClassifiableError + From<StoreError>,
    {
        let total = operations.len();
        let mut results = Vec::with_capacity(total);
        let mut stopped_early = false;

        for (index, operation) in operations.into_iter().enumerate() {
            let result = self.run_with_retry(operation_name, operation).await;
            let failed = result.is_err();
            results.push(result);

            if failed && stop_on_failure {
                stopped_early = index + 1 < total;
                debug!(
                    operation = operation_name,
                    index,
                    remaining = total - index - 1,
                    "Stopping sequential run after failure"
                );
                break;
            }
        }

        SequentialOutcome {
            results,
            stopped_early,
        }
    }

    async fn execute<T, E, F>(
        &self,
        operation_name: &str,
        breaker: Option<&CircuitBreaker>,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        T: Send,
        E: ClassifiableError + From<StoreError>,
        F: for<'t> FnMut(&'t mut dyn StoreTransaction) -> BoxFuture<'t, Result<T, E>> + Send,
    {
        if let Some(breaker) = breaker {
            if !breaker.try_acquire() {
                debug!(operation = operation_name, component = breaker.name(), "Circuit open, failing fast");
                return Err(RetryError::CircuitOpen {
                    component: breaker.name().to_string(),
                });
            }
        }

        let max_attempts = self.config.max_retries.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let err = match self.attempt(&mut operation).await {
                Ok(value) => {
                    if let Some(breaker) = breaker {
                        breaker.record_success();
                    }
                    if attempt > 1 {
                        debug!(operation = operation_name, attempt, "Transaction succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let category = self.classifier.classify(&err);
            if !category.is_retryable() {
                if let Some(breaker) = breaker {
                    // Business-rule rejections mean the store itself is healthy.
                    if err.is_domain_error() {
                        breaker.record_success();
                    } else {
                        breaker.record_failure();
                    }
                }
                debug!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Transaction failed with non-retryable error"
                );
                return Err(RetryError::Failed(err));
            }

            if attempt >= max_attempts {
                if let Some(breaker) = breaker {
                    breaker.record_failure();
                }
                warn!(
                    operation = operation_name,
                    attempts = attempt,
                    error = %err,
                    "Transaction retries exhausted"
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.backoff_delay(attempt);
            debug!(
                operation = operation_name,
                attempt,
                max_attempts,
                category = %category,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying transaction"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt<T, E, F>(&self, operation: &mut F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: for<'t> FnMut(&'t mut dyn StoreTransaction) -> BoxFuture<'t, Result<T, E>> + Send,
    {
        let mut tx = self.store.begin().await.map_err(E::from)?;
        match operation(tx.as_mut()).await {
            Ok(value) => {
                tx.commit().await.map_err(E::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    debug!(error = %rollback_err, "Rollback after failed attempt also failed");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Release, ReleaseDocument, ReleaseId};
    use crate::store::{InMemoryDocumentStore, StoreErrorKind};
    use chrono::Utc;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_factor: 2.0,
            jitter_max_ms: 0,
        }
    }

    fn executor(store: &InMemoryDocumentStore, max_retries: u32) -> TransactionRetryExecutor {
        TransactionRetryExecutor::new(Arc::new(store.clone()), fast_config(max_retries))
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_commit_failures() {
        let store = InMemoryDocumentStore::new();
        store.put(ReleaseDocument::new(Release::new("R1", vec![], Utc::now())));
        store.fail_next_commits(2, StoreErrorKind::Aborted, "write conflict");

        let id = ReleaseId::from("R1");
        let result: Result<bool, RetryError<StoreError>> = executor(&store, 5)
            .run_with_retry("read", |tx| {
                let id = id.clone();
                async move { Ok(tx.get(&id).await?.is_some()) }.boxed()
            })
            .await;

        assert!(result.unwrap());
        assert_eq!(store.commit_attempts(), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_attempted_once() {
        let store = InMemoryDocumentStore::new();
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let result: Result<(), RetryError<StoreError>> = executor(&store, 5)
            .run_with_retry("deny", move |_tx| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(StoreError::new(StoreErrorKind::PermissionDenied, "no")) }.boxed()
            })
            .await;

        assert!(matches!(result, Err(RetryError::Failed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let store = InMemoryDocumentStore::new();
        store.fail_next_commits(10, StoreErrorKind::Unavailable, "backend restarting");

        let result: Result<(), RetryError<StoreError>> = executor(&store, 3)
            .run_with_retry("noop", |_tx| async { Ok(()) }.boxed())
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last.kind, StoreErrorKind::Unavailable);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(store.commit_attempts(), 3);
    }

    #[tokio::test]
    async fn test_sequential_stops_on_first_failure() {
        let store = InMemoryDocumentStore::new();
        let ops: Vec<BoxedOperation<u32, StoreError>> = vec![
            boxed_operation(|_tx| async { Ok(1) }.boxed()),
            boxed_operation(|_tx| {
                async { Err(StoreError::new(StoreErrorKind::InvalidArgument, "bad")) }.boxed()
            }),
            boxed_operation(|_tx| async { Ok(3) }.boxed()),
        ];

        let outcome = executor(&store, 2).run_sequential("batch", ops, true).await;
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.stopped_early);
        assert!(!outcome.all_succeeded());
    }

    #[tokio::test]
    async fn test_open_breaker_fails_fast() {
        let store = InMemoryDocumentStore::new();
        let breaker = CircuitBreaker::new(
            "store",
            crate::config::CircuitBreakerConfig {
                enabled: true,
                failure_threshold: 1,
                reset_timeout_ms: 60_000,
                success_threshold: 1,
            },
        );
        breaker.force_open();

        let result: Result<(), RetryError<StoreError>> = executor(&store, 3)
            .run_with_circuit_breaker(&breaker, "noop", |_tx| async { Ok(()) }.boxed())
            .await;

        assert!(matches!(result, Err(RetryError::CircuitOpen { .. })));
        assert_eq!(store.commit_attempts(), 0);
    }

    #[test]
    fn test_backoff_delay_stays_within_bounds() {
        let store = InMemoryDocumentStore::new();
        let exec = TransactionRetryExecutor::new(Arc::new(store), RetryConfig::default());
        for attempt in 1..=20 {
            let delay = exec.backoff_delay(attempt);
            let base = exec.config().delay_for_attempt(attempt);
            assert!(delay >= base);
            assert!(delay <= base + Duration::from_millis(100));
        }
    }
}
