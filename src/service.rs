//! # Release Workflow Service
//!
//! The public entry point. Wires the document store, retry executor, lock
//! manager, state machine and side-effect dispatcher together and exposes one
//! method per workflow operation. Construct it once and share it behind an
//! `Arc`.

use crate::clock::{Clock, SystemClock};
use crate::config::WorkflowConfig;
use crate::error::{Result, WorkflowError};
use crate::events::{
    AuditSink, EventSink, InventoryDecrementHandler, InventoryStore, NotificationHandler, Notifier,
    SideEffectDispatcher, StoreNotifier, StoreSideEffectSink, WorkflowEventHandler,
};
use crate::locking::{LockManager, LockOutcome, LockStatus, StaleLockSweeper, SweepReport, SweeperHandle};
use crate::logging::log_transition;
use crate::models::{Actor, Release, ReleaseDocument, ReleaseId};
use crate::resilience::{CircuitBreaker, CircuitBreakerMetrics};
use crate::retry::TransactionRetryExecutor;
use crate::state_machine::{
    self, ReleaseEvent, ReleaseStateMachine, ReleaseStatus, StagingPayload, WorkflowAction,
};
use crate::store::DocumentStore;
use crate::validation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

/// A release together with its lock state as seen by one actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseView {
    pub release: Release,
    pub lock_status: LockStatus,
}

pub struct ReleaseWorkflowService {
    store: Arc<dyn DocumentStore>,
    config: WorkflowConfig,
    state_machine: ReleaseStateMachine,
    lock_manager: Arc<LockManager>,
    dispatcher: Arc<SideEffectDispatcher>,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl fmt::Debug for ReleaseWorkflowService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseWorkflowService")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl ReleaseWorkflowService {
    pub fn builder() -> ReleaseWorkflowServiceBuilder {
        ReleaseWorkflowServiceBuilder::default()
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// Store a new release in `Entered`
    #[instrument(skip(self, release), fields(release_id = %release.id))]
    pub async fn create_release(&self, release: Release) -> Result<Release> {
        validation::validate_identifier(release.id.as_str())
            .map_err(|reason| WorkflowError::validation("id", reason))?;
        validation::validate_line_items(&release.line_items)
            .map_err(|reason| WorkflowError::validation("lineItems", reason))?;
        if release.status != ReleaseStatus::Entered {
            return Err(WorkflowError::validation(
                "status",
                format!("new releases start in Entered, not {}", release.status),
            ));
        }

        self.store.create(ReleaseDocument::new(release.clone())).await?;
        info!(line_items = release.line_items.len(), "Release created");
        Ok(release)
    }

    pub async fn get_release(&self, release_id: &ReleaseId) -> Result<Release> {
        Ok(self.fetch(release_id).await?.release)
    }

    pub async fn acquire_lock(&self, release_id: &ReleaseId, actor: &Actor) -> Result<LockOutcome> {
        self.lock_manager.acquire_lock(release_id, actor).await
    }

    pub async fn release_lock(&self, release_id: &ReleaseId, actor_id: &str) -> Result<bool> {
        self.lock_manager.release_lock(release_id, actor_id).await
    }

    pub async fn lock_status(&self, release_id: &ReleaseId, actor_id: &str) -> Result<LockStatus> {
        self.lock_manager.lock_status(release_id, actor_id).await
    }

    /// The release with its lock state for `actor_id`
    pub async fn release_with_lock_status(
        &self,
        release_id: &ReleaseId,
        actor_id: &str,
    ) -> Result<ReleaseView> {
        let lock_status = self.lock_manager.lock_status(release_id, actor_id).await?;
        let release = self.get_release(release_id).await?;
        Ok(ReleaseView {
            release,
            lock_status,
        })
    }

    #[instrument(skip(self, payload, actor), fields(release_id = %release_id, actor_id = %actor.id))]
    pub async fn stage(
        &self,
        release_id: &ReleaseId,
        payload: StagingPayload,
        actor: &Actor,
    ) -> Result<Release> {
        self.transition(release_id, ReleaseEvent::Stage(payload), actor)
            .await
    }

    /// Record that the release cannot be staged; status is unchanged
    #[instrument(skip(self, reason, actor), fields(release_id = %release_id, actor_id = %actor.id))]
    pub async fn unable_to_stage(
        &self,
        release_id: &ReleaseId,
        reason: &str,
        actor: &Actor,
    ) -> Result<Release> {
        let event = ReleaseEvent::UnableToStage {
            reason: reason.to_string(),
        };
        self.transition(release_id, event, actor).await
    }

    #[instrument(skip(self, actor), fields(release_id = %release_id, actor_id = %actor.id))]
    pub async fn verify(&self, release_id: &ReleaseId, actor: &Actor) -> Result<Release> {
        self.transition(release_id, ReleaseEvent::Verify, actor).await
    }

    /// Send a staged release back to `Entered` with a new pick ticket revision
    #[instrument(skip(self, reason, actor), fields(release_id = %release_id, actor_id = %actor.id))]
    pub async fn reject_verification(
        &self,
        release_id: &ReleaseId,
        reason: &str,
        actor: &Actor,
    ) -> Result<Release> {
        let event = ReleaseEvent::RejectVerification {
            reason: reason.to_string(),
        };
        self.transition(release_id, event, actor).await
    }

    #[instrument(skip(self, truck_number, actor), fields(release_id = %release_id, actor_id = %actor.id))]
    pub async fn load(
        &self,
        release_id: &ReleaseId,
        truck_number: &str,
        actor: &Actor,
    ) -> Result<Release> {
        let event = ReleaseEvent::Load {
            truck_number: truck_number.to_string(),
        };
        self.transition(release_id, event, actor).await
    }

    #[instrument(skip(self, bol_number, actor), fields(release_id = %release_id, actor_id = %actor.id))]
    pub async fn ship(&self, release_id: &ReleaseId, bol_number: &str, actor: &Actor) -> Result<Release> {
        let event = ReleaseEvent::Ship {
            bol_number: bol_number.to_string(),
        };
        self.transition(release_id, event, actor).await
    }

    pub async fn available_actions(
        &self,
        release_id: &ReleaseId,
        actor: &Actor,
    ) -> Result<Vec<WorkflowAction>> {
        let release = self.get_release(release_id).await?;
        Ok(state_machine::available_actions(&release, actor))
    }

    pub async fn can_user_verify(&self, release_id: &ReleaseId, actor: &Actor) -> Result<bool> {
        let release = self.get_release(release_id).await?;
        Ok(state_machine::can_user_verify(&release, actor))
    }

    /// Spawn the periodic stale-lock sweep at the configured interval
    pub fn start_lock_sweeper(&self) -> SweeperHandle {
        StaleLockSweeper::spawn(
            Arc::clone(&self.lock_manager),
            self.config.lock.sweep_interval(),
        )
    }

    /// Run one sweep now
    pub async fn sweep_stale_locks(&self) -> Result<SweepReport> {
        self.lock_manager.sweep_stale_locks().await
    }

    /// Wait until queued audit entries, workflow events and handlers have run
    pub async fn flush_side_effects(&self) {
        self.dispatcher.flush().await;
    }

    pub fn circuit_breaker_metrics(&self) -> Option<CircuitBreakerMetrics> {
        self.circuit_breaker.as_ref().map(|breaker| breaker.metrics())
    }

    async fn fetch(&self, release_id: &ReleaseId) -> Result<ReleaseDocument> {
        self.store
            .get(release_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound {
                release_id: release_id.to_string(),
            })
    }

    async fn transition(
        &self,
        release_id: &ReleaseId,
        event: ReleaseEvent,
        actor: &Actor,
    ) -> Result<Release> {
        let outcome = self
            .state_machine
            .transition(release_id, event, actor)
            .await?;

        log_transition(
            release_id.as_str(),
            outcome.record.action.as_str(),
            outcome.record.from_status.as_str(),
            outcome.record.to_status.as_str(),
            &actor.id,
        );
        self.dispatcher.dispatch_transition(&outcome, actor);

        Ok(outcome.release)
    }
}

/// Assembles a [`ReleaseWorkflowService`] from its collaborators.
///
/// Only the store is required. Audit entries, workflow events and
/// notifications default to collections in that store; inventory decrement
/// is wired only when an inventory store is supplied.
#[derive(Default)]
pub struct ReleaseWorkflowServiceBuilder {
    store: Option<Arc<dyn DocumentStore>>,
    config: WorkflowConfig,
    clock: Option<Arc<dyn Clock>>,
    audit_sink: Option<Arc<dyn AuditSink>>,
    event_sink: Option<Arc<dyn EventSink>>,
    notifier: Option<Arc<dyn Notifier>>,
    inventory: Option<Arc<dyn InventoryStore>>,
    handlers: Vec<Arc<dyn WorkflowEventHandler>>,
}

impl ReleaseWorkflowServiceBuilder {
    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn inventory(mut self, inventory: Arc<dyn InventoryStore>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    /// Register an additional workflow event handler
    pub fn handler(mut self, handler: Arc<dyn WorkflowEventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Build the service. Spawns the side-effect worker, so this must run
    /// inside a Tokio runtime.
    pub fn build(self) -> Result<ReleaseWorkflowService> {
        let store = self
            .store
            .ok_or_else(|| WorkflowError::Configuration("a document store is required".to_string()))?;
        self.config.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(WorkflowError::Configuration(
                "ReleaseWorkflowService must be built inside a Tokio runtime".to_string(),
            ));
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store_sink = Arc::new(StoreSideEffectSink::new(Arc::clone(&store)));
        let audit_sink: Arc<dyn AuditSink> = match self.audit_sink {
            Some(sink) => sink,
            None => store_sink.clone(),
        };
        let event_sink: Arc<dyn EventSink> = match self.event_sink {
            Some(sink) => sink,
            None => store_sink,
        };
        let notifier: Arc<dyn Notifier> = match self.notifier {
            Some(notifier) => notifier,
            None => Arc::new(StoreNotifier::new(Arc::clone(&store))),
        };

        let mut handlers: Vec<Arc<dyn WorkflowEventHandler>> =
            vec![Arc::new(NotificationHandler::new(notifier))];
        if let Some(inventory) = self.inventory {
            handlers.push(Arc::new(InventoryDecrementHandler::new(inventory)));
        }
        handlers.extend(self.handlers);

        let dispatcher = Arc::new(SideEffectDispatcher::new(
            audit_sink,
            event_sink,
            handlers,
            &self.config.dispatcher,
        ));

        let mut executor = TransactionRetryExecutor::new(Arc::clone(&store), self.config.retry.clone());
        let circuit_breaker = if self.config.circuit_breaker.enabled {
            let breaker = Arc::new(CircuitBreaker::new(
                "document_store",
                self.config.circuit_breaker.clone(),
            ));
            executor = executor.with_circuit_breaker(Arc::clone(&breaker));
            Some(breaker)
        } else {
            None
        };

        let lock_manager = Arc::new(LockManager::new(
            executor.clone(),
            Arc::clone(&clock),
            self.config.lock.clone(),
            Arc::clone(&dispatcher),
        ));
        let state_machine = ReleaseStateMachine::new(executor, clock);

        info!(
            handlers = ?dispatcher.handler_names(),
            circuit_breaker = circuit_breaker.is_some(),
            lock_ttl_ms = self.config.lock.ttl_ms,
            "🔧 Release workflow service ready"
        );

        Ok(ReleaseWorkflowService {
            store,
            config: self.config,
            state_machine,
            lock_manager,
            dispatcher,
            circuit_breaker,
        })
    }
}
