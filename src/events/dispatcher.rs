//! # Side-Effect Dispatcher
//!
//! Runs after a transition or lock change has committed. Callers only enqueue:
//! a single worker task writes the audit entry and the workflow event through
//! their sinks, then runs the in-process handlers, each call bounded by the
//! configured side-effect timeout. Nothing in here can fail or delay the
//! committed change: every error is logged and dropped.
//!
//! Dropping the dispatcher closes the queue; the worker drains what is already
//! queued and then stops.

use super::handlers::WorkflowEventHandler;
use super::sink::{AuditSink, EventSink};
use crate::config::DispatcherConfig;
use crate::logging::log_side_effect_failure;
use crate::models::{ActorRef, AuditAction, AuditLogEntry, Actor, ReleaseId, WorkflowEvent};
use crate::state_machine::TransitionOutcome;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

enum SideEffect {
    Transition {
        entry: Box<AuditLogEntry>,
        event: Box<WorkflowEvent>,
    },
    LockAudit(Box<AuditLogEntry>),
    /// Acknowledged once every earlier message has been handled
    Flush(oneshot::Sender<()>),
}

pub struct SideEffectDispatcher {
    sender: mpsc::Sender<SideEffect>,
    handler_names: Vec<&'static str>,
    worker: JoinHandle<()>,
}

impl fmt::Debug for SideEffectDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SideEffectDispatcher")
            .field("handlers", &self.handler_names)
            .field("queue_capacity", &self.sender.max_capacity())
            .finish()
    }
}

impl SideEffectDispatcher {
    /// Create the dispatcher and spawn its worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        audit: Arc<dyn AuditSink>,
        events: Arc<dyn EventSink>,
        handlers: Vec<Arc<dyn WorkflowEventHandler>>,
        config: &DispatcherConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.handler_queue_capacity.max(1));
        let handler_names = handlers.iter().map(|h| h.name()).collect();
        let worker = SideEffectWorker {
            audit,
            events,
            handlers,
            timeout: config.side_effect_timeout(),
        };
        let worker = tokio::spawn(worker.run(receiver));

        Self {
            sender,
            handler_names,
            worker,
        }
    }

    pub fn handler_names(&self) -> &[&'static str] {
        &self.handler_names
    }

    /// Queue every side effect of a committed transition
    pub fn dispatch_transition(&self, outcome: &TransitionOutcome, actor: &Actor) {
        let record = &outcome.record;
        let entry = record.audit_entry(actor);
        let event = record.workflow_event(&outcome.release, actor);
        self.enqueue(
            &outcome.release.id,
            SideEffect::Transition {
                entry: Box::new(entry),
                event: Box::new(event),
            },
        );
    }

    /// Queue the audit entry for a lock acquisition, release or expiry
    pub fn record_lock_event(
        &self,
        release_id: &ReleaseId,
        actor: ActorRef,
        action: AuditAction,
        details: Value,
        at: DateTime<Utc>,
    ) {
        let entry = AuditLogEntry::new(release_id.clone(), actor, action, at).with_details(details);
        self.enqueue(release_id, SideEffect::LockAudit(Box::new(entry)));
    }

    /// Wait until every side effect queued so far has been handled
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(SideEffect::Flush(ack)).await.is_err() {
            warn!("Side-effect worker is gone, nothing to flush");
            return;
        }
        let _ = done.await;
    }

    /// Close the queue and wait for the worker to drain it
    pub async fn shutdown(self) {
        let Self { sender, worker, .. } = self;
        drop(sender);
        if let Err(err) = worker.await {
            warn!(error = %err, "Side-effect worker ended abnormally");
        }
    }

    fn enqueue(&self, release_id: &ReleaseId, effect: SideEffect) {
        match self.sender.try_send(effect) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                log_side_effect_failure("side_effect_queue", release_id.as_str(), "side-effect queue is full, dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log_side_effect_failure("side_effect_queue", release_id.as_str(), "side-effect worker has stopped");
            }
        }
    }
}

struct SideEffectWorker {
    audit: Arc<dyn AuditSink>,
    events: Arc<dyn EventSink>,
    handlers: Vec<Arc<dyn WorkflowEventHandler>>,
    timeout: Duration,
}

impl SideEffectWorker {
    async fn run(self, mut receiver: mpsc::Receiver<SideEffect>) {
        info!(handlers = self.handlers.len(), "🟢 Side-effect worker started");

        while let Some(effect) = receiver.recv().await {
            match effect {
                SideEffect::Transition { entry, event } => {
                    self.write_audit(&entry).await;
                    let release_id = event.release_id.as_str();
                    self.bounded("workflow_event", release_id, self.events.publish(&event))
                        .await;
                    self.run_handlers(&event).await;
                }
                SideEffect::LockAudit(entry) => self.write_audit(&entry).await,
                SideEffect::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }

        info!("🔴 Side-effect worker stopped");
    }

    async fn write_audit(&self, entry: &AuditLogEntry) {
        self.bounded("audit", entry.release_id.as_str(), self.audit.record(entry))
            .await;
    }

    async fn run_handlers(&self, event: &WorkflowEvent) {
        for handler in self.handlers.iter().filter(|h| h.handles(event)) {
            let completed = self
                .bounded(handler.name(), event.release_id.as_str(), handler.handle(event))
                .await;
            if completed {
                debug!(
                    handler = handler.name(),
                    event = %event.name,
                    release_id = %event.release_id,
                    "Handler completed"
                );
            }
        }
    }

    /// Await one side effect under the timeout; failures are logged, never returned
    async fn bounded<T, E, F>(&self, component: &str, release_id: &str, call: F) -> bool
    where
        E: fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                log_side_effect_failure(component, release_id, &err.to_string());
                false
            }
            Err(_) => {
                log_side_effect_failure(
                    component,
                    release_id,
                    &format!("timed out after {}ms", self.timeout.as_millis()),
                );
                false
            }
        }
    }
}
