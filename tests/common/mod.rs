//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod builders;
pub mod strategies;

pub use builders::*;

use release_workflow::clock::ManualClock;
use release_workflow::config::{RetryConfig, WorkflowConfig};
use release_workflow::events::InMemoryInventory;
use release_workflow::models::{Actor, ReleaseId};
use release_workflow::store::InMemoryDocumentStore;
use release_workflow::ReleaseWorkflowService;
use serde_json::Value;
use std::sync::Arc;

/// Retry settings that keep contention tests fast
pub fn fast_retry_config(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        backoff_factor: 1.5,
        jitter_max_ms: 2,
    }
}

pub fn test_config() -> WorkflowConfig {
    WorkflowConfig {
        retry: fast_retry_config(25),
        ..WorkflowConfig::default()
    }
}

/// Service over an in-memory store with a manual clock and inventory
pub struct TestWorkflow {
    pub service: Arc<ReleaseWorkflowService>,
    pub store: InMemoryDocumentStore,
    pub clock: ManualClock,
    pub inventory: InMemoryInventory,
}

impl TestWorkflow {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: WorkflowConfig) -> Self {
        let store = InMemoryDocumentStore::new();
        let clock = ManualClock::default();
        let inventory = InMemoryInventory::new();
        let service = ReleaseWorkflowService::builder()
            .store(Arc::new(store.clone()))
            .clock(Arc::new(clock.clone()))
            .inventory(Arc::new(inventory.clone()))
            .config(config)
            .build()
            .expect("service should build inside a runtime");

        Self {
            service: Arc::new(service),
            store,
            clock,
            inventory,
        }
    }

    /// Create release `id` in `Entered` with one line item
    pub async fn seed(&self, id: &str) -> ReleaseId {
        self.service
            .create_release(ReleaseBuilder::new(id).build())
            .await
            .expect("release should be created");
        ReleaseId::from(id)
    }

    /// Audit actions recorded for `id`, oldest first, once queued side effects have run
    pub async fn audit_actions(&self, id: &ReleaseId) -> Vec<String> {
        self.audit_entries(id)
            .await
            .iter()
            .filter_map(|entry| entry["action"].as_str().map(str::to_string))
            .collect()
    }

    pub async fn audit_entries(&self, id: &ReleaseId) -> Vec<Value> {
        self.service.flush_side_effects().await;
        self.store
            .collection("auditLogs")
            .into_iter()
            .filter(|entry| entry["releaseId"] == id.as_str())
            .collect()
    }
}

pub fn alice() -> Actor {
    Actor::new("alice", "Alice")
}

pub fn bob() -> Actor {
    Actor::new("bob", "Bob")
}

pub fn supervisor() -> Actor {
    Actor::elevated("sam", "Sam")
}
