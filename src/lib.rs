#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Release Workflow Core
//!
//! Concurrency-safe workflow engine for warehouse releases: goods entered
//! against an order move through staging, verification, loading and shipping,
//! with many workers operating on the same releases at once.
//!
//! ## Overview
//!
//! Every state change is a single atomic read-modify-write against a document
//! store. Write conflicts are expected under load, so each transaction runs
//! through a retry executor with exponential backoff and jitter. Workers claim
//! a release with an advisory, TTL-bounded lock; abandoned locks are reclaimed
//! by later acquirers and by a periodic sweep.
//!
//! ## Module Organization
//!
//! - [`service`] - [`ReleaseWorkflowService`], the public entry point
//! - [`state_machine`] - Statuses, guards and the transition executor
//! - [`locking`] - Lock acquisition, release, status and the stale-lock sweep
//! - [`retry`] - Transaction retry executor and error classification
//! - [`events`] - Side-effect dispatcher, audit/event sinks and handlers
//! - [`store`] - Document store abstraction with in-memory and PostgreSQL backends
//! - [`models`] - Releases, actors, locks, audit entries and workflow events
//! - [`resilience`] - Circuit breaker guarding store access
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use release_workflow::models::{Actor, LineItem, Release, ReleaseId};
//! use release_workflow::state_machine::StagingPayload;
//! use release_workflow::store::InMemoryDocumentStore;
//! use release_workflow::ReleaseWorkflowService;
//! use std::sync::Arc;
//!
//! # async fn example() -> release_workflow::Result<()> {
//! let service = ReleaseWorkflowService::builder()
//!     .store(Arc::new(InMemoryDocumentStore::new()))
//!     .build()?;
//!
//! let id = ReleaseId::from("R-100234");
//! service
//!     .create_release(Release::new(id.clone(), vec![LineItem::new("ITEM-1", "SZ-M", 12)], chrono::Utc::now()))
//!     .await?;
//!
//! let alice = Actor::new("alice", "Alice");
//! let bob = Actor::new("bob", "Bob");
//! service.acquire_lock(&id, &alice).await?;
//! service.stage(&id, StagingPayload::at("Dock 2"), &alice).await?;
//! service.verify(&id, &bob).await?;
//! service.load(&id, "TRUCK-9", &alice).await?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod locking;
pub mod logging;
pub mod models;
pub mod resilience;
pub mod retry;
pub mod service;
pub mod state_machine;
pub mod store;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::WorkflowConfig;
pub use error::{Result, WorkflowError};
pub use locking::{LockDenial, LockOutcome, LockStatus, SweepReport, SweeperHandle};
pub use models::{Actor, ActorRole, LineItem, Release, ReleaseId, StagingLocation};
pub use service::{ReleaseView, ReleaseWorkflowService, ReleaseWorkflowServiceBuilder};
pub use state_machine::{ReleaseStatus, StagingPayload, WorkflowAction};
