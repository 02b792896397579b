//! In-process document store with optimistic, version-checked commits.
//!
//! Each release document carries a version. A transaction remembers the version
//! of every document it reads and the commit is rejected with `Aborted` if any
//! of them moved, which gives the same per-document serializability as the
//! Postgres backend. Fault injection hooks let tests force commit failures and
//! failing collection writes.
//!
//! ```rust
//! use release_workflow::models::{LineItem, Release, ReleaseDocument, ReleaseId};
//! use release_workflow::store::{DocumentStore, InMemoryDocumentStore, StoreErrorKind};
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryDocumentStore::new();
//! let release = Release::new("R-1", vec![LineItem::new("ITEM-1", "SZ-M", 2)], chrono::Utc::now());
//! store.create(ReleaseDocument::new(release)).await.unwrap();
//!
//! store.fail_next_commits(1, StoreErrorKind::Aborted, "write conflict");
//! let tx = store.begin().await.unwrap();
//! assert_eq!(tx.commit().await.unwrap_err().kind, StoreErrorKind::Aborted);
//!
//! let found = store.get(&ReleaseId::from("R-1")).await.unwrap();
//! assert!(found.is_some());
//! # });
//! ```

use super::{DocumentStore, StoreError, StoreErrorKind, StoreResult, StoreTransaction};
use crate::models::{ReleaseDocument, ReleaseId};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Versioned {
    version: u64,
    document: ReleaseDocument,
}

#[derive(Debug, Default)]
struct StoreState {
    releases: HashMap<ReleaseId, Versioned>,
    collections: HashMap<String, Vec<(String, Value)>>,
}

#[derive(Debug, Default)]
struct Faults {
    commit_failures: Mutex<VecDeque<StoreError>>,
    fail_collection_writes: AtomicBool,
    commit_attempts: AtomicU64,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<StoreState>>,
    faults: Arc<Faults>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with `kind`, regardless of conflicts
    pub fn fail_next_commits(&self, count: usize, kind: StoreErrorKind, message: &str) {
        let mut failures = self.faults.commit_failures.lock();
        for _ in 0..count {
            failures.push_back(StoreError::new(kind, message));
        }
    }

    /// Make every non-transactional collection write fail with `Unavailable`
    pub fn set_collection_writes_failing(&self, failing: bool) {
        self.faults
            .fail_collection_writes
            .store(failing, Ordering::SeqCst);
    }

    /// Number of commits attempted so far, successful or not
    pub fn commit_attempts(&self) -> u64 {
        self.faults.commit_attempts.load(Ordering::SeqCst)
    }

    /// Snapshot of a collection in insertion order
    pub fn collection(&self, name: &str) -> Vec<Value> {
        self.state
            .read()
            .collections
            .get(name)
            .map(|docs| docs.iter().map(|(_, doc)| doc.clone()).collect())
            .unwrap_or_default()
    }

    /// Overwrite a document outside of any transaction, bumping its version
    pub fn put(&self, document: ReleaseDocument) {
        let mut state = self.state.write();
        let version = state
            .releases
            .get(document.id())
            .map_or(1, |current| current.version + 1);
        state
            .releases
            .insert(document.id().clone(), Versioned { version, document });
    }

    fn append(state: &mut StoreState, collection: &str, id: String, document: Value) {
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push((id, document));
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            state: Arc::clone(&self.state),
            faults: Arc::clone(&self.faults),
            reads: HashMap::new(),
            writes: HashMap::new(),
            appends: Vec::new(),
        }))
    }

    async fn create(&self, document: ReleaseDocument) -> StoreResult<()> {
        let mut state = self.state.write();
        if state.releases.contains_key(document.id()) {
            return Err(StoreError::already_exists(format!(
                "release {} already exists",
                document.id()
            )));
        }
        state.releases.insert(
            document.id().clone(),
            Versioned {
                version: 1,
                document,
            },
        );
        Ok(())
    }

    async fn get(&self, id: &ReleaseId) -> StoreResult<Option<ReleaseDocument>> {
        Ok(self
            .state
            .read()
            .releases
            .get(id)
            .map(|versioned| versioned.document.clone()))
    }

    async fn find_locked(&self) -> StoreResult<Vec<ReleaseDocument>> {
        let state = self.state.read();
        let mut locked: Vec<ReleaseDocument> = state
            .releases
            .values()
            .filter(|versioned| versioned.document.lock.is_held())
            .map(|versioned| versioned.document.clone())
            .collect();
        locked.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(locked)
    }

    async fn add(&self, collection: &str, document: Value) -> StoreResult<String> {
        if self.faults.fail_collection_writes.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(format!(
                "collection {collection} is not accepting writes"
            )));
        }
        let id = Uuid::new_v4().to_string();
        Self::append(&mut self.state.write(), collection, id.clone(), document);
        Ok(id)
    }
}

struct InMemoryTransaction {
    state: Arc<RwLock<StoreState>>,
    faults: Arc<Faults>,
    /// Version observed per document; 0 when the document was absent
    reads: HashMap<ReleaseId, u64>,
    writes: HashMap<ReleaseId, ReleaseDocument>,
    appends: Vec<(String, String, Value)>,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn get(&mut self, id: &ReleaseId) -> StoreResult<Option<ReleaseDocument>> {
        if let Some(pending) = self.writes.get(id) {
            return Ok(Some(pending.clone()));
        }

        // Let other transactions run between our read and our commit.
        tokio::task::yield_now().await;

        let state = self.state.read();
        let current = state.releases.get(id);
        let observed = current.map_or(0, |versioned| versioned.version);
        self.reads.entry(id.clone()).or_insert(observed);
        Ok(current.map(|versioned| versioned.document.clone()))
    }

    async fn update(&mut self, document: ReleaseDocument) -> StoreResult<()> {
        if !self.reads.contains_key(document.id()) {
            let state = self.state.read();
            let Some(current) = state.releases.get(document.id()) else {
                return Err(StoreError::not_found(format!(
                    "release {} not found",
                    document.id()
                )));
            };
            self.reads.insert(document.id().clone(), current.version);
        }
        self.writes.insert(document.id().clone(), document);
        Ok(())
    }

    async fn add(&mut self, collection: &str, document: Value) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        self.appends
            .push((collection.to_string(), id.clone(), document));
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let Self {
            state,
            faults,
            reads,
            writes,
            appends,
        } = *self;

        faults.commit_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(injected) = faults.commit_failures.lock().pop_front() {
            return Err(injected);
        }

        let mut state = state.write();

        for (id, observed) in &reads {
            let current = state.releases.get(id).map_or(0, |versioned| versioned.version);
            if current != *observed {
                trace!(release_id = %id, observed, current, "Write conflict detected at commit");
                return Err(StoreError::aborted(format!(
                    "concurrent modification of release {id}"
                )));
            }
        }
        if let Some(missing) = writes.keys().find(|id| !state.releases.contains_key(*id)) {
            return Err(StoreError::not_found(format!("release {missing} not found")));
        }

        for (id, document) in writes {
            if let Some(current) = state.releases.get_mut(&id) {
                current.version += 1;
                current.document = document;
            }
        }
        for (collection, id, document) in appends {
            InMemoryDocumentStore::append(&mut state, &collection, id, document);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
