//! End-to-end release workflow scenarios against the in-memory store.

mod common;

use common::*;
use release_workflow::config::{DispatcherConfig, WorkflowConfig};
use release_workflow::events::{AuditSink, SinkError, StoreSideEffectSink};
use release_workflow::models::{Actor, AuditLogEntry, LineItem, ScanMethod, StagedItem, StagingLocation};
use release_workflow::state_machine::StagingPayload;
use release_workflow::store::InMemoryDocumentStore;
use release_workflow::{ReleaseStatus, ReleaseWorkflowService, WorkflowAction, WorkflowError};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_stage_verify_load_scenario() {
    let wf = TestWorkflow::new();
    let id = wf.seed("R1").await;
    let a = alice();
    let b = bob();

    assert!(wf.service.acquire_lock(&id, &a).await.unwrap().is_acquired());
    let staged = wf
        .service
        .stage(&id, StagingPayload::at("Dock 2"), &a)
        .await
        .unwrap();
    assert_eq!(staged.status, ReleaseStatus::Staged);
    assert_eq!(staged.staging_location, Some(StagingLocation::Dock2));
    assert!(staged.was_staged_by("alice"));

    let err = wf.service.verify(&id, &a).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::SelfVerificationDenied { ref actor_id } if actor_id == "alice"
    ));
    assert_eq!(wf.service.get_release(&id).await.unwrap().status, ReleaseStatus::Staged);

    let verified = wf.service.verify(&id, &b).await.unwrap();
    assert_eq!(verified.status, ReleaseStatus::Verified);
    assert_eq!(verified.verified_by.as_ref().map(|v| v.id.as_str()), Some("bob"));

    let loaded = wf.service.load(&id, "  TRUCK-9 ", &a).await.unwrap();
    assert_eq!(loaded.status, ReleaseStatus::Loaded);
    assert_eq!(loaded.truck_number.as_deref(), Some("TRUCK-9"));

    assert_eq!(
        wf.audit_actions(&id).await,
        vec!["LOCK_ACQUIRED", "STAGED", "VERIFIED", "LOADED"]
    );
}

#[tokio::test]
async fn test_transition_clears_lock() {
    let wf = TestWorkflow::new();
    let id = wf.seed("R1").await;

    wf.service.acquire_lock(&id, &alice()).await.unwrap();
    assert!(wf.service.lock_status(&id, "bob").await.unwrap().locked);

    wf.service
        .stage(&id, StagingPayload::at("Yard"), &alice())
        .await
        .unwrap();

    assert!(!wf.service.lock_status(&id, "bob").await.unwrap().locked);
    assert!(wf.service.acquire_lock(&id, &bob()).await.unwrap().is_acquired());
}

#[tokio::test]
async fn test_only_stage_and_unable_to_stage_leave_entered() {
    let wf = TestWorkflow::new();
    let id = wf.seed("R1").await;

    for result in [
        wf.service.verify(&id, &bob()).await,
        wf.service.load(&id, "TRUCK-1", &bob()).await,
        wf.service.ship(&id, "BOL-1", &bob()).await,
        wf.service.reject_verification(&id, "wrong", &bob()).await,
    ] {
        assert!(matches!(
            result,
            Err(WorkflowError::InvalidState {
                current: ReleaseStatus::Entered,
                ..
            })
        ));
    }

    let unable = wf.service.unable_to_stage(&id, "short 2 cases", &alice()).await.unwrap();
    assert_eq!(unable.status, ReleaseStatus::Entered);
    assert_eq!(
        unable.unable_to_stage.as_ref().map(|u| u.reason.as_str()),
        Some("short 2 cases")
    );

    let staged = wf
        .service
        .stage(&id, StagingPayload::at("Allied"), &alice())
        .await
        .unwrap();
    assert_eq!(staged.status, ReleaseStatus::Staged);
}

#[tokio::test]
async fn test_invalid_payloads_are_rejected_not_corrected() {
    let wf = TestWorkflow::new();
    let id = wf.seed("R1").await;

    let missing = wf.service.stage(&id, StagingPayload::default(), &alice()).await;
    assert!(matches!(
        missing,
        Err(WorkflowError::Validation {
            field: "stagingLocation",
            ..
        })
    ));

    let unknown = wf.service.stage(&id, StagingPayload::at("Dock 9"), &alice()).await;
    assert!(matches!(unknown, Err(WorkflowError::Validation { .. })));

    let blank_reason = wf.service.unable_to_stage(&id, "   ", &alice()).await;
    assert!(matches!(
        blank_reason,
        Err(WorkflowError::Validation { field: "reason", .. })
    ));

    assert_eq!(wf.service.get_release(&id).await.unwrap().status, ReleaseStatus::Entered);
    assert!(wf.audit_actions(&id).await.is_empty());
}

#[tokio::test]
async fn test_rejection_round_trip() {
    let wf = TestWorkflow::new();
    let id = wf.seed("R1").await;

    let items = vec![StagedItem {
        item_id: "ITEM-1".into(),
        size_id: "SZ-M".into(),
        lot_id: None,
        quantity: 4,
        scan_method: ScanMethod::Scanned,
    }];
    wf.service
        .stage(&id, StagingPayload::at("Red Ramp").with_items(items), &alice())
        .await
        .unwrap();

    let rejected = wf
        .service
        .reject_verification(&id, "lot mismatch", &bob())
        .await
        .unwrap();
    assert_eq!(rejected.status, ReleaseStatus::Entered);
    assert_eq!(rejected.pick_ticket_revision, 1);
    assert!(rejected.staged_by.is_none());
    assert!(rejected.staged_at.is_none());
    assert!(rejected.staging_location.is_none());

    let entries = wf.audit_entries(&id).await;
    let last = entries.last().unwrap();
    assert_eq!(last["action"], "VERIFICATION_REJECTED");
    assert_eq!(last["oldStatus"], "Staged");
    assert_eq!(last["newStatus"], "Entered");
    assert_eq!(last["details"]["reason"], "lot mismatch");
    assert_eq!(last["details"]["previousStagingLocation"], "Red Ramp");

    // Stage again, reject again: revision only ever grows by one per rejection.
    wf.service
        .stage(&id, StagingPayload::at("Yard"), &alice())
        .await
        .unwrap();
    let again = wf
        .service
        .reject_verification(&id, "still wrong", &bob())
        .await
        .unwrap();
    assert_eq!(again.pick_ticket_revision, 2);

    wf.service.flush_side_effects().await;
    let notifications = wf.store.collection("notifications");
    assert!(notifications
        .iter()
        .any(|n| n["kind"] == "verification_rejected" && n["data"]["reason"] == "still wrong"));
}

#[tokio::test]
async fn test_elevated_stager_may_verify_own_staging() {
    let wf = TestWorkflow::new();
    let id = wf.seed("R1").await;
    let sam = supervisor();

    wf.service
        .stage(&id, StagingPayload::at("Allied"), &sam)
        .await
        .unwrap();
    assert!(wf.service.can_user_verify(&id, &sam).await.unwrap());
    assert!(!wf.service.can_user_verify(&id, &Actor::new("sam", "Sam")).await.unwrap());
    assert_eq!(wf.service.verify(&id, &sam).await.unwrap().status, ReleaseStatus::Verified);
}

#[tokio::test]
async fn test_available_actions_follow_status() {
    let wf = TestWorkflow::new();
    let id = wf.seed("R1").await;

    assert_eq!(
        wf.service.available_actions(&id, &alice()).await.unwrap(),
        vec![WorkflowAction::Stage, WorkflowAction::UnableToStage]
    );

    wf.service
        .stage(&id, StagingPayload::at("Dock 2"), &alice())
        .await
        .unwrap();
    assert!(wf.service.available_actions(&id, &alice()).await.unwrap().is_empty());
    assert_eq!(
        wf.service.available_actions(&id, &bob()).await.unwrap(),
        vec![WorkflowAction::Verify, WorkflowAction::RejectVerification]
    );
}

#[tokio::test]
async fn test_ship_is_terminal() {
    let wf = TestWorkflow::new();
    let id = wf.seed("R1").await;

    wf.service.stage(&id, StagingPayload::at("Yard"), &alice()).await.unwrap();
    wf.service.verify(&id, &bob()).await.unwrap();
    wf.service.load(&id, "TRUCK-4", &alice()).await.unwrap();

    let blank = wf.service.ship(&id, "", &bob()).await;
    assert!(matches!(blank, Err(WorkflowError::Validation { field: "bolNumber", .. })));

    let shipped = wf.service.ship(&id, "BOL-778", &bob()).await.unwrap();
    assert_eq!(shipped.status, ReleaseStatus::Shipped);
    assert_eq!(shipped.bol_number.as_deref(), Some("BOL-778"));
    assert!(wf.service.available_actions(&id, &bob()).await.unwrap().is_empty());

    let again = wf.service.ship(&id, "BOL-779", &bob()).await;
    assert!(matches!(
        again,
        Err(WorkflowError::InvalidState {
            current: ReleaseStatus::Shipped,
            operation: "ship"
        })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_verify_and_reject_have_one_winner() {
    for round in 0..20 {
        let wf = TestWorkflow::new();
        let id = wf.seed(&format!("R{round}")).await;
        wf.service
            .stage(&id, StagingPayload::at("Dock 2"), &alice())
            .await
            .unwrap();

        let verify = {
            let service = Arc::clone(&wf.service);
            let id = id.clone();
            tokio::spawn(async move { service.verify(&id, &bob()).await })
        };
        let reject = {
            let service = Arc::clone(&wf.service);
            let id = id.clone();
            tokio::spawn(async move {
                service
                    .reject_verification(&id, "recount", &Actor::new("carol", "Carol"))
                    .await
            })
        };

        let verify = verify.await.unwrap();
        let reject = reject.await.unwrap();
        assert!(
            verify.is_ok() ^ reject.is_ok(),
            "exactly one should win: {verify:?} / {reject:?}"
        );

        let loser = if verify.is_ok() { reject } else { verify };
        assert!(matches!(loser, Err(WorkflowError::InvalidState { .. })));

        let release = wf.service.get_release(&id).await.unwrap();
        let expected_revision = if release.status == ReleaseStatus::Entered { 1 } else { 0 };
        assert_eq!(release.pick_ticket_revision, expected_revision);
    }
}

struct FailingAuditSink;

#[async_trait::async_trait]
impl AuditSink for FailingAuditSink {
    async fn record(&self, _entry: &AuditLogEntry) -> Result<String, SinkError> {
        Err(SinkError::Rejected("audit backend down".into()))
    }
}

#[tokio::test]
async fn test_failing_audit_sink_does_not_fail_transition() {
    let store = InMemoryDocumentStore::new();
    let service = ReleaseWorkflowService::builder()
        .store(Arc::new(store.clone()))
        .audit_sink(Arc::new(FailingAuditSink))
        .config(test_config())
        .build()
        .unwrap();

    let id = release_workflow::ReleaseId::from("R1");
    service
        .create_release(ReleaseBuilder::new("R1").build())
        .await
        .unwrap();

    let staged = service
        .stage(&id, StagingPayload::at("Allied"), &alice())
        .await
        .unwrap();
    assert_eq!(staged.status, ReleaseStatus::Staged);
    service.flush_side_effects().await;
    assert!(store.collection("auditLogs").is_empty());
    // The workflow event still goes out through its own sink.
    assert_eq!(store.collection("workflowEvents").len(), 1);
}

/// Audit backend that accepts the call and never answers
struct StalledAuditSink;

#[async_trait::async_trait]
impl AuditSink for StalledAuditSink {
    async fn record(&self, _entry: &AuditLogEntry) -> Result<String, SinkError> {
        futures::future::pending().await
    }
}

#[tokio::test]
async fn test_stalled_audit_sink_does_not_delay_transition() {
    let store = InMemoryDocumentStore::new();
    let config = WorkflowConfig {
        dispatcher: DispatcherConfig {
            side_effect_timeout_ms: 50,
            ..DispatcherConfig::default()
        },
        ..test_config()
    };
    let service = ReleaseWorkflowService::builder()
        .store(Arc::new(store.clone()))
        .audit_sink(Arc::new(StalledAuditSink))
        .config(config)
        .build()
        .unwrap();

    let id = release_workflow::ReleaseId::from("R1");
    service
        .create_release(ReleaseBuilder::new("R1").build())
        .await
        .unwrap();

    let staged = tokio::time::timeout(
        Duration::from_secs(2),
        service.stage(&id, StagingPayload::at("Allied"), &alice()),
    )
    .await
    .expect("stage should return without waiting on the audit sink")
    .unwrap();
    assert_eq!(staged.status, ReleaseStatus::Staged);

    // The stalled write is abandoned after the side-effect timeout.
    service.flush_side_effects().await;
    assert!(store.collection("auditLogs").is_empty());
    assert_eq!(store.collection("workflowEvents").len(), 1);
}

#[tokio::test]
async fn test_failing_collection_writes_do_not_fail_transition() {
    let wf = TestWorkflow::new();
    let id = wf.seed("R1").await;
    wf.store.set_collection_writes_failing(true);

    let staged = wf
        .service
        .stage(&id, StagingPayload::at("Yard"), &alice())
        .await
        .unwrap();
    wf.service.flush_side_effects().await;

    assert_eq!(staged.status, ReleaseStatus::Staged);
    assert!(wf.store.collection("workflowEvents").is_empty());
    assert!(wf.store.collection("notifications").is_empty());
}

#[tokio::test]
async fn test_verification_decrements_inventory_oldest_first() {
    let wf = TestWorkflow::new();
    wf.inventory.insert(
        InventoryRecordBuilder::new("INV-NEW", "ITEM-1", "SZ-M")
            .quantity(10)
            .received_days_ago(1)
            .build(),
    );
    wf.inventory.insert(
        InventoryRecordBuilder::new("INV-OLD", "ITEM-1", "SZ-M")
            .quantity(3)
            .received_days_ago(30)
            .build(),
    );
    wf.inventory.insert(
        InventoryRecordBuilder::new("INV-LOT", "ITEM-1", "SZ-M")
            .lot("LOT-A")
            .quantity(50)
            .received_days_ago(60)
            .build(),
    );

    wf.service
        .create_release(
            ReleaseBuilder::new("R1")
                .release_number("100234")
                .line_items(vec![LineItem::new("ITEM-1", "SZ-M", 5)])
                .build(),
        )
        .await
        .unwrap();
    let id = release_workflow::ReleaseId::from("R1");

    wf.service.stage(&id, StagingPayload::at("Dock 2"), &alice()).await.unwrap();
    wf.service.verify(&id, &bob()).await.unwrap();
    wf.service.flush_side_effects().await;

    assert_eq!(wf.inventory.get("INV-OLD").unwrap().quantity, 0);
    assert_eq!(wf.inventory.get("INV-NEW").unwrap().quantity, 8);
    assert_eq!(wf.inventory.get("INV-LOT").unwrap().quantity, 50);

    let events = wf.store.collection("workflowEvents");
    let verified = events.iter().find(|e| e["name"] == "release.verified").unwrap();
    assert_eq!(verified["releaseNumber"], "100234");
    assert_eq!(verified["processed"], false);
}

#[tokio::test]
async fn test_release_with_lock_status() {
    let wf = TestWorkflow::new();
    let id = wf.seed("R1").await;
    wf.service.acquire_lock(&id, &alice()).await.unwrap();

    let view = wf.service.release_with_lock_status(&id, "bob").await.unwrap();
    assert_eq!(view.release.id, id);
    assert!(view.lock_status.locked);
    assert_eq!(view.lock_status.holder.as_deref(), Some("Alice"));

    let own = wf.service.release_with_lock_status(&id, "alice").await.unwrap();
    assert!(!own.lock_status.locked);
}

#[tokio::test]
async fn test_store_sink_is_default() {
    // Sanity check that the default sinks write where consumers look.
    let store = InMemoryDocumentStore::new();
    let sink = StoreSideEffectSink::new(Arc::new(store.clone()));
    let entry = AuditLogEntry::new(
        release_workflow::ReleaseId::from("R1"),
        alice().reference(),
        release_workflow::models::AuditAction::Staged,
        chrono::Utc::now(),
    );
    sink.record(&entry).await.unwrap();
    assert_eq!(store.collection("auditLogs").len(), 1);
}
