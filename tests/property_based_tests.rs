//! Property-based tests for backoff bounds, transition ordering and
//! inventory decrement planning.

mod common;

use chrono::Utc;
use common::strategies::{inventory_strategy, line_item_strategy};
use proptest::prelude::*;
use release_workflow::config::RetryConfig;
use release_workflow::events::plan_decrement;
use release_workflow::models::{Actor, AuditAction, LineItem, Release};
use release_workflow::retry::TransactionRetryExecutor;
use release_workflow::state_machine::guards::default_guards;
use release_workflow::state_machine::{apply_transition, validate_event, ReleaseEvent};
use release_workflow::store::InMemoryDocumentStore;
use release_workflow::{ReleaseStatus, StagingPayload};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn retry_config_strategy() -> impl Strategy<Value = RetryConfig> {
    (1u32..20, 1u64..500, 0u64..5_000, 1.0f64..4.0, 0u64..200).prop_map(
        |(max_retries, initial, extra, factor, jitter)| RetryConfig {
            max_retries,
            initial_delay_ms: initial,
            max_delay_ms: initial + extra,
            backoff_factor: factor,
            jitter_max_ms: jitter,
        },
    )
}

fn event_strategy() -> impl Strategy<Value = ReleaseEvent> {
    prop_oneof![
        prop::sample::select(vec!["Allied", "Red Ramp", "Dock 2", "Yard"])
            .prop_map(|location| ReleaseEvent::Stage(StagingPayload::at(location))),
        Just(ReleaseEvent::Verify),
        Just(ReleaseEvent::RejectVerification {
            reason: "recount".into()
        }),
        Just(ReleaseEvent::Load {
            truck_number: "TRUCK-1".into()
        }),
        Just(ReleaseEvent::Ship {
            bol_number: "BOL-1".into()
        }),
        Just(ReleaseEvent::UnableToStage {
            reason: "short".into()
        }),
    ]
}

fn actor_strategy() -> impl Strategy<Value = Actor> {
    prop_oneof![
        Just(Actor::new("alice", "Alice")),
        Just(Actor::new("bob", "Bob")),
        Just(Actor::elevated("sam", "Sam")),
    ]
}

fn rank(status: ReleaseStatus) -> usize {
    ReleaseStatus::ALL
        .iter()
        .position(|s| *s == status)
        .unwrap_or_default()
}

proptest! {
    #[test]
    fn test_backoff_stays_within_bounds(config in retry_config_strategy(), attempt in 1u32..40) {
        let base = config.delay_for_attempt(attempt);
        prop_assert!(base <= config.max_delay());
        prop_assert!(base >= config.initial_delay().min(config.max_delay()));

        let next = config.delay_for_attempt(attempt + 1);
        prop_assert!(next >= base);

        let executor = TransactionRetryExecutor::new(
            Arc::new(InMemoryDocumentStore::new()),
            config.clone(),
        );
        let delay = executor.backoff_delay(attempt);
        prop_assert!(delay >= base);
        prop_assert!(delay <= base + Duration::from_millis(config.jitter_max_ms));
    }

    #[test]
    fn test_transitions_only_follow_workflow_edges(
        events in prop::collection::vec((event_strategy(), actor_strategy()), 0..30)
    ) {
        let guards = default_guards();
        let mut release = Release::new("R1", vec![LineItem::new("ITEM-1", "SZ-M", 1)], Utc::now());

        for (event, actor) in events {
            let validated = validate_event(event).expect("generated payloads are valid");
            if guards.iter().any(|guard| guard.check(&release, &validated, &actor).is_err()) {
                continue;
            }

            let before = (release.status, release.pick_ticket_revision);
            let record = apply_transition(&mut release, &validated, &actor, Utc::now());
            let after = (release.status, release.pick_ticket_revision);

            prop_assert_eq!(record.from_status, before.0);
            prop_assert_eq!(record.to_status, after.0);

            if before.0 == after.0 {
                // Only unable-to-stage leaves the status alone.
                prop_assert_eq!(record.action, AuditAction::UnableToStage);
                prop_assert_eq!(before.1, after.1);
            } else {
                prop_assert!(before.0.can_transition_to(after.0));
                if rank(after.0) < rank(before.0) {
                    prop_assert_eq!(after.1, before.1 + 1);
                    prop_assert!(release.staged_by.is_none());
                } else {
                    prop_assert_eq!(after.1, before.1);
                }
            }
        }
    }

    #[test]
    fn test_decrement_plan_respects_inventory(
        records in inventory_strategy(),
        lines in prop::collection::vec(line_item_strategy(), 0..6),
    ) {
        let plan = plan_decrement(&records, &lines);
        let by_id: HashMap<&str, _> = records.iter().map(|r| (r.id.as_str(), r)).collect();

        let mut seen = std::collections::HashSet::new();
        for adjustment in &plan.adjustments {
            prop_assert!(seen.insert(adjustment.record_id.clone()), "adjustments are merged per record");
            let record = by_id[adjustment.record_id.as_str()];
            prop_assert!(adjustment.decrement > 0);
            prop_assert!(adjustment.decrement <= record.quantity);
            prop_assert!(lines.iter().any(|line| record.matches(line)));
        }

        let demand: u64 = lines.iter().map(|line| u64::from(line.quantity)).sum();
        let missing: u64 = plan.shortfalls.iter().map(|s| s.missing).sum();
        prop_assert_eq!(plan.total_decrement() + missing, demand);
    }
}
