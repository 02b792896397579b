//! # Inventory Decrement
//!
//! When a release is verified its line items leave available stock. Matching
//! records (same item, size and lot, status available) are consumed oldest
//! first until each line is satisfied. Planning is a pure function; applying
//! the plan is best-effort and happens outside any release transaction.

use super::handlers::{HandlerError, WorkflowEventHandler};
use crate::models::{LineItem, WorkflowEvent, WorkflowEventKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryStatus {
    #[default]
    Available,
    OnHold,
    Depleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub id: String,
    pub item_id: String,
    pub size_id: String,
    pub lot_id: Option<String>,
    pub quantity: u64,
    pub status: InventoryStatus,
    pub received_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// Whether this record can satisfy `line`
    pub fn matches(&self, line: &LineItem) -> bool {
        self.status == InventoryStatus::Available
            && self.item_id == line.item_id
            && self.size_id == line.size_id
            && self.lot_id == line.lot_id
    }
}

/// Amount to take off one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAdjustment {
    pub record_id: String,
    pub decrement: u64,
}

/// Quantity of a line that no available record could cover
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub item_id: String,
    pub size_id: String,
    pub lot_id: Option<String>,
    pub missing: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecrementPlan {
    /// One adjustment per touched record, in consumption order
    pub adjustments: Vec<InventoryAdjustment>,
    pub shortfalls: Vec<Shortfall>,
}

impl DecrementPlan {
    pub fn total_decrement(&self) -> u64 {
        self.adjustments.iter().map(|a| a.decrement).sum()
    }
}

/// Plan the consumption of `records` needed to cover `line_items`.
///
/// Records are consumed by `received_at` (then id), skipping empty ones. A
/// record shared by several lines is never taken below zero.
pub fn plan_decrement(records: &[InventoryRecord], line_items: &[LineItem]) -> DecrementPlan {
    let mut ordered: Vec<&InventoryRecord> = records.iter().filter(|r| r.quantity > 0).collect();
    ordered.sort_by(|a, b| a.received_at.cmp(&b.received_at).then_with(|| a.id.cmp(&b.id)));

    let mut remaining: HashMap<&str, u64> =
        ordered.iter().map(|r| (r.id.as_str(), r.quantity)).collect();
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut plan = DecrementPlan::default();

    for line in line_items {
        let mut needed = u64::from(line.quantity);

        for record in ordered.iter().copied().filter(|r| r.matches(line)) {
            if needed == 0 {
                break;
            }
            let Some(left) = remaining.get_mut(record.id.as_str()) else {
                continue;
            };
            let take = needed.min(*left);
            if take == 0 {
                continue;
            }
            *left -= take;
            needed -= take;

            match position.get(record.id.as_str()) {
                Some(&index) => plan.adjustments[index].decrement += take,
                None => {
                    position.insert(record.id.as_str(), plan.adjustments.len());
                    plan.adjustments.push(InventoryAdjustment {
                        record_id: record.id.clone(),
                        decrement: take,
                    });
                }
            }
        }

        if needed > 0 {
            plan.shortfalls.push(Shortfall {
                item_id: line.item_id.clone(),
                size_id: line.size_id.clone(),
                lot_id: line.lot_id.clone(),
                missing: needed,
            });
        }
    }

    plan
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Records for an item and size, any lot and any status
    async fn records_for(&self, item_id: &str, size_id: &str) -> Result<Vec<InventoryRecord>, HandlerError>;

    /// Apply `adjustments`, returning how many records were changed
    async fn apply(&self, adjustments: &[InventoryAdjustment]) -> Result<usize, HandlerError>;
}

/// Concurrent in-process inventory, keyed by record id
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventory {
    records: Arc<DashMap<String, InventoryRecord>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: InventoryRecord) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Option<InventoryRecord> {
        self.records.get(id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventory {
    async fn records_for(&self, item_id: &str, size_id: &str) -> Result<Vec<InventoryRecord>, HandlerError> {
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.item_id == item_id && entry.size_id == size_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn apply(&self, adjustments: &[InventoryAdjustment]) -> Result<usize, HandlerError> {
        let mut applied = 0;
        for adjustment in adjustments {
            let Some(mut record) = self.records.get_mut(&adjustment.record_id) else {
                warn!(record_id = %adjustment.record_id, "Inventory record vanished before decrement");
                continue;
            };
            record.quantity = record.quantity.saturating_sub(adjustment.decrement);
            if record.quantity == 0 {
                record.status = InventoryStatus::Depleted;
            }
            applied += 1;
        }
        Ok(applied)
    }
}

/// Decrements stock for the line items of every verified release
pub struct InventoryDecrementHandler {
    inventory: Arc<dyn InventoryStore>,
}

impl InventoryDecrementHandler {
    pub fn new(inventory: Arc<dyn InventoryStore>) -> Self {
        Self { inventory }
    }
}

#[async_trait]
impl WorkflowEventHandler for InventoryDecrementHandler {
    fn name(&self) -> &'static str {
        "inventory_decrement"
    }

    fn handles(&self, event: &WorkflowEvent) -> bool {
        matches!(event.kind, WorkflowEventKind::Verified { .. })
    }

    async fn handle(&self, event: &WorkflowEvent) -> Result<(), HandlerError> {
        let WorkflowEventKind::Verified { line_items } = &event.kind else {
            return Ok(());
        };

        let keys: BTreeSet<(&str, &str)> = line_items
            .iter()
            .map(|line| (line.item_id.as_str(), line.size_id.as_str()))
            .collect();
        let mut records = Vec::new();
        for (item_id, size_id) in keys {
            records.extend(self.inventory.records_for(item_id, size_id).await?);
        }

        let plan = plan_decrement(&records, line_items);
        for shortfall in &plan.shortfalls {
            warn!(
                release_id = %event.release_id,
                item_id = %shortfall.item_id,
                size_id = %shortfall.size_id,
                lot_id = ?shortfall.lot_id,
                missing = shortfall.missing,
                "Not enough available inventory to cover line item"
            );
        }

        let applied = self.inventory.apply(&plan.adjustments).await?;
        debug!(
            release_id = %event.release_id,
            records = applied,
            total = plan.total_decrement(),
            "📦 Inventory decremented"
        );
        Ok(())
    }
}
