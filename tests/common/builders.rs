//! Test data builders for releases and inventory.

use chrono::{DateTime, Duration, Utc};
use release_workflow::events::{InventoryRecord, InventoryStatus};
use release_workflow::models::{LineItem, Release};

pub struct ReleaseBuilder {
    id: String,
    release_number: Option<String>,
    line_items: Vec<LineItem>,
}

impl ReleaseBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            release_number: None,
            line_items: vec![LineItem::new("ITEM-1", "SZ-M", 4)],
        }
    }

    pub fn release_number(mut self, number: &str) -> Self {
        self.release_number = Some(number.to_string());
        self
    }

    pub fn line_items(mut self, line_items: Vec<LineItem>) -> Self {
        self.line_items = line_items;
        self
    }

    pub fn build(self) -> Release {
        let release = Release::new(self.id, self.line_items, Utc::now());
        match self.release_number {
            Some(number) => release.with_release_number(number),
            None => release,
        }
    }
}

pub struct InventoryRecordBuilder {
    record: InventoryRecord,
}

impl InventoryRecordBuilder {
    pub fn new(id: &str, item_id: &str, size_id: &str) -> Self {
        Self {
            record: InventoryRecord {
                id: id.to_string(),
                item_id: item_id.to_string(),
                size_id: size_id.to_string(),
                lot_id: None,
                quantity: 0,
                status: InventoryStatus::Available,
                received_at: Utc::now(),
            },
        }
    }

    pub fn lot(mut self, lot_id: &str) -> Self {
        self.record.lot_id = Some(lot_id.to_string());
        self
    }

    pub fn quantity(mut self, quantity: u64) -> Self {
        self.record.quantity = quantity;
        self
    }

    pub fn status(mut self, status: InventoryStatus) -> Self {
        self.record.status = status;
        self
    }

    pub fn received_days_ago(mut self, days: i64) -> Self {
        self.record.received_at = Utc::now() - Duration::days(days);
        self
    }

    pub fn received_at(mut self, at: DateTime<Utc>) -> Self {
        self.record.received_at = at;
        self
    }

    pub fn build(self) -> InventoryRecord {
        self.record
    }
}
