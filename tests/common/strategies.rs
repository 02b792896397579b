use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use release_workflow::events::{InventoryRecord, InventoryStatus};
use release_workflow::models::LineItem;

/// Item ids drawn from a small pool so records and lines actually overlap
pub fn item_id_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["ITEM-1", "ITEM-2", "ITEM-3"]).prop_map(str::to_string)
}

pub fn size_id_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["SZ-S", "SZ-M"]).prop_map(str::to_string)
}

pub fn lot_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::sample::select(vec!["LOT-A", "LOT-B"]).prop_map(str::to_string))
}

pub fn line_item_strategy() -> impl Strategy<Value = LineItem> {
    (item_id_strategy(), size_id_strategy(), lot_strategy(), 1u32..50).prop_map(
        |(item_id, size_id, lot_id, quantity)| LineItem {
            item_id,
            size_id,
            lot_id,
            quantity,
        },
    )
}

pub fn inventory_status_strategy() -> impl Strategy<Value = InventoryStatus> {
    prop_oneof![
        4 => Just(InventoryStatus::Available),
        1 => Just(InventoryStatus::OnHold),
        1 => Just(InventoryStatus::Depleted),
    ]
}

/// Records with unique ids and distinct receipt times
pub fn inventory_strategy() -> impl Strategy<Value = Vec<InventoryRecord>> {
    prop::collection::vec(
        (
            item_id_strategy(),
            size_id_strategy(),
            lot_strategy(),
            0u64..40,
            inventory_status_strategy(),
        ),
        0..12,
    )
    .prop_map(|rows| {
        let epoch = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        rows.into_iter()
            .enumerate()
            .map(|(index, (item_id, size_id, lot_id, quantity, status))| InventoryRecord {
                id: format!("INV-{index:03}"),
                item_id,
                size_id,
                lot_id,
                quantity,
                status,
                received_at: epoch + Duration::hours(index as i64),
            })
            .collect()
    })
}
