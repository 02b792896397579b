//! Input validation for workflow requests.
//!
//! Rejects malformed input with a reason string; callers attach the field name.
//! Nothing here corrects input beyond trimming surrounding whitespace.

use crate::models::{LineItem, StagedItem};

/// Maximum length of free-form text (reasons, truck and BOL numbers)
const MAX_TEXT_LENGTH: usize = 2_000;

/// Maximum length of identifiers (release, item, size and lot ids)
const MAX_ID_LENGTH: usize = 128;

/// Trimmed `value`, rejecting blank or oversized text
pub fn require_text(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("must not be blank".to_string());
    }
    if trimmed.chars().count() > MAX_TEXT_LENGTH {
        return Err(format!("too long (max {MAX_TEXT_LENGTH} characters)"));
    }
    Ok(trimmed.to_string())
}

/// Identifiers are non-blank, bounded, and free of control characters
pub fn validate_identifier(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("must not be blank".to_string());
    }
    if value.len() > MAX_ID_LENGTH {
        return Err(format!("too long: {} bytes (max: {MAX_ID_LENGTH})", value.len()));
    }
    if value.chars().any(char::is_control) {
        return Err("must not contain control characters".to_string());
    }
    Ok(())
}

/// Every line needs an item, a size and a positive quantity
pub fn validate_line_items(items: &[LineItem]) -> Result<(), String> {
    for (index, item) in items.iter().enumerate() {
        validate_item_fields(index, &item.item_id, &item.size_id, item.lot_id.as_deref(), item.quantity)?;
    }
    Ok(())
}

pub fn validate_staged_items(items: &[StagedItem]) -> Result<(), String> {
    for (index, item) in items.iter().enumerate() {
        validate_item_fields(index, &item.item_id, &item.size_id, item.lot_id.as_deref(), item.quantity)?;
    }
    Ok(())
}

fn validate_item_fields(
    index: usize,
    item_id: &str,
    size_id: &str,
    lot_id: Option<&str>,
    quantity: u32,
) -> Result<(), String> {
    validate_identifier(item_id).map_err(|reason| format!("line {index}: itemId {reason}"))?;
    validate_identifier(size_id).map_err(|reason| format!("line {index}: sizeId {reason}"))?;
    if let Some(lot_id) = lot_id {
        validate_identifier(lot_id).map_err(|reason| format!("line {index}: lotId {reason}"))?;
    }
    if quantity == 0 {
        return Err(format!("line {index}: quantity must be greater than zero"));
    }
    Ok(())
}
