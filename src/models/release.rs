//! # Release Model
//!
//! The unit of work moving through the warehouse: goods that are staged at a
//! location, verified by a second worker, loaded onto a truck and shipped.
//!
//! A release carries only business state. The advisory lock fields live in
//! [`LockState`](super::LockState) and are merged with the release only at the
//! storage layer (see [`ReleaseDocument`](super::ReleaseDocument)), so
//! transition code cannot come to depend on lock internals.

use super::actor::ActorRef;
use crate::state_machine::ReleaseStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a release document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseId(String);

impl ReleaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReleaseId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ReleaseId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Places where a release may be staged before verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StagingLocation {
    Allied,
    #[serde(rename = "Red Ramp")]
    RedRamp,
    #[serde(rename = "Dock 2")]
    Dock2,
    Yard,
}

impl StagingLocation {
    pub const ALL: [StagingLocation; 4] = [Self::Allied, Self::RedRamp, Self::Dock2, Self::Yard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allied => "Allied",
            Self::RedRamp => "Red Ramp",
            Self::Dock2 => "Dock 2",
            Self::Yard => "Yard",
        }
    }
}

impl fmt::Display for StagingLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StagingLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|location| location.as_str() == s.trim())
            .ok_or_else(|| format!("Invalid staging location: {s}"))
    }
}

/// How a staged item was captured on the floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScanMethod {
    #[default]
    Scanned,
    Manual,
}

/// Ordered line of a release: what must ship and how much of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub item_id: String,
    pub size_id: String,
    #[serde(default)]
    pub lot_id: Option<String>,
    pub quantity: u32,
}

impl LineItem {
    pub fn new(item_id: impl Into<String>, size_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            size_id: size_id.into(),
            lot_id: None,
            quantity,
        }
    }

    pub fn with_lot(mut self, lot_id: impl Into<String>) -> Self {
        self.lot_id = Some(lot_id.into());
        self
    }
}

/// Item reported by the stager, recorded in the `STAGED` audit details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedItem {
    pub item_id: String,
    pub size_id: String,
    #[serde(default)]
    pub lot_id: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub scan_method: ScanMethod,
}

/// Actor, time and free-form reason recorded together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedReason {
    pub by: ActorRef,
    pub at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub id: ReleaseId,
    #[serde(default)]
    pub release_number: Option<String>,
    pub status: ReleaseStatus,

    #[serde(default)]
    pub staged_by: Option<ActorRef>,
    #[serde(default)]
    pub staged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub staging_location: Option<StagingLocation>,

    #[serde(default)]
    pub verified_by: Option<ActorRef>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub loaded_by: Option<ActorRef>,
    #[serde(default)]
    pub loaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub truck_number: Option<String>,

    #[serde(default)]
    pub shipped_by: Option<ActorRef>,
    #[serde(default)]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub bol_number: Option<String>,

    /// Only ever incremented, by a verification rejection
    #[serde(default)]
    pub pick_ticket_revision: u32,
    #[serde(default)]
    pub verification_rejection: Option<StampedReason>,
    #[serde(default)]
    pub unable_to_stage: Option<StampedReason>,

    #[serde(default)]
    pub line_items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
}

impl Release {
    /// New release in `Entered` status
    pub fn new(id: impl Into<ReleaseId>, line_items: Vec<LineItem>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            release_number: None,
            status: ReleaseStatus::Entered,
            staged_by: None,
            staged_at: None,
            staging_location: None,
            verified_by: None,
            verified_at: None,
            loaded_by: None,
            loaded_at: None,
            truck_number: None,
            shipped_by: None,
            shipped_at: None,
            bol_number: None,
            pick_ticket_revision: 0,
            verification_rejection: None,
            unable_to_stage: None,
            line_items,
            created_at,
        }
    }

    pub fn with_release_number(mut self, number: impl Into<String>) -> Self {
        self.release_number = Some(number.into());
        self
    }

    pub fn was_staged_by(&self, actor_id: &str) -> bool {
        self.staged_by.as_ref().is_some_and(|stager| stager.is(actor_id))
    }

    pub(crate) fn clear_staging(&mut self) {
        self.staged_by = None;
        self.staged_at = None;
        self.staging_location = None;
    }

    /// Total quantity across all line items
    pub fn total_quantity(&self) -> u64 {
        self.line_items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}
