//! Advisory lock fields stored alongside a release.

use super::actor::ActorRef;
use crate::clock::has_elapsed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Who currently holds exclusive working rights over a release, and since when.
///
/// The lock is advisory: transitions check status guards, not these fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    #[serde(rename = "lockHolder", default)]
    pub holder: Option<ActorRef>,
    #[serde(rename = "lockAcquiredAt", default)]
    pub acquired_at: Option<DateTime<Utc>>,
}

impl LockState {
    pub fn is_held(&self) -> bool {
        self.holder.is_some()
    }

    pub fn is_held_by(&self, actor_id: &str) -> bool {
        self.holder.as_ref().is_some_and(|holder| holder.is(actor_id))
    }

    /// A holder without an acquisition time is treated as expired.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.acquired_at {
            Some(acquired_at) => has_elapsed(acquired_at, now, ttl),
            None => true,
        }
    }

    /// Held by someone other than `actor_id` and still inside its TTL window
    pub fn blocks(&self, actor_id: &str, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.is_held() && !self.is_held_by(actor_id) && !self.is_expired(now, ttl)
    }

    pub fn grant(&mut self, holder: ActorRef, now: DateTime<Utc>) {
        self.holder = Some(holder);
        self.acquired_at = Some(now);
    }

    pub fn clear(&mut self) {
        self.holder = None;
        self.acquired_at = None;
    }
}
