//! Time source abstraction so lock TTLs can be exercised with simulated time.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by `chrono::Utc::now`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock; clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += chrono::Duration::milliseconds(by.as_millis() as i64);
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Whether `since` lies at least `ttl` in the past relative to `now`.
///
/// A timestamp in the future (clock skew between writers) never counts as
/// elapsed.
pub fn has_elapsed(since: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    match now.signed_duration_since(since).to_std() {
        Ok(age) => age >= ttl,
        Err(_) => false,
    }
}
