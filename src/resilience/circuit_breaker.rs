//! # Circuit Breaker Implementation
//!
//! Fails fast once the document store has failed repeatedly, instead of letting
//! every caller burn through a full retry budget against a backend that is down.
//! Three states: Closed (normal operation), Open (failing fast) and Half-Open
//! (testing recovery).

use crate::config::CircuitBreakerConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// All calls are allowed through
    Closed = 0,
    /// All calls fail fast without executing
    Open = 1,
    /// Limited calls allowed to test store health
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub rejected_count: u64,
    pub consecutive_failures: u64,
    pub half_open_calls: u64,
    pub half_open_successes: u64,
}

#[derive(Debug)]
struct BreakerInner {
    metrics: CircuitBreakerMetrics,
    opened_at: Option<Instant>,
}

/// Circuit breaker with atomic state and mutex-protected counters
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    state: AtomicU8,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout_ms,
            success_threshold = config.success_threshold,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            config,
            inner: Mutex::new(BreakerInner {
                metrics: CircuitBreakerMetrics::default(),
                opened_at: None,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a call may proceed; moves Open to Half-Open once the reset
    /// timeout has elapsed.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock();
        let allowed = match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => match inner.opened_at.map(|opened| opened.elapsed()) {
                Some(elapsed) if elapsed >= self.config.reset_timeout() => {
                    self.transition_to_half_open(&mut inner);
                    inner.metrics.half_open_calls += 1;
                    true
                }
                Some(_) => false,
                None => {
                    warn!(component = %self.name, "Circuit open but no timestamp recorded");
                    true
                }
            },
            CircuitState::HalfOpen => {
                if inner.metrics.half_open_calls < u64::from(self.config.success_threshold) {
                    inner.metrics.half_open_calls += 1;
                    true
                } else {
                    false
                }
            }
        };
        if !allowed {
            inner.metrics.rejected_count += 1;
        }
        allowed
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.metrics.total_calls += 1;
        inner.metrics.success_count += 1;
        inner.metrics.consecutive_failures = 0;

        if self.state() == CircuitState::HalfOpen {
            inner.metrics.half_open_successes += 1;
            if inner.metrics.half_open_successes >= u64::from(self.config.success_threshold) {
                self.transition_to_closed(&mut inner);
            }
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.metrics.total_calls += 1;
        inner.metrics.failure_count += 1;
        inner.metrics.consecutive_failures += 1;

        debug!(
            component = %self.name,
            consecutive_failures = inner.metrics.consecutive_failures,
            "🔴 Protected operation failed"
        );

        match self.state() {
            CircuitState::Closed => {
                if inner.metrics.consecutive_failures
                    >= u64::from(self.config.failure_threshold)
                {
                    self.transition_to_open(&mut inner);
                }
            }
            CircuitState::HalfOpen => self.transition_to_open(&mut inner),
            CircuitState::Open => {}
        }
    }

    pub fn force_open(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced open");
        self.transition_to_open(&mut self.inner.lock());
    }

    pub fn force_closed(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced closed");
        self.transition_to_closed(&mut self.inner.lock());
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.inner.lock().metrics.clone()
    }

    fn transition_to_closed(&self, inner: &mut BreakerInner) {
        self.state.store(CircuitState::Closed as u8, Ordering::Release);
        inner.metrics.consecutive_failures = 0;
        inner.metrics.half_open_calls = 0;
        inner.metrics.half_open_successes = 0;
        inner.opened_at = None;
        info!(component = %self.name, "🟢 Circuit breaker closed (recovered)");
    }

    fn transition_to_open(&self, inner: &mut BreakerInner) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        inner.opened_at = Some(Instant::now());
        inner.metrics.half_open_calls = 0;
        inner.metrics.half_open_successes = 0;
        error!(
            component = %self.name,
            consecutive_failures = inner.metrics.consecutive_failures,
            failure_threshold = self.config.failure_threshold,
            reset_timeout_ms = self.config.reset_timeout_ms,
            "🔴 Circuit breaker opened (failing fast)"
        );
    }

    fn transition_to_half_open(&self, inner: &mut BreakerInner) {
        self.state.store(CircuitState::HalfOpen as u8, Ordering::Release);
        inner.metrics.half_open_calls = 0;
        inner.metrics.half_open_successes = 0;
        info!(component = %self.name, "🟡 Circuit breaker half-open (testing recovery)");
    }
}
