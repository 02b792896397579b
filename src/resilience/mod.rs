//! # Resilience Module
//!
//! Circuit breaking around the document store, used by the transaction retry
//! executor when `circuit_breaker.enabled` is set.

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerMetrics, CircuitState};
