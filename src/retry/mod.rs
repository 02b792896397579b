//! Contention-tolerant transaction execution.

pub mod classifier;
pub mod executor;

pub use classifier::{ClassifiableError, ErrorCategory, ErrorClassifier, StandardErrorClassifier};
pub use executor::{boxed_operation, BoxedOperation, RetryError, SequentialOutcome, TransactionRetryExecutor};
