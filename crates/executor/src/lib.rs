//! Retry policy execution and the bounded-concurrency parallel executor
//! that drives a Tempest run's instances.

pub mod error;
pub mod executor;
pub mod retry;

pub use error::RetryError;
pub use executor::{ExecutionStats, InstanceOutcome, OutcomeKind, ParallelExecutor};
pub use retry::with_retry;
