//! Transfer engine error types

use thiserror::Error;

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Failures of the execution machinery itself, as opposed to failures
/// reported by a unit's executor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Worker pool has been shut down")]
    ShutDown,

    #[error("Worker exited before reporting a result for unit {0}")]
    WorkerLost(String),

    #[error("Executor panicked while running unit {0}")]
    ExecutorPanicked(String),

    #[error("Unit {0} was not started because the operation was cancelled")]
    Skipped(String),
}

/// Rejected coordinator settings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("Max attempts must be at least 1")]
    ZeroAttempts,
}
