//! Error taxonomy for the coordination runtime.

use thiserror::Error;

/// Errors produced by runtime components.
///
/// One variant per kind in the error taxonomy: recoverable failures
/// (`CacheIoFailure`, `ParseFailure`, and provider failures for batch
/// siblings) are logged and folded into a structured result rather than
/// propagated; the rest surface directly to the caller.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    /// `Submit` on a saturated task queue.
    #[error("queue full: {0}")]
    QueueFull(String),
    /// A task or request deadline elapsed before completion.
    #[error("timeout")]
    Timeout,
    /// `CostTracker` refused the request.
    #[error("Budget exceeded")]
    BudgetExceeded,
    /// `PerformanceBudget::exceeded` was true at dispatch time.
    #[error("Turn time budget exceeded")]
    PerformanceBudgetExceeded,
    /// The provider port returned an error or failed outright.
    #[error("provider failure: {0}")]
    ProviderFailure(String),
    /// A batch reply was missing the expected marker for an item.
    #[error("Failed to parse batch response")]
    ParseFailure,
    /// Disk read/write failure in the L3 cache tier.
    #[error("cache io failure: {0}")]
    CacheIoFailure(String),
    /// The task was cancelled mid-flight (scheduler shutdown).
    #[error("cancelled")]
    Cancelled,
    /// Submission was rejected because `Stop()` was already called.
    #[error("shutting down")]
    ShuttingDown,
    /// A task id was requested from `Wait`/`WaitBatch` that the processor
    /// never admitted (already pruned from bounded retention, or unknown).
    #[error("unknown task: {0}")]
    UnknownTask(String),
}

/// Application-facing result type for call sites that fold in adapter
/// errors (config parsing, disk I/O context) rather than the closed
/// `CoreError` taxonomy.
pub type AppResult<T> = Result<T, anyhow::Error>;
