//! Core data model shared by every component: priorities, task lifecycle,
//! callable work items, and the error taxonomy.

use std::future::Future;

pub mod error;
pub mod executor;
pub mod priority;
pub mod task;

pub use error::{AppResult, CoreError};
pub use executor::{BoxBlocking, BoxFuture, TaskResult, Work};
pub use priority::Priority;
pub use task::{TaskMetadata, TaskMetrics, TaskOutcome, TaskStatus};

/// Fire-and-forget task spawning, abstracted so components (the
/// prefetcher's background warms, the processor's scheduling loop) don't
/// depend on a concrete async runtime.
pub trait Spawn: Send + Sync {
    /// Spawn `fut` to run to completion independently of the caller.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
