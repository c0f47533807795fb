//! Callable work items submitted to the Concurrent Processor.
//!
//! Source callables may be either asynchronous (awaited directly on the
//! scheduler's cooperative task) or synchronous/blocking (offloaded to the
//! native worker-thread pool so they never stall the scheduler). Rather
//! than modeling this as two submission methods, callables are captured as
//! one tagged union the scheduler matches on at spawn time.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Opaque result produced by a task. The processor never interprets the
/// bytes; `result_size` in `TaskMetrics` is simply `len()`.
pub type TaskResult = Vec<u8>;

/// A boxed, type-erased future driving one task to completion.
pub type BoxFuture = Pin<Box<dyn Future<Output = Result<TaskResult, String>> + Send>>;

/// A boxed, type-erased blocking closure driving one task to completion.
pub type BoxBlocking = Box<dyn FnOnce() -> Result<TaskResult, String> + Send>;

/// One unit of work submitted to the processor.
pub enum Work {
    /// Polled directly on the scheduler's cooperative task.
    Async(BoxFuture),
    /// Offloaded to the native worker-thread pool.
    Blocking(BoxBlocking),
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Async(_) => f.write_str("Work::Async(..)"),
            Self::Blocking(_) => f.write_str("Work::Blocking(..)"),
        }
    }
}

impl Work {
    /// Wrap an async closure as `Work::Async`.
    pub fn async_fn<F>(fut: F) -> Self
    where
        F: Future<Output = Result<TaskResult, String>> + Send + 'static,
    {
        Self::Async(Box::pin(fut))
    }

    /// Wrap a blocking closure as `Work::Blocking`.
    pub fn blocking_fn<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<TaskResult, String> + Send + 'static,
    {
        Self::Blocking(Box::new(f))
    }
}
