//! Concurrent Processor (C6): bounded priority-queued task execution.

pub mod queue;
pub mod scheduler;
pub mod worker_pool;

pub use queue::{PriorityQueue, QueuedTask};
pub use scheduler::{ConcurrentProcessor, ProcessorConfig};
pub use worker_pool::NativeWorkerPool;
