//! Bounded priority queue backing the Concurrent Processor.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::{CoreError, TaskMetadata, Work};

/// One queued task: its metadata plus the callable that will produce its
/// result once dequeued.
pub struct QueuedTask {
    /// Scheduling metadata (priority, timeout, creation time).
    pub meta: TaskMetadata,
    /// The callable to run.
    pub work: Work,
}

/// Orders `QueuedTask`s by `(priority, created_at)` for a max-heap: higher
/// priority first, earlier `created_at` wins ties.
struct PriorityTask(QueuedTask);

impl PartialEq for PriorityTask {
    fn eq(&self, other: &Self) -> bool {
        self.0.meta.task_id == other.0.meta.task_id
    }
}

impl Eq for PriorityTask {}

impl PartialOrd for PriorityTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityTask {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.0.meta.priority.cmp(&other.0.meta.priority) {
            Ordering::Equal => other.0.meta.created_at_ms.cmp(&self.0.meta.created_at_ms),
            ord => ord,
        }
    }
}

/// Strict priority queue with FIFO tie-break, bounded by `max_depth`.
pub struct PriorityQueue {
    max_depth: usize,
    tasks: BinaryHeap<PriorityTask>,
}

impl PriorityQueue {
    /// Create an empty queue admitting at most `max_depth` tasks.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            tasks: BinaryHeap::with_capacity(max_depth.min(1024)),
        }
    }

    /// Push `task`, rejecting it with [`CoreError::QueueFull`] if the
    /// queue is already at `max_depth`.
    pub fn enqueue(&mut self, task: QueuedTask) -> Result<(), CoreError> {
        if self.tasks.len() >= self.max_depth {
            return Err(CoreError::QueueFull(format!(
                "max queue depth {} reached",
                self.max_depth
            )));
        }
        self.tasks.push(PriorityTask(task));
        Ok(())
    }

    /// Pop the highest-priority (oldest on tie) task, or `None` if empty.
    pub fn dequeue(&mut self) -> Option<QueuedTask> {
        self.tasks.pop().map(|pt| pt.0)
    }

    /// Remove tasks whose deadline has already elapsed relative to
    /// `now_ms`, derived from `meta.created_at_ms + timeout`. Returns the
    /// number pruned.
    pub fn prune_expired(&mut self, now_ms: u128) -> usize {
        let before = self.tasks.len();
        let remaining: Vec<PriorityTask> = self
            .tasks
            .drain()
            .filter(|pt| {
                pt.0.meta
                    .timeout
                    .is_none_or(|timeout| pt.0.meta.created_at_ms + timeout.as_millis() > now_ms)
            })
            .collect();
        self.tasks = remaining.into_iter().collect();
        before.saturating_sub(self.tasks.len())
    }

    /// Current number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True if the queue holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Configured maximum depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Priority;
    use std::time::Duration;

    fn make_task(id: &str, priority: Priority, created_at_ms: u128, timeout: Option<Duration>) -> QueuedTask {
        QueuedTask {
            meta: TaskMetadata {
                task_id: id.to_string(),
                priority,
                timeout,
                created_at_ms,
            },
            work: Work::blocking_fn(|| Ok(Vec::new())),
        }
    }

    #[test]
    fn priority_ordering_dequeues_highest_first() {
        let mut q = PriorityQueue::new(100);
        q.enqueue(make_task("1", Priority::Low, 100, None)).unwrap();
        q.enqueue(make_task("2", Priority::Critical, 200, None)).unwrap();
        q.enqueue(make_task("3", Priority::Normal, 300, None)).unwrap();
        q.enqueue(make_task("4", Priority::High, 400, None)).unwrap();

        assert_eq!(q.dequeue().unwrap().meta.task_id, "2");
        assert_eq!(q.dequeue().unwrap().meta.task_id, "4");
        assert_eq!(q.dequeue().unwrap().meta.task_id, "3");
        assert_eq!(q.dequeue().unwrap().meta.task_id, "1");
    }

    #[test]
    fn fifo_tiebreak_within_same_priority() {
        let mut q = PriorityQueue::new(100);
        q.enqueue(make_task("1", Priority::Normal, 300, None)).unwrap();
        q.enqueue(make_task("2", Priority::Normal, 100, None)).unwrap();
        q.enqueue(make_task("3", Priority::Normal, 200, None)).unwrap();

        assert_eq!(q.dequeue().unwrap().meta.task_id, "2");
        assert_eq!(q.dequeue().unwrap().meta.task_id, "3");
        assert_eq!(q.dequeue().unwrap().meta.task_id, "1");
    }

    #[test]
    fn enqueue_past_max_depth_is_rejected() {
        let mut q = PriorityQueue::new(2);
        q.enqueue(make_task("1", Priority::Normal, 100, None)).unwrap();
        q.enqueue(make_task("2", Priority::Normal, 200, None)).unwrap();
        assert!(q.enqueue(make_task("3", Priority::Normal, 300, None)).is_err());
    }

    #[test]
    fn prune_expired_removes_only_timed_out_tasks() {
        let mut q = PriorityQueue::new(100);
        q.enqueue(make_task("1", Priority::Normal, 100, None)).unwrap();
        q.enqueue(make_task("2", Priority::High, 200, Some(Duration::from_millis(300)))).unwrap();
        q.enqueue(make_task("3", Priority::Low, 300, Some(Duration::from_millis(1700)))).unwrap();

        assert_eq!(q.len(), 3);
        let pruned = q.prune_expired(1000);
        assert_eq!(pruned, 1);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn empty_queue_dequeues_none() {
        let mut q = PriorityQueue::new(100);
        assert!(q.dequeue().is_none());
        assert_eq!(q.len(), 0);
        assert!(q.is_empty());
    }
}
