//! Task model and lifecycle for the Concurrent Processor (C6).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::priority::Priority;

/// Lifecycle state of a task.
///
/// ```text
/// PENDING --(picked)--> RUNNING --+--(ok)---> COMPLETED
///                                  +--(err)--> FAILED
///                                  +--(deadline)--> FAILED (error="timeout")
///                                  +--(stop)--> CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued, waiting to be picked up by the scheduling loop.
    Pending,
    /// Picked up and currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error, including deadline expiry.
    Failed,
    /// Cancelled by a processor shutdown before it finished.
    Cancelled,
}

impl TaskStatus {
    /// True once a task has reached one of the three terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Metadata describing a submitted task.
///
/// `task_id` is unique for the process lifetime; ordering within the
/// scheduler queue is `(priority, created_at)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Unique task identifier (caller-supplied or generated at submit time).
    pub task_id: String,
    /// Scheduling priority.
    pub priority: Priority,
    /// Optional per-task deadline; enforced by the scheduler.
    pub timeout: Option<Duration>,
    /// Creation timestamp in milliseconds since epoch, used for the
    /// `(priority, created_at)` FIFO tiebreak.
    pub created_at_ms: u128,
}

/// Outcome of one task execution, recorded against its metrics and
/// delivered to the caller's result sink.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// Execution completed; carries a best-effort byte/len size of the
    /// result for `TaskMetrics::result_size`, plus the opaque result
    /// itself encoded by the caller.
    Completed {
        /// Best-effort size of the produced result.
        result_size: usize,
    },
    /// Execution returned an error.
    Failed(String),
}

/// Point-in-time metrics for one task, tracked from submission to
/// retention eviction.
#[derive(Debug, Clone)]
pub struct TaskMetrics {
    /// Identifier matching the originating `TaskMetadata`.
    pub task_id: String,
    /// Milliseconds since epoch when the task entered `RUNNING`.
    pub start_time_ms: Option<u128>,
    /// Milliseconds since epoch when the task reached a terminal state.
    pub end_time_ms: Option<u128>,
    /// Current lifecycle status; monotonic toward a terminal value.
    pub status: TaskStatus,
    /// Error message when `status == Failed`.
    pub error: Option<String>,
    /// Best-effort size of the produced result.
    pub result_size: usize,
}

impl TaskMetrics {
    /// A freshly queued task's metrics: `PENDING`, no timings yet.
    #[must_use]
    pub fn new(task_id: String) -> Self {
        Self {
            task_id,
            start_time_ms: None,
            end_time_ms: None,
            status: TaskStatus::Pending,
            error: None,
            result_size: 0,
        }
    }

    /// Duration between start and end, once both are recorded.
    #[must_use]
    pub fn duration_ms(&self) -> Option<u128> {
        match (self.start_time_ms, self.end_time_ms) {
            (Some(s), Some(e)) => Some(e.saturating_sub(s)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_metrics_start_pending_with_no_timings() {
        let m = TaskMetrics::new("t-1".into());
        assert_eq!(m.status, TaskStatus::Pending);
        assert!(m.start_time_ms.is_none());
        assert!(m.duration_ms().is_none());
    }

    #[test]
    fn duration_is_none_until_both_timings_present() {
        let mut m = TaskMetrics::new("t-1".into());
        m.start_time_ms = Some(100);
        assert!(m.duration_ms().is_none());
        m.end_time_ms = Some(150);
        assert_eq!(m.duration_ms(), Some(50));
    }

    #[test]
    fn terminal_states_are_exactly_three() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }
}
