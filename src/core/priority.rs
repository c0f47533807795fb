//! Priority ordering shared by the processor queue and the coordinator's
//! batch queue.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Scheduling priority. Lower numeric value sorts earlier; the ordering is
/// total and stable across the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Highest priority; always eligible for immediate dispatch bypass.
    Critical = 1,
    /// High priority; eligible for immediate dispatch bypass below threshold.
    High = 2,
    /// Default priority for ordinary agent requests.
    Normal = 3,
    /// Below-normal priority.
    Low = 4,
    /// Lowest priority; runs only when nothing else is ready.
    Background = 5,
}

impl Priority {
    /// Numeric value used for queue ordering and the bypass threshold
    /// comparison (`value / 5 <= batch_priority_threshold`).
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Normalized priority in `(0.0, 1.0]`, as used by
    /// `batch_priority_threshold` comparisons.
    #[must_use]
    pub fn normalized(self) -> f64 {
        f64::from(self.value()) / 5.0
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    /// Lower `value()` is "greater" in scheduling terms (runs first), so
    /// this is reversed from the numeric value to let callers use
    /// `Reverse`-free max-heaps directly.
    fn cmp(&self, other: &Self) -> Ordering {
        other.value().cmp(&self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_critical_above_background() {
        assert!(Priority::Critical > Priority::Background);
        assert!(Priority::High > Priority::Normal);
    }

    #[test]
    fn normalized_matches_value_over_five() {
        assert!((Priority::Critical.normalized() - 0.2).abs() < f64::EPSILON);
        assert!((Priority::Background.normalized() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sorts_descending_by_priority_in_a_max_heap() {
        use std::collections::BinaryHeap;
        let mut heap: BinaryHeap<Priority> = BinaryHeap::new();
        heap.push(Priority::Low);
        heap.push(Priority::Critical);
        heap.push(Priority::Normal);
        assert_eq!(heap.pop(), Some(Priority::Critical));
        assert_eq!(heap.pop(), Some(Priority::Normal));
        assert_eq!(heap.pop(), Some(Priority::Low));
    }
}
