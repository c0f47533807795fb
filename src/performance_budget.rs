//! Performance Budget (C3): per-turn wall-clock budget enforcement and a
//! rolling history of batch/call durations.

use std::collections::VecDeque;
use std::time::Duration;

use crate::sync::Mutex;
use crate::util::clock::now_ms;

const BATCH_HISTORY_CAPACITY: usize = 100;
const CALL_HISTORY_CAPACITY: usize = 100;
const MIN_HISTORY_FOR_STATS: usize = 10;

/// Above this, a recorded batch dispatch counts as a violation.
const MAX_BATCH_DURATION_MS: u64 = 2000;
/// Above this, a recorded immediate call counts as a violation.
const MAX_CALL_DURATION_MS: u64 = 1500;

struct State {
    turn_started_at_ms: Option<u128>,
    violation_count: u64,
    batch_durations_ms: VecDeque<u64>,
    call_durations_ms: VecDeque<u64>,
}

/// Tracks the wall-clock budget for one simulation turn and the rolling
/// history of batch/call latencies used to reason about whether the
/// budget is realistic.
pub struct PerformanceBudget {
    max_turn_time_ms: u64,
    state: Mutex<State>,
}

impl PerformanceBudget {
    /// Create a budget enforcing `max_turn_time_ms` per turn.
    #[must_use]
    pub fn new(max_turn_time_ms: u64) -> Self {
        Self {
            max_turn_time_ms,
            state: Mutex::new(State {
                turn_started_at_ms: None,
                violation_count: 0,
                batch_durations_ms: VecDeque::with_capacity(BATCH_HISTORY_CAPACITY),
                call_durations_ms: VecDeque::with_capacity(CALL_HISTORY_CAPACITY),
            }),
        }
    }

    /// Mark the start of a new turn, resetting the elapsed clock.
    pub fn start_turn(&self) {
        self.state.lock().turn_started_at_ms = Some(now_ms());
    }

    /// Milliseconds remaining in the current turn's budget. Positive means
    /// within budget; negative means the budget has already been
    /// overspent. `None` if no turn has been started.
    #[must_use]
    pub fn remaining(&self) -> Option<i64> {
        let started = self.state.lock().turn_started_at_ms?;
        let elapsed = now_ms().saturating_sub(started) as i64;
        Some(i64::try_from(self.max_turn_time_ms).unwrap_or(i64::MAX) - elapsed)
    }

    /// True if the current turn has exceeded `max_turn_time_ms`. Also
    /// increments the violation counter the first time a given turn is
    /// observed to have crossed the budget.
    pub fn exceeded(&self) -> bool {
        let mut state = self.state.lock();
        let Some(started) = state.turn_started_at_ms else {
            return false;
        };
        let elapsed = now_ms().saturating_sub(started);
        if elapsed > u128::from(self.max_turn_time_ms) {
            state.violation_count += 1;
            // Clear so a single overrun isn't counted on every subsequent
            // poll within the same turn.
            state.turn_started_at_ms = None;
            true
        } else {
            false
        }
    }

    /// Record the duration of one LLM batch dispatch into the bounded
    /// rolling history, counting a violation if it exceeds
    /// `MAX_BATCH_DURATION_MS`.
    pub fn record_batch(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let mut state = self.state.lock();
        if state.batch_durations_ms.len() >= BATCH_HISTORY_CAPACITY {
            state.batch_durations_ms.pop_front();
        }
        state.batch_durations_ms.push_back(millis);
        if millis > MAX_BATCH_DURATION_MS {
            state.violation_count += 1;
        }
    }

    /// Record the duration of one immediate (bypass) LLM call into the
    /// bounded rolling history, counting a violation if it exceeds
    /// `MAX_CALL_DURATION_MS`.
    pub fn record_call(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let mut state = self.state.lock();
        if state.call_durations_ms.len() >= CALL_HISTORY_CAPACITY {
            state.call_durations_ms.pop_front();
        }
        state.call_durations_ms.push_back(millis);
        if millis > MAX_CALL_DURATION_MS {
            state.violation_count += 1;
        }
    }

    /// Total number of turns observed to have crossed `max_turn_time_ms`.
    #[must_use]
    pub fn violation_count(&self) -> u64 {
        self.state.lock().violation_count
    }

    /// Mean batch duration in milliseconds, once at least
    /// `MIN_HISTORY_FOR_STATS` samples have been recorded.
    #[must_use]
    pub fn mean_batch_duration_ms(&self) -> Option<f64> {
        let state = self.state.lock();
        mean_of(&state.batch_durations_ms)
    }

    /// Mean immediate-call duration in milliseconds, once at least
    /// `MIN_HISTORY_FOR_STATS` samples have been recorded.
    #[must_use]
    pub fn mean_call_duration_ms(&self) -> Option<f64> {
        let state = self.state.lock();
        mean_of(&state.call_durations_ms)
    }
}

fn mean_of(samples: &VecDeque<u64>) -> Option<f64> {
    if samples.len() < MIN_HISTORY_FOR_STATS {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = samples.iter().sum::<u64>() as f64 / samples.len() as f64;
    Some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn fresh_budget_has_no_remaining_before_a_turn_starts() {
        let budget = PerformanceBudget::new(1000);
        assert!(budget.remaining().is_none());
        assert!(!budget.exceeded());
    }

    #[test]
    fn remaining_counts_down_after_start_turn() {
        let budget = PerformanceBudget::new(1000);
        budget.start_turn();
        let remaining = budget.remaining().unwrap();
        assert!(remaining <= 1000 && remaining > 0);
    }

    #[test]
    fn exceeded_flags_and_counts_a_violation_once() {
        let budget = PerformanceBudget::new(1);
        budget.start_turn();
        sleep(Duration::from_millis(20));
        assert!(budget.exceeded());
        assert_eq!(budget.violation_count(), 1);
        // cleared after first observation; no second violation double-counted.
        assert!(!budget.exceeded());
        assert_eq!(budget.violation_count(), 1);
    }

    #[test]
    fn batch_history_is_bounded_and_reports_mean_past_threshold() {
        let budget = PerformanceBudget::new(1000);
        for _ in 0..9 {
            budget.record_batch(Duration::from_millis(100));
        }
        assert!(budget.mean_batch_duration_ms().is_none());
        budget.record_batch(Duration::from_millis(100));
        assert_eq!(budget.mean_batch_duration_ms(), Some(100.0));
    }

    #[test]
    fn record_batch_over_cap_counts_a_violation() {
        let budget = PerformanceBudget::new(1000);
        budget.record_batch(Duration::from_millis(500));
        assert_eq!(budget.violation_count(), 0);
        budget.record_batch(Duration::from_millis(2500));
        assert_eq!(budget.violation_count(), 1);
    }

    #[test]
    fn record_call_over_cap_counts_a_violation() {
        let budget = PerformanceBudget::new(1000);
        budget.record_call(Duration::from_millis(1500));
        assert_eq!(budget.violation_count(), 0);
        budget.record_call(Duration::from_millis(1600));
        assert_eq!(budget.violation_count(), 1);
    }

    #[test]
    fn call_history_caps_at_100_samples() {
        let budget = PerformanceBudget::new(1000);
        for i in 0..150u64 {
            budget.record_call(Duration::from_millis(i));
        }
        let state = budget.state.lock();
        assert_eq!(state.call_durations_ms.len(), 100);
    }
}
