//! Cost Tracker (C2): hourly/daily monetary budget with automatic
//! rollover and per-request-type cost breakdown.

use std::collections::HashMap;

use crate::sync::Mutex;
use crate::util::clock::now_secs;

const SECS_PER_HOUR: u64 = 3600;
const SECS_PER_DAY: u64 = 86_400;

struct State {
    current_hour_spend: f64,
    current_day_spend: f64,
    hour_epoch: u64,
    day_epoch: u64,
    per_type_totals: HashMap<String, f64>,
    total_requests: u64,
    total_tokens: u64,
}

/// Process-wide monetary budget enforcement with wall-clock rollover.
pub struct CostTracker {
    hourly_budget: f64,
    daily_budget: f64,
    state: Mutex<State>,
}

/// Immutable snapshot of the tracker's counters.
#[derive(Debug, Clone)]
pub struct CostSnapshot {
    /// Spend accumulated in the current hour epoch.
    pub current_hour_spend: f64,
    /// Spend accumulated in the current day epoch.
    pub current_day_spend: f64,
    /// Total successful/attempted requests recorded.
    pub total_requests: u64,
    /// Total tokens recorded across all requests.
    pub total_tokens: u64,
    /// Cost attributed to each request type.
    pub per_type_totals: HashMap<String, f64>,
}

impl CostTracker {
    /// Create a tracker with the given hourly and daily budgets, epochs
    /// anchored to the current wall clock.
    #[must_use]
    pub fn new(hourly_budget: f64, daily_budget: f64) -> Self {
        let now = now_secs();
        Self {
            hourly_budget,
            daily_budget,
            state: Mutex::new(State {
                current_hour_spend: 0.0,
                current_day_spend: 0.0,
                hour_epoch: now / SECS_PER_HOUR,
                day_epoch: now / SECS_PER_DAY,
                per_type_totals: HashMap::new(),
                total_requests: 0,
                total_tokens: 0,
            }),
        }
    }

    fn roll_epochs(state: &mut State) {
        let now = now_secs();
        let hour_epoch = now / SECS_PER_HOUR;
        let day_epoch = now / SECS_PER_DAY;
        if hour_epoch != state.hour_epoch {
            state.current_hour_spend = 0.0;
            state.hour_epoch = hour_epoch;
        }
        if day_epoch != state.day_epoch {
            state.current_day_spend = 0.0;
            state.day_epoch = day_epoch;
        }
    }

    /// Record a charge, rolling hour/day accumulators over first if the
    /// wall clock has crossed a boundary. Returns `true` iff both the
    /// hourly and daily accumulators are within budget after the update.
    pub fn update(&self, request_type: &str, cost: f64, tokens: u64) -> bool {
        let mut state = self.state.lock();
        Self::roll_epochs(&mut state);

        state.current_hour_spend += cost;
        state.current_day_spend += cost;
        state.total_requests += 1;
        state.total_tokens += tokens;
        *state.per_type_totals.entry(request_type.to_string()).or_insert(0.0) += cost;

        state.current_hour_spend <= self.hourly_budget && state.current_day_spend <= self.daily_budget
    }

    /// Pre-check whether `estimated_cost` would fit within both remaining
    /// budgets, without mutating any accumulator.
    #[must_use]
    pub fn can_afford(&self, estimated_cost: f64) -> bool {
        let mut state = self.state.lock();
        Self::roll_epochs(&mut state);
        state.current_hour_spend + estimated_cost <= self.hourly_budget
            && state.current_day_spend + estimated_cost <= self.daily_budget
    }

    /// Immutable snapshot of the tracker's current counters.
    #[must_use]
    pub fn snapshot(&self) -> CostSnapshot {
        let mut state = self.state.lock();
        Self::roll_epochs(&mut state);
        CostSnapshot {
            current_hour_spend: state.current_hour_spend,
            current_day_spend: state.current_day_spend,
            total_requests: state.total_requests,
            total_tokens: state.total_tokens,
            per_type_totals: state.per_type_totals.clone(),
        }
    }
}
