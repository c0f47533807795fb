//! Top-level runtime: owns every component and exposes the handful of
//! operations a caller drives directly (submit work, queue an LLM
//! request, touch the general-purpose cache) plus a combined health
//! snapshot.

use std::sync::Arc;

use serde_json::Value;

use crate::cache::{MultiLevelCache, Prefetcher};
use crate::cost_tracker::{CostSnapshot, CostTracker};
use crate::coordinator::{CoordinatorStats, Generate, LLMCoordinator};
use crate::performance_budget::PerformanceBudget;
use crate::processor::ConcurrentProcessor;
use crate::resource_monitor::ResourceMonitor;
use crate::runtime::tokio_spawner::TokioSpawner;

/// Every component wired together from one [`crate::config::RuntimeConfig`].
///
/// `general_cache` is the Multi-Level Cache (C4) instance callers use
/// directly for non-LLM data and that the Prefetcher (C5) warms; the LLM
/// Coordinator (C7) consults its own dedicated `llm_cache` (C8) instead,
/// since the two wrap distinct value types (opaque JSON vs. response
/// text) over otherwise identical tier/eviction machinery.
pub struct Runtime<P: Generate> {
    /// Resource Monitor (C1).
    pub resource_monitor: Arc<ResourceMonitor>,
    /// Cost Tracker (C2).
    pub cost_tracker: Arc<CostTracker>,
    /// Performance Budget (C3).
    pub performance_budget: Arc<PerformanceBudget>,
    /// Multi-Level Cache (C4), for direct non-LLM use.
    pub general_cache: Arc<MultiLevelCache<Value>>,
    /// Prefetcher (C5), observing traffic against `general_cache`.
    pub prefetcher: Arc<Prefetcher<TokioSpawner>>,
    /// Concurrent Processor (C6).
    pub processor: Arc<ConcurrentProcessor>,
    /// LLM Coordinator (C7).
    pub coordinator: Arc<LLMCoordinator<P, TokioSpawner>>,
}

/// Combined health snapshot across every stateful component.
#[derive(Debug, Clone)]
pub struct RuntimeHealth {
    /// Current combined CPU/memory load, `[0.0, 1.0]`.
    pub resource_load: f64,
    /// Cost Tracker counters.
    pub cost: CostSnapshot,
    /// Performance Budget violation count so far.
    pub performance_violations: u64,
    /// Tasks currently active in the processor.
    pub active_tasks: usize,
    /// Coordinator aggregate counters.
    pub coordinator: CoordinatorStats,
}

impl<P: Generate> Runtime<P> {
    /// Start every background activity (processor scheduling/monitor
    /// loops, coordinator batch processor). Idempotent per component.
    pub fn start(&self) {
        self.processor.start();
        self.coordinator.start();
    }

    /// Stop accepting new work and wind down every background activity.
    pub async fn stop(&self) {
        self.coordinator.stop();
        self.processor.stop().await;
    }

    /// A point-in-time snapshot across every stateful component, useful
    /// for a liveness/health endpoint.
    #[must_use]
    pub fn health(&self) -> RuntimeHealth {
        RuntimeHealth {
            resource_load: self.resource_monitor.mean_load(),
            cost: self.cost_tracker.snapshot(),
            performance_violations: self.performance_budget.violation_count(),
            active_tasks: self.processor.active_count(),
            coordinator: self.coordinator.snapshot(),
        }
    }
}
