//! End-to-end scenario: a CRITICAL-priority request bypasses the batch
//! queue entirely and resolves well inside the configured batch window.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use agent_turn_runtime::cache::{CacheLimits, EvictionStrategy, LlmResponseCache, MultiLevelCache};
use agent_turn_runtime::coordinator::{CoordinatorConfig, Generate, LLMCoordinator, RequestType};
use agent_turn_runtime::core::Priority;
use agent_turn_runtime::cost_tracker::CostTracker;
use agent_turn_runtime::performance_budget::PerformanceBudget;
use agent_turn_runtime::runtime::TokioSpawner;

struct ScriptedProvider {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Generate for ScriptedProvider {
    async fn generate(&self, _prompt: &str) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("critical-reply".to_string())
    }
}

#[tokio::test]
async fn a_critical_priority_request_bypasses_batching_entirely() {
    let dir = tempfile::tempdir().unwrap();
    let limits = CacheLimits {
        l1_max_size: 10,
        l2_max_size: 10,
        l3_max_size: 10,
        default_ttl_secs: Some(3600),
        strategy: EvictionStrategy::Lru,
        cache_directory: dir.path().to_path_buf(),
        max_total_bytes: None,
    };
    let cache = Arc::new(LlmResponseCache::new(MultiLevelCache::new(limits)));
    let cost_tracker = Arc::new(CostTracker::new(100.0, 1000.0));
    let perf_budget = Arc::new(PerformanceBudget::new(60_000));
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = ScriptedProvider { calls: Arc::clone(&calls) };
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let config = CoordinatorConfig {
        max_batch_size: 5,
        batch_timeout_ms: 2000,
        ..CoordinatorConfig::default()
    };

    let coordinator = Arc::new(LLMCoordinator::new(
        config,
        cost_tracker,
        perf_budget,
        cache,
        provider,
        spawner,
    ));
    coordinator.start();

    let started = Instant::now();
    let result = coordinator
        .queue_request(
            RequestType::Generic,
            "agent-critical",
            "urgent request",
            BTreeMap::new(),
            Priority::Critical,
            Duration::from_secs(5),
        )
        .await;
    let elapsed = started.elapsed();

    assert!(result.ok);
    assert_eq!(result.response.as_deref(), Some("critical-reply"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(elapsed < Duration::from_millis(2000), "bypass should resolve well before the batch window: {elapsed:?}");

    let stats = coordinator.snapshot();
    assert_eq!(stats.total_immediate, 1);
    assert_eq!(stats.total_batched, 0);

    coordinator.stop();
}
