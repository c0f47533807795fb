//! Wires C1-C8 into one [`Runtime`] from a [`RuntimeConfig`]: validate the
//! config, construct each component in dependency order, hand back the
//! assembled handle.

use std::sync::Arc;

use crate::cache::{LlmResponseCache, MultiLevelCache, Prefetcher};
use crate::config::RuntimeConfig;
use crate::coordinator::{Generate, LLMCoordinator};
use crate::cost_tracker::CostTracker;
use crate::performance_budget::PerformanceBudget;
use crate::processor::ConcurrentProcessor;
use crate::resource_monitor::ResourceMonitor;
use crate::runtime::{Runtime, TokioSpawner};

/// Build every component described by `config` and assemble them into a
/// [`Runtime`]. Does not start any background activity; call
/// [`Runtime::start`] once ready.
///
/// # Errors
///
/// Returns `Err` if `config` fails validation.
pub fn build_runtime<P: Generate>(
    config: &RuntimeConfig,
    provider: P,
    spawner: TokioSpawner,
) -> Result<Runtime<P>, String> {
    config.validate()?;

    let resource_monitor = Arc::new(ResourceMonitor::new());
    let cost_tracker = Arc::new(CostTracker::new(config.budget.hourly_budget, config.budget.daily_budget));
    let performance_budget = Arc::new(PerformanceBudget::new(config.budget.max_turn_time_ms));

    let general_cache = Arc::new(MultiLevelCache::new(config.cache.to_cache_limits()));

    let mut llm_limits = config.cache.to_cache_limits();
    llm_limits.cache_directory = llm_limits.cache_directory.join("llm_responses");
    let llm_cache = Arc::new(LlmResponseCache::new(MultiLevelCache::new(llm_limits)));

    let prefetcher = Arc::new(Prefetcher::new(Arc::clone(&general_cache), spawner.clone()));

    let processor = ConcurrentProcessor::new(config.processor.clone(), Arc::clone(&resource_monitor));

    let coordinator = Arc::new(LLMCoordinator::new(
        config.coordinator.clone(),
        Arc::clone(&cost_tracker),
        Arc::clone(&performance_budget),
        llm_cache,
        provider,
        spawner,
    ));

    Ok(Runtime { resource_monitor, cost_tracker, performance_budget, general_cache, prefetcher, processor, coordinator })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BudgetConfig, CacheConfig};
    use crate::coordinator::CoordinatorConfig;
    use crate::coordinator::provider::test_support::ScriptedProvider;
    use crate::processor::ProcessorConfig;
    use crate::cache::EvictionStrategy;

    fn config(dir: &std::path::Path) -> RuntimeConfig {
        RuntimeConfig {
            processor: ProcessorConfig { max_workers: 2, max_concurrent_tasks: 16, queue_timeout_ms: 1000 },
            coordinator: CoordinatorConfig::default(),
            budget: BudgetConfig { hourly_budget: 10.0, daily_budget: 100.0, max_turn_time_ms: 5000 },
            cache: CacheConfig {
                l1_max_size: 50,
                l2_max_size: 50,
                l3_max_size: 50,
                default_ttl_secs: Some(3600),
                strategy: EvictionStrategy::Lru,
                cache_directory: dir.to_path_buf(),
                max_cache_size_bytes: None,
            },
        }
    }

    #[tokio::test]
    async fn build_runtime_wires_every_component_and_rejects_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let spawner = TokioSpawner::new(tokio::runtime::Handle::current());
        let runtime = build_runtime(&config(dir.path()), ScriptedProvider::ok("ok"), spawner.clone()).unwrap();
        assert_eq!(runtime.processor.active_count(), 0);

        let mut bad = config(dir.path());
        bad.processor.max_workers = 0;
        assert!(build_runtime(&bad, ScriptedProvider::ok("ok"), spawner).is_err());
    }
}
