//! Root runtime configuration: groups each component's construction-time
//! settings into one `serde`-(de)serializable structure.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheLimits, EvictionStrategy};
use crate::coordinator::CoordinatorConfig;
use crate::processor::ProcessorConfig;

/// Monetary budget enforcement settings (feeds `CostTracker::new` and
/// `PerformanceBudget::new`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Hourly spend ceiling.
    pub hourly_budget: f64,
    /// Daily spend ceiling.
    pub daily_budget: f64,
    /// Per-turn wall-clock budget in milliseconds.
    pub max_turn_time_ms: u64,
}

impl BudgetConfig {
    /// Validate this config's fields are sane (non-negative budgets, a
    /// positive turn-time ceiling).
    pub fn validate(&self) -> Result<(), String> {
        if self.hourly_budget < 0.0 {
            return Err("hourly_budget must be non-negative".to_string());
        }
        if self.daily_budget < 0.0 {
            return Err("daily_budget must be non-negative".to_string());
        }
        if self.daily_budget < self.hourly_budget {
            return Err("daily_budget must be at least hourly_budget".to_string());
        }
        if self.max_turn_time_ms == 0 {
            return Err("max_turn_time_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Multi-Level Cache (C4) construction-time settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum entries held in L1.
    pub l1_max_size: usize,
    /// Maximum entries held in L2.
    pub l2_max_size: usize,
    /// Maximum entries held in L3.
    pub l3_max_size: usize,
    /// Default TTL applied when `put` omits one.
    pub default_ttl_secs: Option<u64>,
    /// Eviction policy shared across tiers.
    pub strategy: EvictionStrategy,
    /// Directory L3 uses for its per-key files.
    pub cache_directory: PathBuf,
    /// Ceiling on L3's total on-disk size, in bytes.
    pub max_cache_size_bytes: Option<u64>,
}

impl CacheConfig {
    /// Validate this config's fields are sane (non-zero tier sizes).
    pub fn validate(&self) -> Result<(), String> {
        if self.l1_max_size == 0 {
            return Err("l1_max_size must be greater than 0".to_string());
        }
        if self.l2_max_size == 0 {
            return Err("l2_max_size must be greater than 0".to_string());
        }
        if self.l3_max_size == 0 {
            return Err("l3_max_size must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Build the [`CacheLimits`] this config describes.
    #[must_use]
    pub fn to_cache_limits(&self) -> CacheLimits {
        CacheLimits {
            l1_max_size: self.l1_max_size,
            l2_max_size: self.l2_max_size,
            l3_max_size: self.l3_max_size,
            default_ttl_secs: self.default_ttl_secs,
            strategy: self.strategy,
            cache_directory: self.cache_directory.clone(),
            max_total_bytes: self.max_cache_size_bytes,
        }
    }
}

/// Root configuration grouping every component's construction-time
/// settings, parsed from JSON and validated by folding each nested
/// section's own `validate()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Concurrent Processor (C6) settings.
    pub processor: ProcessorConfig,
    /// LLM Coordinator (C7) settings.
    pub coordinator: CoordinatorConfig,
    /// Cost Tracker (C2) / Performance Budget (C3) settings.
    pub budget: BudgetConfig,
    /// Multi-Level Cache (C4) settings.
    pub cache: CacheConfig,
}

impl RuntimeConfig {
    /// Validate every sub-config, folding the first failure into a single
    /// error message.
    pub fn validate(&self) -> Result<(), String> {
        self.processor.validate().map_err(|e| format!("processor config invalid: {e}"))?;
        self.coordinator.validate().map_err(|e| format!("coordinator config invalid: {e}"))?;
        self.budget.validate().map_err(|e| format!("budget config invalid: {e}"))?;
        self.cache.validate().map_err(|e| format!("cache config invalid: {e}"))?;
        Ok(())
    }

    /// Parse a runtime configuration from a JSON string and validate it.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RuntimeConfig {
        RuntimeConfig {
            processor: ProcessorConfig { max_workers: 4, max_concurrent_tasks: 64, queue_timeout_ms: 1000 },
            coordinator: CoordinatorConfig::default(),
            budget: BudgetConfig { hourly_budget: 10.0, daily_budget: 100.0, max_turn_time_ms: 5000 },
            cache: CacheConfig {
                l1_max_size: 100,
                l2_max_size: 100,
                l3_max_size: 100,
                default_ttl_secs: Some(3600),
                strategy: EvictionStrategy::Adaptive,
                cache_directory: PathBuf::from("/tmp/agent-turn-runtime-cache"),
                max_cache_size_bytes: Some(1_000_000),
            },
        }
    }

    #[test]
    fn default_sample_config_validates() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn zero_max_workers_is_rejected() {
        let mut cfg = sample();
        cfg.processor.max_workers = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn daily_budget_below_hourly_is_rejected() {
        let mut cfg = sample();
        cfg.budget.daily_budget = 1.0;
        cfg.budget.hourly_budget = 5.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn from_json_str_round_trips_a_valid_config() {
        let cfg = sample();
        let json = serde_json::to_string(&cfg).unwrap();
        let parsed = RuntimeConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed.processor.max_workers, cfg.processor.max_workers);
    }

    #[test]
    fn from_json_str_rejects_an_invalid_config() {
        let mut cfg = sample();
        cfg.cache.l1_max_size = 0;
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(RuntimeConfig::from_json_str(&json).is_err());
    }
}
