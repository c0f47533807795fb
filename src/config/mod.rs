//! Configuration models for the runtime's components.

pub mod runtime_config;

pub use runtime_config::{BudgetConfig, CacheConfig, RuntimeConfig};
