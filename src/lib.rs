//! # Agent Turn Runtime
//!
//! A coordination runtime for simulations where many agents each issue
//! LLM calls and shared-state lookups within a bounded-latency turn. It
//! combines priority-scheduled concurrent execution, monetary and
//! wall-clock budget enforcement, a multi-level cache, and LLM-call
//! batching into one cohesive runtime.
//!
//! ## Core problem solved
//!
//! Turn-based multi-agent simulations have constraints ordinary task
//! schedulers don't address:
//!
//! - **Per-turn latency ceiling**: every agent's work for a turn must land
//!   within a fixed wall-clock budget, not just "eventually".
//! - **LLM cost at agent-count scale**: naively calling a provider once per
//!   agent per turn is both slow and expensive; many calls are near-
//!   duplicates that batch or cache well.
//! - **Mixed sync/async work**: some tasks are pure async I/O, others are
//!   CPU-bound and must not block the scheduler.
//! - **Predictable degradation**: under load the runtime should throttle
//!   and prioritize rather than fail outright.
//!
//! ## Key components
//!
//! - **Resource Monitor (C1)**: samples host load, recommends worker counts.
//! - **Cost Tracker (C2)**: hourly/daily monetary budget with rollover.
//! - **Performance Budget (C3)**: per-turn wall-clock budget and history.
//! - **Multi-Level Cache (C4)**: L1/L2/L3 hierarchy with pluggable eviction.
//! - **Prefetcher (C5)**: predicts and warms likely-next cache keys.
//! - **Concurrent Processor (C6)**: bounded priority-queued task execution.
//! - **LLM Coordinator (C7)**: batch assembly, immediate bypass, templates.
//! - **LLM-Response Cache (C8)**: deterministic keys and similarity lookup.
//!
//! ## Quick example
//!
//! ```rust,no_run
//! use agent_turn_runtime::builders::build_runtime;
//! use agent_turn_runtime::config::RuntimeConfig;
//! use agent_turn_runtime::runtime::TokioSpawner;
//!
//! // See tests/ for complete end-to-end scenarios (S1-S6).
//! fn load_config() -> RuntimeConfig {
//!     unimplemented!()
//! }
//! ```
//!
//! For complete examples, see:
//! - `tests/` - end-to-end scenario tests
//! - `DESIGN.md` - component grounding and design decisions

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Builders that wire components together from configuration.
pub mod builders;
/// Multi-Level Cache (C4), Prefetcher (C5), and LLM-Response Cache (C8).
pub mod cache;
/// Configuration models for the runtime's components.
pub mod config;
/// Core data model: priorities, task lifecycle, work items, errors.
pub mod core;
/// LLM Coordinator (C7): batching, templates, provider port.
pub mod coordinator;
/// Cost Tracker (C2).
pub mod cost_tracker;
/// Performance Budget (C3).
pub mod performance_budget;
/// Concurrent Processor (C6).
pub mod processor;
/// Resource Monitor (C1).
pub mod resource_monitor;
/// Runtime wiring and the top-level `Runtime` handle.
pub mod runtime;
/// Internal synchronization primitives.
pub mod sync;
/// Shared utilities (clock, telemetry).
pub mod util;
