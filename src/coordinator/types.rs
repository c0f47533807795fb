//! Request/response types shared by the LLM Coordinator (C7).

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Priority;

/// Which prompt template/marker family a request belongs to. Drives
/// sub-batch grouping, template selection, and marker parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Character dialogue generation; `SCENARIO_i_RESPONSE:` markers.
    Dialogue,
    /// Multi-agent coordination analysis; `SITUATION_i_ANALYSIS:` markers.
    Coordination,
    /// Anything else; `REQUEST_i_RESPONSE:` markers.
    Generic,
}

impl RequestType {
    /// The string key this request type is recorded under in cost/stat
    /// breakdowns.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Dialogue => "dialogue",
            Self::Coordination => "coordination",
            Self::Generic => "generic",
        }
    }
}

/// One request queued for batching.
#[derive(Debug, Clone)]
pub struct LlmBatchRequest {
    /// Caller-visible identifier, used for result fan-out.
    pub request_id: String,
    /// Which agent issued this request.
    pub agent_id: String,
    /// The request's prompt text.
    pub prompt: String,
    /// Type-specific structured context (e.g. participants, comm_type).
    pub context: BTreeMap<String, Value>,
    /// Template/marker family.
    pub request_type: RequestType,
    /// Scheduling priority.
    pub priority: Priority,
    /// Milliseconds since epoch when this request was queued.
    pub created_at_ms: u128,
    /// Caller-supplied timeout for this request.
    pub timeout: Duration,
}

/// Outcome of one `queue_request` call.
#[derive(Debug, Clone)]
pub struct LlmResult {
    /// Whether the request ultimately succeeded.
    pub ok: bool,
    /// The provider's response text, when `ok`.
    pub response: Option<String>,
    /// Failure reason, when `!ok`.
    pub error: Option<String>,
}

impl LlmResult {
    /// A successful result carrying `response`.
    #[must_use]
    pub fn ok(response: String) -> Self {
        Self { ok: true, response: Some(response), error: None }
    }

    /// A failed result carrying `error`.
    #[must_use]
    pub fn err(error: impl Into<String>) -> Self {
        Self { ok: false, response: None, error: Some(error.into()) }
    }

    /// A batch item whose marker could not be found in the combined
    /// reply; carries the full raw body alongside the fixed error text.
    #[must_use]
    pub fn parse_failure(raw_body: String) -> Self {
        Self { ok: false, response: Some(raw_body), error: Some("Failed to parse batch response".to_string()) }
    }
}

/// Aggregate counters exposed by `LLMCoordinator::snapshot`.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorStats {
    /// Total `queue_request` calls.
    pub total_calls: u64,
    /// Calls that went through the batch path.
    pub total_batched: u64,
    /// Calls that bypassed batching for immediate dispatch.
    pub total_immediate: u64,
    /// Heuristic estimate of cost saved by batching vs. per-item calls.
    pub cost_savings_estimate: f64,
    /// Count of requests short-circuited by an exceeded performance budget.
    pub budget_violations: u64,
}

impl CoordinatorStats {
    /// Fraction of calls that were batched rather than dispatched
    /// immediately, `0.0` with no traffic.
    #[must_use]
    pub fn batch_efficiency(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let ratio = self.total_batched as f64 / self.total_calls as f64;
            ratio
        }
    }
}

/// Rough token-count estimate: `words * 1.3`, rounded up.
#[must_use]
pub fn estimate_tokens(prompt: &str) -> u64 {
    let words = prompt.split_whitespace().count();
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let tokens = (words as f64 * 1.3).ceil() as u64;
    tokens
}
