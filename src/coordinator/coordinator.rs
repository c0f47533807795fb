//! LLM Coordinator (C7): batch assembly by request type, immediate-bypass
//! policy, dispatch to the provider port, and result fan-out.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::provider::Generate;
use super::templates::{build_combined_prompt, parse_combined_response};
use super::types::{estimate_tokens, CoordinatorStats, LlmBatchRequest, LlmResult, RequestType};
use crate::cache::LlmResponseCache;
use crate::core::{CoreError, Priority, Spawn};
use crate::cost_tracker::CostTracker;
use crate::performance_budget::PerformanceBudget;
use crate::sync::{Mutex, RwLock};
use crate::util::clock::now_ms;

const RESULT_POLL_INTERVAL_MS: u64 = 50;
const IDLE_BACKOFF_MS: u64 = 20;
const GRACE_BEFORE_TIMEOUT: Duration = Duration::from_millis(500);
const ADAPTIVE_TARGET_BYPASS_RATE: f64 = 0.3;

/// Construction-time tuning for an [`LLMCoordinator`].
///
/// `max_batch_size`, `batch_timeout_ms`, and `batch_priority_threshold`
/// are only the *initial* values: the adaptive tuner mutates its own live
/// copy from here on, leaving this config immutable.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CoordinatorConfig {
    /// Monetary cost charged per estimated token.
    pub unit_cost_per_token: f64,
    /// TTL applied to responses stored in the C8 cache.
    pub response_ttl_secs: Option<u64>,
    /// Bound on the batch-request queue; exceeding it rejects submissions.
    pub max_queue_depth: usize,
    /// Initial cap on items popped into one sub-batch group.
    pub max_batch_size: usize,
    /// Initial max wait before a partial batch is dispatched anyway.
    pub batch_timeout_ms: u64,
    /// Initial normalized-priority bypass threshold.
    pub batch_priority_threshold: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            unit_cost_per_token: 0.000_002,
            response_ttl_secs: Some(3600),
            max_queue_depth: 1000,
            max_batch_size: 5,
            batch_timeout_ms: 2000,
            batch_priority_threshold: 0.7,
        }
    }
}

impl CoordinatorConfig {
    /// Validate this config's fields fall within the adaptive tuner's
    /// bounded ranges.
    pub fn validate(&self) -> Result<(), String> {
        if !(3..=7).contains(&self.max_batch_size) {
            return Err("max_batch_size must be within [3, 7]".to_string());
        }
        if !(1000..=3000).contains(&self.batch_timeout_ms) {
            return Err("batch_timeout_ms must be within [1000, 3000]".to_string());
        }
        if !(0.5..=0.9).contains(&self.batch_priority_threshold) {
            return Err("batch_priority_threshold must be within [0.5, 0.9]".to_string());
        }
        if self.unit_cost_per_token < 0.0 {
            return Err("unit_cost_per_token must be non-negative".to_string());
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// The subset of the coordinator config's bounded ranges mutated live by
/// the adaptive tuner.
#[derive(Debug, Clone)]
struct Tunables {
    max_batch_size: usize,
    batch_timeout_ms: u64,
    batch_priority_threshold: f64,
}

impl From<&CoordinatorConfig> for Tunables {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            max_batch_size: config.max_batch_size,
            batch_timeout_ms: config.batch_timeout_ms,
            batch_priority_threshold: config.batch_priority_threshold,
        }
    }
}

struct OrderedRequest(LlmBatchRequest);

impl PartialEq for OrderedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.0.request_id == other.0.request_id
    }
}
impl Eq for OrderedRequest {}

impl PartialOrd for OrderedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .priority
            .cmp(&other.0.priority)
            .then_with(|| other.0.created_at_ms.cmp(&self.0.created_at_ms))
    }
}

/// Coordinates LLM calls across immediate dispatch and batched sub-batches,
/// per request type, backed by C2/C3/C8.
pub struct LLMCoordinator<P: Generate, S: Spawn> {
    config: CoordinatorConfig,
    tunables: RwLock<Tunables>,
    cost_tracker: Arc<CostTracker>,
    perf_budget: Arc<PerformanceBudget>,
    cache: Arc<LlmResponseCache<String>>,
    provider: Arc<P>,
    spawner: S,
    queue: Mutex<BinaryHeap<OrderedRequest>>,
    results: Mutex<HashMap<String, LlmResult>>,
    stats: Mutex<CoordinatorStats>,
    running: AtomicBool,
}

impl<P: Generate, S: Spawn + Clone + 'static> LLMCoordinator<P, S> {
    /// Construct a coordinator. Does not start the batch processor; call
    /// [`Self::start`] once wrapped in an `Arc`.
    #[must_use]
    pub fn new(
        config: CoordinatorConfig,
        cost_tracker: Arc<CostTracker>,
        perf_budget: Arc<PerformanceBudget>,
        cache: Arc<LlmResponseCache<String>>,
        provider: P,
        spawner: S,
    ) -> Self {
        Self {
            tunables: RwLock::new(Tunables::from(&config)),
            config,
            cost_tracker,
            perf_budget,
            cache,
            provider: Arc::new(provider),
            spawner,
            queue: Mutex::new(BinaryHeap::new()),
            results: Mutex::new(HashMap::new()),
            stats: Mutex::new(CoordinatorStats::default()),
            running: AtomicBool::new(false),
        }
    }

    /// Start the background batch-processor activity. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, AtomicOrdering::SeqCst) {
            return;
        }
        let this = Arc::clone(self);
        self.spawner.spawn(async move { this.run_batch_processor().await });
    }

    /// Stop accepting new submissions and halt the batch processor after
    /// its current sub-batch. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, AtomicOrdering::SeqCst);
    }

    /// Current aggregate counters.
    #[must_use]
    pub fn snapshot(&self) -> CoordinatorStats {
        self.stats.lock().clone()
    }

    /// Submit one request for dispatch, batched or immediate per the
    /// budget/bypass decision tree below, and block (via polling) until
    /// it resolves or times out.
    pub async fn queue_request(
        &self,
        request_type: RequestType,
        agent_id: &str,
        prompt: &str,
        context: std::collections::BTreeMap<String, serde_json::Value>,
        priority: Priority,
        timeout: Duration,
    ) -> LlmResult {
        self.stats.lock().total_calls += 1;

        let tokens = estimate_tokens(prompt);
        #[allow(clippy::cast_precision_loss)]
        let cost = tokens as f64 * self.config.unit_cost_per_token;

        if !self.cost_tracker.can_afford(cost) {
            return LlmResult::err("Budget exceeded");
        }

        if self.perf_budget.exceeded() {
            self.stats.lock().budget_violations += 1;
            return LlmResult::err("Turn time budget exceeded");
        }

        let effective_timeout = match self.perf_budget.remaining() {
            Some(remaining_ms) if remaining_ms > 0 => {
                let remaining = Duration::from_millis(u64::try_from(remaining_ms).unwrap_or(u64::MAX))
                    .saturating_sub(GRACE_BEFORE_TIMEOUT);
                remaining.min(timeout)
            }
            _ => timeout,
        };

        let request = LlmBatchRequest {
            request_id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            prompt: prompt.to_string(),
            context,
            request_type,
            priority,
            created_at_ms: now_ms(),
            timeout: effective_timeout,
        };

        let threshold = self.tunables.read().batch_priority_threshold;
        let bypass = matches!(priority, Priority::Critical | Priority::High) && priority.normalized() <= threshold;

        if bypass {
            self.dispatch_immediate(request, cost, tokens).await
        } else {
            match self.enqueue(request) {
                Ok(request_id) => self.await_result(&request_id, effective_timeout).await,
                Err(e) => LlmResult::err(e.to_string()),
            }
        }
    }

    async fn dispatch_immediate(&self, request: LlmBatchRequest, cost: f64, tokens: u64) -> LlmResult {
        self.stats.lock().total_immediate += 1;

        let key = crate::cache::llm_cache::derive_key(&request.agent_id, &request.prompt, &request.context);
        match self.cache.get(&key).await {
            Ok(Some(cached)) => return LlmResult::ok(cached),
            Ok(None) => {}
            Err(_) => {}
        }

        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(request.timeout, self.provider.generate(&request.prompt)).await;
        let duration = started.elapsed();

        match outcome {
            Ok(Ok(response)) => {
                self.cost_tracker.update(request.request_type.label(), cost, tokens);
                self.perf_budget.record_call(duration);
                let _ = self.cache.put(&key, response.clone(), self.config.response_ttl_secs).await;
                self.stats.lock().cost_savings_estimate += 1.5 * cost - cost;
                LlmResult::ok(response)
            }
            Ok(Err(e)) => LlmResult::err(e),
            Err(_) => LlmResult::err("Request timeout"),
        }
    }

    fn enqueue(&self, request: LlmBatchRequest) -> Result<String, CoreError> {
        if !self.running.load(AtomicOrdering::SeqCst) {
            return Err(CoreError::ShuttingDown);
        }
        let mut queue = self.queue.lock();
        if queue.len() >= self.config.max_queue_depth {
            return Err(CoreError::QueueFull(format!(
                "coordinator batch queue at capacity ({})",
                self.config.max_queue_depth
            )));
        }
        let request_id = request.request_id.clone();
        queue.push(OrderedRequest(request));
        Ok(request_id)
    }

    async fn await_result(&self, request_id: &str, timeout: Duration) -> LlmResult {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(result) = self.results.lock().remove(request_id) {
                return result;
            }
            if tokio::time::Instant::now() >= deadline {
                return LlmResult::err("Request timeout");
            }
            tokio::time::sleep(Duration::from_millis(RESULT_POLL_INTERVAL_MS)).await;
        }
    }

    async fn run_batch_processor(&self) {
        while self.running.load(AtomicOrdering::SeqCst) {
            let max_batch_size = self.tunables.read().max_batch_size;
            let batch_timeout_ms = self.tunables.read().batch_timeout_ms;

            let ready = {
                let queue = self.queue.lock();
                if queue.is_empty() {
                    false
                } else if queue.len() >= max_batch_size {
                    true
                } else {
                    let oldest_wait = queue
                        .iter()
                        .map(|r| now_ms().saturating_sub(r.0.created_at_ms))
                        .max()
                        .unwrap_or(0);
                    oldest_wait >= u128::from(batch_timeout_ms) || self.perf_budget.exceeded()
                }
            };

            if !ready {
                tokio::time::sleep(Duration::from_millis(IDLE_BACKOFF_MS)).await;
                continue;
            }

            let popped = {
                let mut queue = self.queue.lock();
                let n = max_batch_size.min(queue.len());
                (0..n).filter_map(|_| queue.pop().map(|o| o.0)).collect::<Vec<_>>()
            };
            if popped.is_empty() {
                continue;
            }

            let mut sub_batches: HashMap<RequestType, Vec<LlmBatchRequest>> = HashMap::new();
            for item in popped {
                sub_batches.entry(item.request_type).or_default().push(item);
            }

            for (request_type, items) in sub_batches {
                self.run_sub_batch(request_type, items).await;
            }
        }
    }

    async fn run_sub_batch(&self, request_type: RequestType, items: Vec<LlmBatchRequest>) {
        let n = items.len();
        let combined_prompt = build_combined_prompt(request_type, &items);
        let sub_batch_timeout =
            items.iter().map(|i| i.timeout).max().unwrap_or(Duration::from_secs(30));

        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(sub_batch_timeout, self.provider.generate(&combined_prompt)).await;
        let duration = started.elapsed();
        self.perf_budget.record_batch(duration);

        {
            let mut stats = self.stats.lock();
            stats.total_batched += u64::try_from(n).unwrap_or(u64::MAX);
        }

        match outcome {
            Ok(Ok(raw)) => {
                let parsed = parse_combined_response(request_type, &raw, n);
                let mut resolved = Vec::with_capacity(n);
                for (item, body) in items.iter().zip(parsed) {
                    let tokens = estimate_tokens(&item.prompt);
                    #[allow(clippy::cast_precision_loss)]
                    let cost = tokens as f64 * self.config.unit_cost_per_token;
                    self.cost_tracker.update(item.request_type.label(), cost, tokens);

                    let result = match body {
                        Ok(text) => {
                            let key = crate::cache::llm_cache::derive_key(&item.agent_id, &item.prompt, &item.context);
                            let _ = self.cache.put(&key, text.clone(), self.config.response_ttl_secs).await;
                            LlmResult::ok(text)
                        }
                        Err(raw_body) => LlmResult::parse_failure(raw_body),
                    };
                    resolved.push((item.request_id.clone(), result));
                }
                let mut results = self.results.lock();
                for (request_id, result) in resolved {
                    results.insert(request_id, result);
                }
                drop(results);
                self.stats.lock().cost_savings_estimate += 0.5 * f64::from(u32::try_from(n).unwrap_or(u32::MAX));
            }
            Ok(Err(e)) => {
                let mut results = self.results.lock();
                for item in &items {
                    results.insert(item.request_id.clone(), LlmResult::err(e.clone()));
                }
            }
            Err(_) => {
                let mut results = self.results.lock();
                for item in &items {
                    results.insert(item.request_id.clone(), LlmResult::err("Request timeout"));
                }
            }
        }
    }

    /// Periodically mutate batching knobs within their bounded ranges
    /// based on measured traffic.
    pub async fn run_adaptive_tuning(self: &Arc<Self>, interval: Duration) {
        let mut last_violations = self.perf_budget.violation_count();
        while self.running.load(AtomicOrdering::SeqCst) {
            tokio::time::sleep(interval).await;

            let stats = self.stats.lock().clone();
            let mut tunables = self.tunables.write();

            let violations = self.perf_budget.violation_count();
            if violations > last_violations {
                tunables.batch_timeout_ms = tunables.batch_timeout_ms.saturating_sub(200).max(1000);
            } else {
                tunables.batch_timeout_ms = (tunables.batch_timeout_ms + 200).min(3000);
            }
            last_violations = violations;

            if let Some(mean_batch_ms) = self.perf_budget.mean_batch_duration_ms() {
                if mean_batch_ms < f64::from(u32::try_from(tunables.batch_timeout_ms).unwrap_or(u32::MAX)) / 2.0 {
                    tunables.max_batch_size = (tunables.max_batch_size + 1).min(7);
                } else {
                    tunables.max_batch_size = tunables.max_batch_size.saturating_sub(1).max(3);
                }
            }

            let bypass_rate = stats.batch_efficiency().mul_add(-1.0, 1.0);
            if bypass_rate > ADAPTIVE_TARGET_BYPASS_RATE {
                tunables.batch_priority_threshold = (tunables.batch_priority_threshold - 0.1).max(0.5);
            } else {
                tunables.batch_priority_threshold = (tunables.batch_priority_threshold + 0.1).min(0.9);
            }
        }
    }
}
