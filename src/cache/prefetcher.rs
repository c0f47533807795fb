//! Prefetcher (C5): watches world-state requests and warms the cache with
//! predicted next keys.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;

use super::multilevel::MultiLevelCache;
use crate::core::Spawn;
use crate::sync::Mutex;

const HISTORY_CAPACITY: usize = 100;
const MIN_HISTORY_FOR_PREDICTION: usize = 3;
const TOP_CO_OCCURRING_AGENTS: usize = 3;
const PREFETCH_TTL_SECS: u64 = 30 * 60;

#[derive(Default)]
struct AgentPattern {
    recent_requests: VecDeque<Value>,
    co_occurrence: HashMap<String, u64>,
}

/// Observes C4 traffic (indirectly, via `Observe` calls from the caller)
/// and triggers background cache warms for keys it predicts will be
/// requested soon.
pub struct Prefetcher<S: Spawn> {
    patterns: Mutex<HashMap<String, AgentPattern>>,
    cache: Arc<MultiLevelCache<Value>>,
    spawner: S,
}

impl<S: Spawn + Clone + 'static> Prefetcher<S> {
    /// Create a prefetcher warming `cache` using `spawner` for its
    /// background activities.
    #[must_use]
    pub fn new(cache: Arc<MultiLevelCache<Value>>, spawner: S) -> Self {
        Self {
            patterns: Mutex::new(HashMap::new()),
            cache,
            spawner,
        }
    }

    /// Record one world-state request for `agent_id` and, once enough
    /// history has accumulated, spawn background warms for predicted keys.
    /// Never blocks the caller: prediction and warming both run on the
    /// spawner.
    pub fn observe(&self, agent_id: &str, world_state_request: Value) {
        let predicted_keys = {
            let mut patterns = self.patterns.lock();
            let pattern = patterns.entry(agent_id.to_string()).or_default();

            if pattern.recent_requests.len() >= HISTORY_CAPACITY {
                pattern.recent_requests.pop_front();
            }
            pattern.recent_requests.push_back(world_state_request.clone());

            if let Some(requesting_agent) = world_state_request
                .get("requesting_agent")
                .and_then(Value::as_str)
            {
                *pattern.co_occurrence.entry(requesting_agent.to_string()).or_insert(0) += 1;
            }

            if pattern.recent_requests.len() < MIN_HISTORY_FOR_PREDICTION {
                Vec::new()
            } else {
                predict_keys(&world_state_request, pattern)
            }
        };

        if predicted_keys.is_empty() {
            return;
        }

        let cache = Arc::clone(&self.cache);
        self.spawner.spawn(async move {
            for key in predicted_keys {
                if cache.get(&key).await.ok().flatten().is_some() {
                    continue;
                }
                let placeholder = Value::String(format!("prefetched:{key}"));
                let _ = cache.put(&key, placeholder, Some(PREFETCH_TTL_SECS)).await;
            }
        });
    }
}

fn predict_keys(request: &Value, pattern: &AgentPattern) -> Vec<String> {
    let mut keys = Vec::new();

    if let Some(turn) = request.get("current_turn").and_then(Value::as_u64) {
        keys.push(format!("world_state_turn_{}", turn + 1));
    }

    if request.get("requesting_agent").and_then(Value::as_str).is_some() {
        let mut counts: Vec<(&String, &u64)> = pattern.co_occurrence.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (agent_id, _) in counts.into_iter().take(TOP_CO_OCCURRING_AGENTS) {
            keys.push(format!("agent_state_{agent_id}"));
        }
    }

    keys
}
