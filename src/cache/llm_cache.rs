//! Specialized LLM-Response Cache (C8): deterministic key derivation and
//! similarity lookup layered directly on the Multi-Level Cache.

use std::collections::{BTreeMap, HashSet};

use md5::{Digest, Md5};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::multilevel::MultiLevelCache;
use crate::core::CoreError;

const CONTEXT_DIGEST_LEN: usize = 16;

/// Collapse whitespace, lowercase, and strip spacing around trivial
/// punctuation so semantically identical prompts derive the same key.
#[must_use]
pub fn normalize(prompt: &str) -> String {
    let collapsed: String = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
    let lowered = collapsed.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut chars = lowered.chars().peekable();
    while let Some(c) = chars.next() {
        if matches!(c, ',' | '.' | '!' | '?' | ';' | ':') {
            out.push(c);
            while chars.peek() == Some(&' ') {
                chars.next();
            }
            if chars.peek().is_some() {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
    }
    out.trim().to_string()
}

/// Serialize `context` with keys sorted for a stable ordering, hash it,
/// and truncate to a short fixed length.
#[must_use]
pub fn context_digest(context: &BTreeMap<String, Value>) -> String {
    let serialized = serde_json::to_vec(context).unwrap_or_default();
    let mut hasher = Md5::new();
    hasher.update(&serialized);
    let full = hex::encode(hasher.finalize());
    full.chars().take(CONTEXT_DIGEST_LEN).collect()
}

/// Deterministic cache key for one LLM request.
#[must_use]
pub fn derive_key(agent_id: &str, prompt: &str, context: &BTreeMap<String, Value>) -> String {
    let normalized_prompt = normalize(prompt);
    let digest = context_digest(context);
    let mut hasher = Md5::new();
    hasher.update(format!("{agent_id}:{normalized_prompt}:{digest}").as_bytes());
    hex::encode(hasher.finalize())
}

fn tokenize(key: &str) -> HashSet<&str> {
    key.split_whitespace().collect()
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let ratio = intersection as f64 / union as f64;
        ratio
    }
}

/// Thin wrapper over [`MultiLevelCache`] adding deterministic keys and an
/// optional similarity fallback.
pub struct LlmResponseCache<V> {
    backing: MultiLevelCache<V>,
}

impl<V> LlmResponseCache<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Wrap an existing [`MultiLevelCache`] as the LLM response backing
    /// store.
    #[must_use]
    pub fn new(backing: MultiLevelCache<V>) -> Self {
        Self { backing }
    }

    /// Exact lookup, delegating directly to the backing cache.
    pub async fn get(&self, key: &str) -> Result<Option<V>, CoreError> {
        self.backing.get(key).await
    }

    /// Store a response under its derived key.
    pub async fn put(&self, key: &str, value: V, ttl_secs: Option<u64>) -> Result<bool, CoreError> {
        self.backing.put(key, value, ttl_secs).await
    }

    /// Scan L1 keys for one whose whitespace-tokenized Jaccard similarity
    /// to `key` meets `threshold`, and return its value if found. Bounded
    /// by the current L1 size.
    pub async fn get_similar(&self, key: &str, threshold: f64) -> Result<Option<V>, CoreError> {
        let target = tokenize(key);
        let candidates = self.backing.l1_keys().await;
        for candidate in candidates {
            if candidate == key {
                continue;
            }
            let candidate_tokens = tokenize(&candidate);
            if jaccard(&target, &candidate_tokens) >= threshold {
                if let Some(value) = self.backing.get(&candidate).await? {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }
}
