//! Eviction strategies for the Multi-Level Cache.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::entry::CacheEntry;
use crate::util::clock::now_secs;

/// Common bookkeeping fields an eviction strategy needs, implemented by
/// both the native `CacheEntry<V>` (L1/L2) and the L3 on-disk stub so one
/// set of strategy functions serves all three tiers.
pub trait EvictionProfile {
    /// Seconds since epoch of the most recent access.
    fn last_accessed(&self) -> u64;
    /// Seconds since epoch of creation.
    fn created_at(&self) -> u64;
    /// Number of times this entry has been read.
    fn access_count(&self) -> u64;
    /// Best-effort serialized size in bytes.
    fn size_bytes(&self) -> usize;
    /// Bounded ring of recent access timestamps.
    fn access_times(&self) -> &VecDeque<u64>;
}

impl<V> EvictionProfile for CacheEntry<V> {
    fn last_accessed(&self) -> u64 {
        self.last_accessed
    }
    fn created_at(&self) -> u64 {
        self.created_at
    }
    fn access_count(&self) -> u64 {
        self.access_count
    }
    fn size_bytes(&self) -> usize {
        self.size_bytes
    }
    fn access_times(&self) -> &VecDeque<u64> {
        &self.access_times
    }
}

/// Selectable eviction policy, set once per cache at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionStrategy {
    /// Evict the entry with the oldest `last_accessed`.
    Lru,
    /// Evict the entry with the smallest `access_count`.
    Lfu,
    /// Evict the entry with the oldest `created_at`.
    Fifo,
    /// Evict the entry with the highest weighted score (see
    /// [`adaptive_score`]).
    Adaptive,
}

/// Score used by `ADAPTIVE` eviction: higher means less valuable, i.e. a
/// better eviction candidate.
///
/// `score = 0.4*recency_s + 0.3*(1/access_count) + 0.2*(size_bytes/1024)
/// - 0.1*predicted_future_access`
#[must_use]
pub fn adaptive_score<E: EvictionProfile>(entry: &E) -> f64 {
    let now = now_secs();
    let recency_s = now.saturating_sub(entry.last_accessed());
    #[allow(clippy::cast_precision_loss)]
    let recency_term = 0.4 * recency_s as f64;
    #[allow(clippy::cast_precision_loss)]
    let frequency_term = 0.3 * (1.0 / entry.access_count() as f64);
    #[allow(clippy::cast_precision_loss)]
    let size_term = 0.2 * (entry.size_bytes() as f64 / 1024.0);
    let predicted = predicted_future_access(entry, now);

    recency_term + frequency_term + size_term - 0.1 * predicted
}

/// Likelihood (`[0,1]`) that this entry will be accessed again soon, based
/// on the mean interval between its recorded accesses.
fn predicted_future_access<E: EvictionProfile>(entry: &E, now: u64) -> f64 {
    if entry.access_times().len() < 2 {
        return 0.0;
    }
    let times: Vec<u64> = entry.access_times().iter().copied().collect();
    let intervals: Vec<u64> = times.windows(2).map(|w| w[1].saturating_sub(w[0])).collect();
    if intervals.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean_interval = intervals.iter().sum::<u64>() as f64 / intervals.len() as f64;
    if mean_interval <= 0.0 {
        return 0.0;
    }
    let elapsed = now.saturating_sub(entry.last_accessed());
    #[allow(clippy::cast_precision_loss)]
    let elapsed = elapsed as f64;
    if elapsed < mean_interval {
        1.0 - (elapsed / mean_interval)
    } else {
        0.0
    }
}

/// Pick the key of the entry `strategy` would evict from `entries`, or
/// `None` if `entries` is empty.
pub fn select_victim<'a, E, I>(strategy: EvictionStrategy, entries: I) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, &'a E)>,
    E: EvictionProfile + 'a,
{
    match strategy {
        EvictionStrategy::Lru => entries
            .into_iter()
            .min_by_key(|(_, e)| e.last_accessed())
            .map(|(k, _)| k),
        EvictionStrategy::Lfu => entries
            .into_iter()
            .min_by_key(|(_, e)| e.access_count())
            .map(|(k, _)| k),
        EvictionStrategy::Fifo => entries
            .into_iter()
            .min_by_key(|(_, e)| e.created_at())
            .map(|(k, _)| k),
        EvictionStrategy::Adaptive => entries
            .into_iter()
            .max_by(|(_, a), (_, b)| {
                adaptive_score(*a)
                    .partial_cmp(&adaptive_score(*b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(k, _)| k),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry_with(last_accessed: u64, created_at: u64, access_count: u64) -> CacheEntry<i32> {
        let mut e = CacheEntry::new(0, None, 0);
        e.last_accessed = last_accessed;
        e.created_at = created_at;
        e.access_count = access_count;
        e
    }

    #[test]
    fn lru_picks_oldest_last_accessed() {
        let mut map: HashMap<&str, CacheEntry<i32>> = HashMap::new();
        map.insert("a", entry_with(100, 0, 1));
        map.insert("b", entry_with(50, 0, 1));
        let victim = select_victim(EvictionStrategy::Lru, map.iter().map(|(k, v)| (*k, v)));
        assert_eq!(victim, Some("b"));
    }

    #[test]
    fn lfu_picks_smallest_access_count() {
        let mut map: HashMap<&str, CacheEntry<i32>> = HashMap::new();
        map.insert("a", entry_with(0, 0, 5));
        map.insert("b", entry_with(0, 0, 1));
        let victim = select_victim(EvictionStrategy::Lfu, map.iter().map(|(k, v)| (*k, v)));
        assert_eq!(victim, Some("b"));
    }

    #[test]
    fn fifo_picks_oldest_created_at() {
        let mut map: HashMap<&str, CacheEntry<i32>> = HashMap::new();
        map.insert("a", entry_with(0, 200, 1));
        map.insert("b", entry_with(0, 100, 1));
        let victim = select_victim(EvictionStrategy::Fifo, map.iter().map(|(k, v)| (*k, v)));
        assert_eq!(victim, Some("b"));
    }

    #[test]
    fn select_victim_is_none_for_empty_map() {
        let map: HashMap<&str, CacheEntry<i32>> = HashMap::new();
        assert!(select_victim(EvictionStrategy::Lru, map.iter().map(|(k, v)| (*k, v))).is_none());
    }

    #[test]
    fn predicted_future_access_is_zero_with_fewer_than_two_samples() {
        let e = CacheEntry::new(0, None, 0);
        assert!((predicted_future_access(&e, now_secs()) - 0.0).abs() < f64::EPSILON);
    }
}
