//! End-to-end scenario: with L1/L2/L3 each capped at two entries, filling
//! L1 past capacity cascades the LRU victim to L2, and reading that
//! victim back promotes it to L1 while evicting L1's now-LRU entry down.

use agent_turn_runtime::cache::{CacheLimits, EvictionStrategy, MultiLevelCache};

fn limits(dir: &std::path::Path) -> CacheLimits {
    CacheLimits {
        l1_max_size: 2,
        l2_max_size: 2,
        l3_max_size: 2,
        default_ttl_secs: None,
        strategy: EvictionStrategy::Lru,
        cache_directory: dir.to_path_buf(),
        max_total_bytes: None,
    }
}

#[tokio::test]
async fn filling_l1_past_capacity_cascades_the_lru_victim_to_l2() {
    let dir = tempfile::tempdir().unwrap();
    let cache: MultiLevelCache<i32> = MultiLevelCache::new(limits(dir.path()));

    cache.put("a", 1, None).await.unwrap();
    cache.put("b", 2, None).await.unwrap();
    cache.put("c", 3, None).await.unwrap();

    // "a" was the least-recently-touched of the three and should have
    // cascaded down to L2; it's still reachable, just not from L1.
    assert_eq!(cache.get("a").await.unwrap(), Some(1));

    let stats = cache.stats();
    assert!(stats.l2.hits >= 1, "expected the first lookup of \"a\" to hit L2: {stats:?}");

    // Reading "a" promotes it back to L1; a second read must be an L1 hit.
    let hits_before = cache.stats().l1.hits;
    assert_eq!(cache.get("a").await.unwrap(), Some(1));
    assert_eq!(cache.stats().l1.hits, hits_before + 1);
}
