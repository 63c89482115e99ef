//! Integration tests for rhtmx-cache against the wall clock

use rhtmx_cache::TtlCache;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_short_ttl_expires_in_real_time() {
    let cache: TtlCache<String> = TtlCache::new();
    cache.set("k", "v".to_string(), 10);

    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(cache.get("k"), None);
}

#[tokio::test]
async fn test_permanent_entry_survives_real_time() {
    let cache: TtlCache<String> = TtlCache::new();
    cache.set("k", "v".to_string(), 0);

    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(cache.get("k"), Some("v".to_string()));
}

#[tokio::test]
async fn test_shared_between_tasks() {
    let cache: Arc<TtlCache<u64>> = Arc::new(TtlCache::new());

    let handles: Vec<_> = (0..8u64)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache.set(&format!("key-{}", i), i, 0);
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(cache.stats().valid, 8);
    assert_eq!(cache.get("key-3"), Some(3));
}
