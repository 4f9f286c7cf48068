//! 进程内 TTL 缓存。
//!
//! 只在读取时检查过期，不主动清理；失败结果不会写入缓存。

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// 带固定 TTL 的键值表。
#[derive(Debug)]
pub struct TtlMap<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// 仅在未过期时返回缓存值。
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.value.clone()),
            _ => None,
        }
    }

    pub async fn insert(&self, key: K, value: V) {
        let expires_at = Instant::now() + self.ttl;
        let mut entries = self.entries.lock().await;
        entries.insert(key, CacheEntry { value, expires_at });
    }

    /// 命中则直接返回，否则执行 `compute` 并写入新的条目。
    ///
    /// 计算期间不持有锁，并发未命中会各自计算，后写入者覆盖。
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            return Ok(value);
        }
        let value = compute().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn second_lookup_within_ttl_is_served_from_cache() {
        let map: TtlMap<&str, u64> = TtlMap::new(Duration::from_secs(300));
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        for _ in 0..2 {
            let value = map
                .get_or_try_insert_with("abc", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(42)
                })
                .await;
            assert_eq!(value, Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_recomputed() {
        let map: TtlMap<&str, u64> = TtlMap::new(Duration::ZERO);
        map.insert("abc", 1).await;
        assert_eq!(map.get(&"abc").await, None);

        let value = map
            .get_or_try_insert_with("abc", || async { Ok::<_, ()>(2) })
            .await;
        assert_eq!(value, Ok(2));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let map: TtlMap<&str, u64> = TtlMap::new(Duration::from_secs(300));
        let failed = map
            .get_or_try_insert_with("abc", || async { Err::<u64, _>("boom") })
            .await;
        assert_eq!(failed, Err("boom"));
        assert_eq!(map.get(&"abc").await, None);

        let value = map
            .get_or_try_insert_with("abc", || async { Ok::<_, &str>(7) })
            .await;
        assert_eq!(value, Ok(7));
    }
}
