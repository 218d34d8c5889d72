//! Per-entity TTL cache for externally fetched detail records.

use std::future::Future;
use std::time::{Duration, Instant};

use laguna_scene::EntityId;
use rustc_hash::FxHashMap;

/// Hit/miss counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordStats {
    pub hits: u64,
    pub misses: u64,
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// TTL cache keyed by entity id.
pub struct RecordCache<V> {
    ttl: Duration,
    entries: FxHashMap<EntityId, Entry<V>>,
    stats: RecordStats,
}

impl<V: Clone> RecordCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: FxHashMap::default(),
            stats: RecordStats::default(),
        }
    }

    /// Fresh cached value, if any.
    pub fn get(&self, id: &EntityId, now: Instant) -> Option<&V> {
        self.entries
            .get(id)
            .filter(|e| e.expires_at > now)
            .map(|e| &e.value)
    }

    pub fn insert(&mut self, id: EntityId, value: V, now: Instant) {
        self.entries.insert(
            id,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn invalidate(&mut self, id: &EntityId) -> Option<V> {
        self.entries.remove(id).map(|e| e.value)
    }

    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before - self.entries.len()
    }

    /// Return the cached record or fetch, cache and return it. A hit never
    /// calls `fetch`; a failed fetch caches nothing.
    pub async fn get_or_fetch<F, Fut, E>(
        &mut self,
        id: &EntityId,
        now: Instant,
        fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce(EntityId) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(id, now).cloned() {
            self.stats.hits += 1;
            return Ok(value);
        }
        self.stats.misses += 1;
        tracing::trace!(id = %id, "Record cache miss");
        let value = fetch(id.clone()).await?;
        self.insert(id.clone(), value.clone(), now);
        Ok(value)
    }

    pub fn stats(&self) -> RecordStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_entries_expire() {
        let mut cache = RecordCache::new(Duration::from_secs(300));
        let now = Instant::now();
        let id = EntityId::new("bldg-1");
        cache.insert(id.clone(), 42u32, now);

        assert_eq!(cache.get(&id, now + Duration::from_secs(299)), Some(&42));
        assert_eq!(cache.get(&id, now + Duration::from_secs(300)), None);
        assert_eq!(cache.purge_expired(now + Duration::from_secs(301)), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_hit_skips_fetch() {
        let mut cache = RecordCache::new(Duration::from_secs(300));
        let now = Instant::now();
        let id = EntityId::new("bldg-1");
        let calls = Cell::new(0);

        for _ in 0..3 {
            let value: Result<String, ()> = cache
                .get_or_fetch(&id, now, |id| {
                    calls.set(calls.get() + 1);
                    async move { Ok(format!("record {id}")) }
                })
                .await;
            assert_eq!(value.unwrap(), "record bldg-1");
        }

        assert_eq!(calls.get(), 1);
        assert_eq!(cache.stats(), RecordStats { hits: 2, misses: 1 });
    }

    #[tokio::test]
    async fn test_failed_fetch_not_cached() {
        let mut cache: RecordCache<u32> = RecordCache::new(Duration::from_secs(300));
        let now = Instant::now();
        let id = EntityId::new("bldg-2");

        let err = cache
            .get_or_fetch(&id, now, |_| async { Err::<u32, _>("offline") })
            .await;
        assert_eq!(err, Err("offline"));
        assert!(cache.is_empty());

        let ok = cache
            .get_or_fetch(&id, now, |_| async { Ok::<_, &str>(7) })
            .await;
        assert_eq!(ok, Ok(7));
    }

    #[test]
    fn test_invalidate_returns_value() {
        let mut cache = RecordCache::new(Duration::from_secs(1));
        let id = EntityId::new("x");
        cache.insert(id.clone(), "v", Instant::now());
        assert_eq!(cache.invalidate(&id), Some("v"));
        assert_eq!(cache.invalidate(&id), None);
    }
}
