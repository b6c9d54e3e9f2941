// formguard/src/state/store.rs
//
// Pluggable key/value backend for rate-limit state.
//
// The rate limiter only ever does get → compute → compare_and_swap, so any
// backend offering an atomic CAS per key (an in-process DashMap, or an external
// cache with WATCH/MULTI or a Lua script) can sit behind this trait.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::StoreError;

/// Values that can tell when they no longer influence any decision.
pub trait Expiring {
    fn is_stale(&self, now_ms: i64) -> bool;
}

#[async_trait]
pub trait StateStore<V>: Send + Sync
where
    V: Clone + PartialEq + Expiring + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, StoreError>;

    async fn set(&self, key: &str, value: V) -> Result<(), StoreError>;

    /// Install `new` only if the stored value still equals `expected`
    /// (`None` meaning "no entry"). Returns whether the swap happened.
    async fn compare_and_swap(
        &self,
        key:      &str,
        expected: Option<&V>,
        new:      V,
    ) -> Result<bool, StoreError>;

    /// Drop every stale entry; returns how many were removed.
    async fn purge_stale(&self, now_ms: i64) -> Result<usize, StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool { self.len() == 0 }
}

// ── In-process backend ───────────────────────────────────────────────────────

/// DashMap-backed store. The entry API holds the shard lock for the whole
/// compare-and-swap, and identifiers on different shards never contend.
pub struct MemoryStore<V> {
    map: DashMap<String, V>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self { map: DashMap::new() }
    }
}

impl<V> Default for MemoryStore<V> { fn default() -> Self { Self::new() } }

#[async_trait]
impl<V> StateStore<V> for MemoryStore<V>
where
    V: Clone + PartialEq + Expiring + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        Ok(self.map.get(key).map(|v| v.clone()))
    }

    async fn set(&self, key: &str, value: V) -> Result<(), StoreError> {
        self.map.insert(key.to_string(), value);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key:      &str,
        expected: Option<&V>,
        new:      V,
    ) -> Result<bool, StoreError> {
        let swapped = match self.map.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                if expected == Some(slot.get()) {
                    slot.insert(new);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                if expected.is_none() {
                    slot.insert(new);
                    true
                } else {
                    false
                }
            }
        };
        Ok(swapped)
    }

    async fn purge_stale(&self, now_ms: i64) -> Result<usize, StoreError> {
        let mut removed = 0usize;
        self.map.retain(|_, v| {
            let keep = !v.is_stale(now_ms);
            if !keep { removed += 1; }
            keep
        });
        Ok(removed)
    }

    fn len(&self) -> usize { self.map.len() }
}
