//! Two-tier record store shared by the page and fragment caches.
//!
//! The memory tier is a bounded LRU map and is authoritative for the life of
//! the process. The persistent tier is a [`CacheBucket`] used only to warm
//! the memory tier; its failures are logged and never propagated.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use lru::LruCache;
use pw_cache::{CacheBucket, CacheBucketExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::lock;

/// Memory tier plus the bookkeeping that keeps persistent reads from
/// resurrecting or overwriting newer state.
struct Memory<V> {
    entries: LruCache<String, V>,
    /// Bumped on every write or removal, before and after its persistent step.
    epoch: u64,
    /// Writes or removals whose persistent step has not finished.
    pending: usize,
}

pub(crate) struct TieredStore<V> {
    name: &'static str,
    memory: Mutex<Memory<V>>,
    persistent: Box<dyn CacheBucket>,
}

impl<V> TieredStore<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    pub(crate) fn new(
        name: &'static str,
        capacity: NonZeroUsize,
        persistent: Box<dyn CacheBucket>,
    ) -> Self {
        Self {
            name,
            memory: Mutex::new(Memory {
                entries: LruCache::new(capacity),
                epoch: 0,
                pending: 0,
            }),
            persistent,
        }
    }

    /// Memory first, then persistent. A persistent hit is promoted into
    /// memory (evicting the least recently used entry when full) only if no
    /// write or removal overlapped the read.
    pub(crate) fn get(&self, key: &str) -> Option<V> {
        let epoch = {
            let mut memory = lock::lock(&self.memory, self.name, "get");
            if let Some(value) = memory.entries.get(key) {
                tracing::debug!(cache = self.name, key, tier = "memory", "Cache hit");
                return Some(value.clone());
            }
            memory.epoch
        };

        let persisted = self.load_persisted(key);

        let mut memory = lock::lock(&self.memory, self.name, "get.promote");
        if let Some(value) = memory.entries.get(key) {
            tracing::debug!(cache = self.name, key, tier = "memory", "Cache hit");
            return Some(value.clone());
        }
        let Some(value) = persisted else {
            tracing::debug!(cache = self.name, key, "Cache miss");
            return None;
        };
        tracing::debug!(cache = self.name, key, tier = "persistent", "Cache hit");
        if memory.epoch == epoch && memory.pending == 0 {
            self.push(&mut memory, key, value.clone());
        }
        Some(value)
    }

    /// Write to memory, then best-effort to the persistent tier.
    pub(crate) fn set(&self, key: &str, value: &V) {
        {
            let mut memory = self.begin_write("set");
            self.push(&mut memory, key, value.clone());
        }
        if let Err(e) = self.persistent.set_json(key, value) {
            tracing::warn!(cache = self.name, key, error = %e, "Failed to persist cache record");
        }
        self.end_write("set");
    }

    /// Remove from both tiers. Returns true if the key was in memory.
    pub(crate) fn remove(&self, key: &str) -> bool {
        let was_cached = self.begin_write("remove").entries.pop(key).is_some();
        if let Err(e) = self.persistent.remove(key) {
            tracing::warn!(
                cache = self.name,
                key,
                error = %e,
                "Failed to remove persisted cache record"
            );
        }
        self.end_write("remove");
        was_cached
    }

    /// Read a persisted record without touching the memory tier.
    pub(crate) fn load_persisted(&self, key: &str) -> Option<V> {
        self.persistent.get_json(key)
    }

    /// Keys of all persisted records.
    pub(crate) fn persisted_keys(&self) -> Vec<String> {
        self.persistent.keys()
    }

    pub(crate) fn memory_len(&self) -> usize {
        lock::lock(&self.memory, self.name, "memory_len").entries.len()
    }

    fn begin_write(&self, op: &'static str) -> MutexGuard<'_, Memory<V>> {
        let mut memory = lock::lock(&self.memory, self.name, op);
        memory.epoch += 1;
        memory.pending += 1;
        memory
    }

    fn end_write(&self, op: &'static str) {
        let mut memory = lock::lock(&self.memory, self.name, op);
        memory.epoch += 1;
        memory.pending -= 1;
    }

    fn push(&self, memory: &mut Memory<V>, key: &str, value: V) {
        let evicted = memory.entries.push(key.to_owned(), value);
        if let Some((evicted_key, _)) = evicted.filter(|(k, _)| k != key) {
            tracing::debug!(
                cache = self.name,
                key = %evicted_key,
                "Evicted least recently used entry"
            );
        }
    }
}
