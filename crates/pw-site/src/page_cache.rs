//! Whole-page rendered-content cache.
//!
//! Entries are keyed by normalized request path and carry the time they were
//! generated plus the route's revalidation interval. Whether an entry is stale
//! is a question the serving layer asks with [`CacheEntry::is_stale_at`]; the
//! cache itself never expires anything.

use std::num::NonZeroUsize;

use pw_cache::CacheBucket;
use serde::{Deserialize, Serialize};

use crate::tiered::TieredStore;

const SOURCE: &str = "page_cache";

/// A rendered page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Rendered output.
    pub content: String,
    /// Generation time in milliseconds since the Unix epoch.
    pub generated_at: u64,
    /// Freshness window in seconds.
    pub ttl_seconds: u64,
}

impl CacheEntry {
    /// Create an entry generated at `generated_at`.
    #[must_use]
    pub fn new(content: impl Into<String>, generated_at: u64, ttl_seconds: u64) -> Self {
        Self {
            content: content.into(),
            generated_at,
            ttl_seconds,
        }
    }

    /// True once more than `ttl_seconds` have elapsed since generation.
    #[must_use]
    pub fn is_stale_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.generated_at) > self.ttl_seconds.saturating_mul(1000)
    }

    /// Milliseconds elapsed since generation.
    #[must_use]
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.generated_at)
    }
}

/// Page-level cache with LRU memory tier and persistent warm-start tier.
pub struct PageCache {
    store: TieredStore<CacheEntry>,
}

impl PageCache {
    /// Create a cache holding at most `capacity` entries in memory.
    #[must_use]
    pub fn new(capacity: NonZeroUsize, persistent: Box<dyn CacheBucket>) -> Self {
        Self {
            store: TieredStore::new(SOURCE, capacity, persistent),
        }
    }

    /// Look up an entry, falling back to the persistent tier.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.store.get(key)
    }

    /// Store an entry. Persistence failures are logged, the memory write
    /// stands.
    pub fn set(&self, key: &str, entry: &CacheEntry) {
        self.store.set(key, entry);
    }

    /// Remove an entry from both tiers.
    pub fn invalidate(&self, key: &str) {
        if self.store.remove(key) {
            tracing::debug!(key, "Invalidated page");
        }
    }

    /// Number of entries in the memory tier.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.memory_len()
    }

    /// True if the memory tier is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
