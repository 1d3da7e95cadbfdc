//! Sub-page fragment cache with tag invalidation.
//!
//! Fragments are keyed by [`fragment_key`], a hash of a content id and its
//! canonicalized props. Each entry may carry a tag; a secondary index maps
//! tags to fragment keys so a whole group can be dropped at once.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use pw_cache::CacheBucket;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lock;
use crate::tiered::TieredStore;

const SOURCE: &str = "fragment_cache";

/// Freshness of a fragment relative to its windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    /// Within the stale window.
    Fresh,
    /// Past the stale window; usable while it regenerates.
    Stale,
    /// Past the expire window; should not be served.
    Expired,
}

/// A rendered fragment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentEntry {
    /// Rendered output.
    pub content: String,
    /// Generation time in milliseconds since the Unix epoch.
    pub generated_at: u64,
    /// Seconds after which the fragment is stale. Absent means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_seconds: Option<u64>,
    /// Seconds after which the fragment is expired. Absent means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_seconds: Option<u64>,
    /// Invalidation group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl FragmentEntry {
    /// Create an untagged entry with no freshness windows.
    #[must_use]
    pub fn new(content: impl Into<String>, generated_at: u64) -> Self {
        Self {
            content: content.into(),
            generated_at,
            stale_seconds: None,
            expire_seconds: None,
            tag: None,
        }
    }

    /// Set the invalidation tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Set the stale and expire windows.
    #[must_use]
    pub fn with_windows(mut self, stale_seconds: Option<u64>, expire_seconds: Option<u64>) -> Self {
        self.stale_seconds = stale_seconds;
        self.expire_seconds = expire_seconds;
        self
    }

    /// Classify the entry at `now_ms`.
    #[must_use]
    pub fn freshness(&self, now_ms: u64) -> Freshness {
        let age = now_ms.saturating_sub(self.generated_at);
        let past = |window: Option<u64>| window.is_some_and(|s| age > s.saturating_mul(1000));

        if past(self.expire_seconds) {
            Freshness::Expired
        } else if past(self.stale_seconds) {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }
}

/// Derive the cache key for `content_id` rendered with `props`.
///
/// Props are serialized with object keys sorted at every level, so key order
/// in the input never changes the result. The hash is a 32-bit polynomial
/// rolling hash rendered as 8 lowercase hex digits. It is not collision
/// resistant and must not be used for anything security sensitive.
#[must_use]
pub fn fragment_key(content_id: &str, props: &Value) -> String {
    let mut canonical = String::with_capacity(content_id.len() + 32);
    canonical.push_str(content_id);
    canonical.push(':');
    write_canonical(props, &mut canonical);

    let hash = canonical
        .bytes()
        .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(u32::from(b)));
    format!("{hash:08x}")
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(&Value::String(key.clone()), out);
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

/// Tag to fragment-key index, plus the reverse mapping for retagging.
#[derive(Debug, Default)]
struct TagIndex {
    by_tag: HashMap<String, HashSet<String>>,
    by_key: HashMap<String, String>,
}

impl TagIndex {
    fn record(&mut self, key: &str, tag: Option<&str>) {
        self.forget(key);
        if let Some(tag) = tag {
            self.by_tag
                .entry(tag.to_owned())
                .or_default()
                .insert(key.to_owned());
            self.by_key.insert(key.to_owned(), tag.to_owned());
        }
    }

    fn forget(&mut self, key: &str) {
        let Some(tag) = self.by_key.remove(key) else {
            return;
        };
        if let Some(keys) = self.by_tag.get_mut(&tag) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_tag.remove(&tag);
            }
        }
    }

    fn take(&mut self, tag: &str) -> HashSet<String> {
        let keys = self.by_tag.remove(tag).unwrap_or_default();
        for key in &keys {
            self.by_key.remove(key);
        }
        keys
    }
}

/// Fragment-level cache with LRU memory tier, persistent warm-start tier and
/// a tag index.
///
/// The tag index covers every fragment this process has written or loaded.
/// Fragments persisted by an earlier process become reachable by tag after
/// they are read, or all at once via [`FragmentCache::warm_tag_index`].
pub struct FragmentCache {
    store: TieredStore<FragmentEntry>,
    tags: Mutex<TagIndex>,
}

impl FragmentCache {
    /// Create a cache holding at most `capacity` fragments in memory.
    #[must_use]
    pub fn new(capacity: NonZeroUsize, persistent: Box<dyn CacheBucket>) -> Self {
        Self {
            store: TieredStore::new(SOURCE, capacity, persistent),
            tags: Mutex::new(TagIndex::default()),
        }
    }

    /// Look up a fragment, falling back to the persistent tier.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<FragmentEntry> {
        let entry = self.store.get(key)?;
        if let Some(tag) = &entry.tag {
            let mut tags = lock::lock(&self.tags, SOURCE, "get");
            if !tags.by_key.contains_key(key) {
                tags.record(key, Some(tag.as_str()));
            }
        }
        Some(entry)
    }

    /// Store a fragment and index its tag.
    pub fn set(&self, key: &str, entry: &FragmentEntry) {
        self.store.set(key, entry);
        lock::lock(&self.tags, SOURCE, "set").record(key, entry.tag.as_deref());
    }

    /// Remove a fragment from both tiers and from its tag bucket.
    pub fn invalidate(&self, key: &str) {
        self.store.remove(key);
        lock::lock(&self.tags, SOURCE, "invalidate").forget(key);
    }

    /// Remove every fragment tagged `tag`. Returns how many keys were
    /// invalidated; unknown tags invalidate nothing.
    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        let keys = lock::lock(&self.tags, SOURCE, "invalidate_by_tag").take(tag);
        for key in &keys {
            self.store.remove(key);
        }
        tracing::info!(tag, count = keys.len(), "Invalidated fragments by tag");
        keys.len()
    }

    /// Index the tags of every persisted fragment without loading them into
    /// memory. Returns the number of tagged fragments found.
    pub fn warm_tag_index(&self) -> usize {
        let tagged: Vec<(String, String)> = self
            .store
            .persisted_keys()
            .into_iter()
            .filter_map(|key| {
                let tag = self.store.load_persisted(&key)?.tag?;
                Some((key, tag))
            })
            .collect();

        let mut tags = lock::lock(&self.tags, SOURCE, "warm_tag_index");
        for (key, tag) in &tagged {
            tags.record(key, Some(tag.as_str()));
        }
        tracing::debug!(count = tagged.len(), "Warmed fragment tag index");
        tagged.len()
    }

    /// Number of fragments in the memory tier.
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
