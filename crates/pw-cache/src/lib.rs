//! Persistent record storage for Pagewright.
//!
//! This crate provides the warm-start tier behind the rendered-content caches.
//! Two traits form the core API:
//!
//! - [`Cache`]: Factory for named cache buckets
//! - [`CacheBucket`]: Key-value record store addressed by a deterministic
//!   key-to-path mapping
//!
//! The in-memory tier in `pw-site` is authoritative for the life of the
//! process. Buckets only have to make a best effort: reads that fail are
//! misses, writes that fail are reported to the caller, which logs them.
//!
//! # Implementations
//!
//! - [`NullCache`] / [`NullCacheBucket`]: No-op implementations (always miss)
//! - [`FileCache`]: File-based implementation with version validation
//!
//! Tools that inspect a cache written by another program open it with
//! [`FileCache::open_existing`], which never wipes it.
//!
//! # Example
//!
//! ```
//! use pw_cache::{Cache, NullCache};
//!
//! let cache = NullCache;
//! let bucket = cache.bucket("pages");
//! bucket.set("/blog/post-1", b"<html>hello</html>").unwrap();
//! assert_eq!(bucket.get("/blog/post-1"), None); // NullCache always misses
//! ```

mod ext;
mod file;

pub use ext::CacheBucketExt;
pub use file::{FileCache, OpenError, ROOT_RECORD};

use std::io;

/// A named partition within a [`Cache`].
///
/// Keys are opaque strings. Slash-separated keys (request paths) map to nested
/// records; the empty key and `"/"` both map to the reserved [`ROOT_RECORD`].
pub trait CacheBucket: Send + Sync {
    /// Retrieve a stored record.
    ///
    /// Returns `None` when the record is missing or cannot be read.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store a record, overwriting any previous value for the key.
    fn set(&self, key: &str, value: &[u8]) -> io::Result<()>;

    /// Remove a record. Removing a missing record is not an error.
    fn remove(&self, key: &str) -> io::Result<()>;

    /// List the keys of every stored record.
    ///
    /// Keys come back in canonical form: segments joined by `/` without a
    /// leading slash, the root record as `""`.
    fn keys(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Factory for named cache [`CacheBucket`]s.
///
/// Buckets produced by one `Cache` are isolated from each other. The file
/// cache stores each bucket in its own subdirectory.
pub trait Cache: Send + Sync {
    /// Open or create a named bucket.
    ///
    /// # Arguments
    ///
    /// * `name` - Bucket name (e.g., "pages", "fragments")
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket>;
}

/// No-op [`CacheBucket`] that never stores or retrieves data.
pub struct NullCacheBucket;

impl CacheBucket for NullCacheBucket {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _value: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> io::Result<()> {
        Ok(())
    }
}

/// No-op [`Cache`] that always returns [`NullCacheBucket`]s.
///
/// Use when the persistent tier is disabled.
pub struct NullCache;

impl Cache for NullCache {
    fn bucket(&self, _name: &str) -> Box<dyn CacheBucket> {
        Box::new(NullCacheBucket)
    }
}
