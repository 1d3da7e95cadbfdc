//! Extension trait for [`CacheBucket`] with typed convenience methods.

use std::io;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CacheBucket;

/// Typed convenience methods for [`CacheBucket`].
///
/// Keeps [`CacheBucket`] object-safe and byte-oriented while callers get
/// serde-typed records through a blanket impl.
///
/// # Example
///
/// ```
/// use pw_cache::{Cache, CacheBucketExt, NullCache};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Record { content: String }
///
/// let cache = NullCache;
/// let bucket = cache.bucket("pages");
///
/// bucket.set_json("/", &Record { content: "home".into() }).unwrap();
/// let record: Option<Record> = bucket.get_json("/");
/// assert!(record.is_none());
/// ```
pub trait CacheBucketExt: CacheBucket {
    /// Retrieve a JSON-deserialized record.
    ///
    /// Corrupt records are reported as misses and logged.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding corrupt cache record");
                None
            }
        }
    }

    /// Store a record as JSON.
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> io::Result<()> {
        let bytes = serde_json::to_vec(value).map_err(io::Error::other)?;
        self.set(key, &bytes)
    }
}

impl<B: CacheBucket + ?Sized> CacheBucketExt for B {}
