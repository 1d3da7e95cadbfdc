//! File-based cache implementation.
//!
//! [`FileCache`] stores records as files on disk, organized into buckets
//! (subdirectories). Each record is a single file holding the raw value.
//!
//! Keys map to paths deterministically: the key is split on `/`, empty
//! segments are dropped, and every segment is percent-encoded so that no key
//! can escape its bucket (`..` becomes `%2E%2E`). The last segment gets an
//! `.entry` suffix. A key with no segments (`""` or `"/"`) maps to the
//! reserved [`ROOT_RECORD`] name, which no encoded segment can produce.
//!
//! On construction, [`FileCache`] validates a `VERSION` file in the cache root.
//! If the version mismatches or is missing, the entire cache directory is wiped
//! and recreated. Records written by another build are never read back.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::{Cache, CacheBucket};

/// Record name used for the root (empty) key.
pub const ROOT_RECORD: &str = "__index";

/// Name of the version stamp in the cache root.
const VERSION_FILE: &str = "VERSION";

/// File suffix for record files.
const RECORD_SUFFIX: &str = ".entry";

/// Characters kept verbatim in record path segments.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-');

/// File-based [`Cache`] rooted at a directory on disk.
///
/// Directory layout:
/// ```text
/// {root}/
/// +-- VERSION                  # contains the cache version string
/// +-- pages/                   # bucket "pages"
/// |   +-- __index.entry        # key "/"
/// |   +-- blog/
/// |       +-- post-1.entry     # key "/blog/post-1"
/// +-- fragments/               # bucket "fragments"
///     +-- 9f3a01bc.entry
/// ```
#[derive(Debug)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Create a new file-based cache at `root`, validating the cache version.
    ///
    /// If the `VERSION` file inside `root` does not match `version`, the entire
    /// cache directory is removed and recreated with the new version. Errors
    /// during validation are logged but never fatal.
    #[must_use]
    pub fn new(root: PathBuf, version: &str) -> Self {
        validate_version(&root, version);
        Self { root }
    }

    /// Open a cache that another program created, without wiping it.
    ///
    /// With `expected` set, the stored `VERSION` must equal it. With `None`,
    /// whatever version is stored is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError`] if `root` holds no `VERSION` file, the file cannot
    /// be read, or its version differs from `expected`.
    pub fn open_existing(root: PathBuf, expected: Option<&str>) -> Result<Self, OpenError> {
        let stored = match fs::read_to_string(root.join(VERSION_FILE)) {
            Ok(stored) => stored,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(OpenError::NotInitialized(root));
            }
            Err(e) => return Err(OpenError::Io(e)),
        };

        if let Some(expected) = expected
            && stored != expected
        {
            return Err(OpenError::VersionMismatch {
                stored,
                expected: expected.to_owned(),
            });
        }
        Ok(Self { root })
    }

    /// Root directory of the cache.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Version stamped in the cache root, if readable.
    #[must_use]
    pub fn stored_version(&self) -> Option<String> {
        fs::read_to_string(self.root.join(VERSION_FILE)).ok()
    }
}

/// Error opening an existing [`FileCache`].
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// The directory holds no `VERSION` file.
    #[error("No cache found at {}", .0.display())]
    NotInitialized(PathBuf),
    /// The stored version differs from the expected one.
    #[error("Cache version mismatch: stored {stored}, expected {expected}")]
    VersionMismatch {
        /// Version found on disk.
        stored: String,
        /// Version the caller asked for.
        expected: String,
    },
    /// Reading the `VERSION` file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Cache for FileCache {
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket> {
        Box::new(FileCacheBucket {
            dir: self.root.join(name),
        })
    }
}

/// A single bucket backed by a directory on disk.
struct FileCacheBucket {
    dir: PathBuf,
}

impl FileCacheBucket {
    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(record_relative_path(key))
    }
}

impl CacheBucket for FileCacheBucket {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.record_path(key);
        match fs::read(&path) {
            Ok(data) => Some(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read cache record");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> io::Result<()> {
        let path = self.record_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, value)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.record_path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        collect_keys(&self.dir, &mut Vec::new(), &mut keys);
        keys.sort();
        keys
    }
}

/// Map a cache key to a record path relative to its bucket directory.
fn record_relative_path(key: &str) -> PathBuf {
    let mut segments: Vec<String> = key
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
        .collect();

    match segments.last_mut() {
        Some(last) => last.push_str(RECORD_SUFFIX),
        None => segments.push(format!("{ROOT_RECORD}{RECORD_SUFFIX}")),
    }

    segments.iter().collect()
}

/// Walk a bucket directory and reconstruct canonical keys from record paths.
fn collect_keys(dir: &Path, prefix: &mut Vec<String>, keys: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.filter_map(Result::ok) {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());

        if is_dir {
            prefix.push(decode_segment(&name));
            collect_keys(&entry.path(), prefix, keys);
            prefix.pop();
        } else if let Some(stem) = name.strip_suffix(RECORD_SUFFIX) {
            if prefix.is_empty() && stem == ROOT_RECORD {
                keys.push(String::new());
            } else {
                let mut parts = prefix.clone();
                parts.push(decode_segment(stem));
                keys.push(parts.join("/"));
            }
        }
    }
}

fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

/// Validate the cache version, wiping the directory on mismatch.
fn validate_version(root: &Path, version: &str) {
    let version_file = root.join(VERSION_FILE);

    match fs::read_to_string(&version_file) {
        Ok(stored) if stored == version => {
            tracing::debug!("cache version matches: {version}");
            return;
        }
        Ok(stored) => {
            tracing::info!(
                "cache version mismatch (stored={stored}, current={version}), wiping cache"
            );
        }
        Err(_) => {
            tracing::info!("no cache VERSION file found, initializing cache");
        }
    }

    if root.exists()
        && let Err(e) = fs::remove_dir_all(root)
    {
        tracing::warn!("failed to remove cache directory: {e}");
    }
    if let Err(e) = fs::create_dir_all(root) {
        tracing::warn!("failed to create cache directory: {e}");
        return;
    }
    if let Err(e) = fs::write(&version_file, version) {
        tracing::warn!("failed to write cache VERSION file: {e}");
    }
}
