//! `pw cache` command implementations.

use clap::{Args, Subcommand};
use pw_cache::{Cache, FileCache};
use pw_config::Config;
use pw_routes::normalize_path;
use pw_site::{
    CacheEntry, Clock, FRAGMENTS_BUCKET, FragmentCache, PAGES_BUCKET, PageCache, SiteConfig,
    SystemClock,
};

use super::ConfigArgs;
use crate::error::CliError;
use crate::output::Output;

/// Persistent cache commands.
#[derive(Subcommand)]
pub(crate) enum CacheCommand {
    /// Print a cached page record and its staleness.
    Show(ShowArgs),
    /// Remove cached page records.
    Purge(PurgeArgs),
    /// Remove every cached fragment carrying a tag.
    PurgeTag(PurgeTagArgs),
}

impl CacheCommand {
    /// Execute the cache subcommand.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the cache is disabled, or
    /// its version differs from `cache.version`.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        match self {
            Self::Show(args) => args.execute(),
            Self::Purge(args) => args.execute(),
            Self::PurgeTag(args) => args.execute(),
        }
    }
}

/// Arguments for the cache show command.
#[derive(Args)]
pub(crate) struct ShowArgs {
    /// Request path of the page (e.g. /blog/hello).
    path: String,

    /// Print the rendered content after the record summary.
    #[arg(long)]
    content: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

impl ShowArgs {
    fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.config.load()?;
        let pages = open_pages(&open_cache(&config)?, &config)?;

        let key = normalize_path(&self.path);
        let Some(entry) = pages.get(key) else {
            output.warning(&format!("No cached page for {key}"));
            return Ok(());
        };

        output.highlight(key);
        for line in describe_entry(&entry, SystemClock.now_ms()) {
            output.line(&line);
        }
        if self.content {
            output.line("");
            output.line(&entry.content);
        }
        Ok(())
    }
}

/// Arguments for the cache purge command.
#[derive(Args)]
pub(crate) struct PurgeArgs {
    /// Request paths whose page records are removed.
    #[arg(required = true)]
    paths: Vec<String>,

    #[command(flatten)]
    config: ConfigArgs,
}

impl PurgeArgs {
    fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.config.load()?;
        let pages = open_pages(&open_cache(&config)?, &config)?;

        for (key, was_cached) in purge_pages(&pages, &self.paths) {
            if was_cached {
                output.success(&format!("Purged {key}"));
            } else {
                output.info(&format!("Not cached: {key}"));
            }
        }
        Ok(())
    }
}

/// Arguments for the cache purge-tag command.
#[derive(Args)]
pub(crate) struct PurgeTagArgs {
    /// Fragment tag to invalidate.
    tag: String,

    #[command(flatten)]
    config: ConfigArgs,
}

impl PurgeTagArgs {
    fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.config.load()?;
        let fragments = FragmentCache::new(
            SiteConfig::try_from(&config)?.max_fragments,
            open_cache(&config)?.bucket(FRAGMENTS_BUCKET),
        );

        let (indexed, removed) = purge_tag(&fragments, &self.tag);
        output.info(&format!("Indexed {indexed} tagged fragments"));
        output.success(&format!("Removed {removed} fragments tagged {}", self.tag));
        Ok(())
    }
}

/// Open the persistent tier the application wrote, refusing when it is
/// disabled. The cache is never wiped: a stored version that differs from
/// `cache.version` is an error.
fn open_cache(config: &Config) -> Result<FileCache, CliError> {
    let cache = &config.cache_resolved;
    if !cache.enabled {
        return Err(CliError::Validation(
            "Persistent cache is disabled (cache.enabled = false)".to_owned(),
        ));
    }
    let file_cache = FileCache::open_existing(cache.dir.clone(), cache.version.as_deref())?;
    tracing::info!(
        dir = %cache.dir.display(),
        version = file_cache.stored_version().as_deref().unwrap_or_default(),
        "Opened persistent cache"
    );
    Ok(file_cache)
}

fn open_pages(cache: &FileCache, config: &Config) -> Result<PageCache, CliError> {
    Ok(PageCache::new(
        SiteConfig::try_from(config)?.max_pages,
        cache.bucket(PAGES_BUCKET),
    ))
}

/// Summary lines for a page record as of `now_ms`.
fn describe_entry(entry: &CacheEntry, now_ms: u64) -> Vec<String> {
    let status = if entry.is_stale_at(now_ms) {
        "stale"
    } else {
        "fresh"
    };
    vec![
        format!("status: {status}"),
        format!("generated_at: {}", entry.generated_at),
        format!("age: {}s", entry.age_ms(now_ms) / 1000),
        format!("ttl: {}s", entry.ttl_seconds),
        format!("size: {} bytes", entry.content.len()),
    ]
}

/// Invalidate each path's record. Returns normalized keys with whether a
/// record existed.
fn purge_pages(pages: &PageCache, paths: &[String]) -> Vec<(String, bool)> {
    paths
        .iter()
        .map(|path| {
            let key = normalize_path(path);
            let was_cached = pages.get(key).is_some();
            pages.invalidate(key);
            (key.to_owned(), was_cached)
        })
        .collect()
}

/// Rebuild the tag index from persisted records, then invalidate `tag`.
/// Returns the number of indexed and removed fragments.
fn purge_tag(fragments: &FragmentCache, tag: &str) -> (usize, usize) {
    let indexed = fragments.warm_tag_index();
    let removed = fragments.invalidate_by_tag(tag);
    (indexed, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pw_cache::OpenError;
    use pw_site::FragmentEntry;
    use std::num::NonZeroUsize;

    const VERSION: &str = "test";

    fn capacity_of(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_describe_entry_fresh_and_stale() {
        let entry = CacheEntry::new("<p>hi</p>", 1_000, 60);

        assert_eq!(
            describe_entry(&entry, 31_000),
            vec![
                "status: fresh".to_owned(),
                "generated_at: 1000".to_owned(),
                "age: 30s".to_owned(),
                "ttl: 60s".to_owned(),
                "size: 9 bytes".to_owned(),
            ]
        );
        assert_eq!(describe_entry(&entry, 62_000)[0], "status: stale");
    }

    #[test]
    fn test_purge_pages_removes_persisted_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(temp_dir.path().to_path_buf(), VERSION);
        let writer = PageCache::new(capacity_of(8), cache.bucket(PAGES_BUCKET));
        writer.set("/blog/a", &CacheEntry::new("a", 0, 60));

        // A separate process sees only the persistent tier
        let pages = PageCache::new(capacity_of(8), cache.bucket(PAGES_BUCKET));
        let purged = purge_pages(&pages, &["/blog/a/".to_owned(), "/missing".to_owned()]);

        assert_eq!(
            purged,
            vec![("/blog/a".to_owned(), true), ("/missing".to_owned(), false)]
        );
        let reader = PageCache::new(capacity_of(8), cache.bucket(PAGES_BUCKET));
        assert_eq!(reader.get("/blog/a"), None);
    }

    #[test]
    fn test_purge_tag_uses_persisted_tags() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(temp_dir.path().to_path_buf(), VERSION);
        let writer = FragmentCache::new(capacity_of(8), cache.bucket(FRAGMENTS_BUCKET));
        writer.set("k1", &FragmentEntry::new("one", 0).with_tag("nav"));
        writer.set("k2", &FragmentEntry::new("two", 0).with_tag("nav"));
        writer.set("k3", &FragmentEntry::new("three", 0).with_tag("footer"));

        let fragments = FragmentCache::new(capacity_of(8), cache.bucket(FRAGMENTS_BUCKET));
        let (indexed, removed) = purge_tag(&fragments, "nav");

        assert_eq!(indexed, 3);
        assert_eq!(removed, 2);
        let reader = FragmentCache::new(capacity_of(8), cache.bucket(FRAGMENTS_BUCKET));
        assert_eq!(reader.get("k1"), None);
        assert_eq!(reader.get("k2"), None);
        assert!(reader.get("k3").is_some());
    }

    #[test]
    fn test_open_cache_refuses_when_disabled() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pw.toml");
        std::fs::write(&path, "[cache]\nenabled = false\n").unwrap();
        let config = Config::load(Some(&path), None).unwrap();

        assert!(matches!(open_cache(&config), Err(CliError::Validation(_))));
    }

    fn load_config(dir: &std::path::Path, toml: &str) -> Config {
        let path = dir.join("pw.toml");
        std::fs::write(&path, toml).unwrap();
        Config::load(Some(&path), None).unwrap()
    }

    #[test]
    fn test_open_cache_keeps_application_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let app_cache = FileCache::new(temp_dir.path().join("cache"), "app-build-7");
        PageCache::new(capacity_of(8), app_cache.bucket(PAGES_BUCKET))
            .set("/blog/a", &CacheEntry::new("a", 0, 60));

        let config = load_config(temp_dir.path(), "[cache]\ndir = \"cache\"\n");
        let pages = open_pages(&open_cache(&config).unwrap(), &config).unwrap();
        assert_eq!(pages.get("/blog/a").map(|e| e.content), Some("a".to_owned()));

        let config = load_config(
            temp_dir.path(),
            "[cache]\ndir = \"cache\"\nversion = \"app-build-7\"\n",
        );
        assert!(open_cache(&config).is_ok());
    }

    #[test]
    fn test_open_cache_version_mismatch_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let app_cache = FileCache::new(temp_dir.path().join("cache"), "app-build-7");
        let app_pages = PageCache::new(capacity_of(8), app_cache.bucket(PAGES_BUCKET));
        app_pages.set("/blog/a", &CacheEntry::new("a", 0, 60));

        let config = load_config(
            temp_dir.path(),
            "[cache]\ndir = \"cache\"\nversion = \"app-build-8\"\n",
        );
        let err = open_cache(&config).unwrap_err();
        assert!(matches!(
            err,
            CliError::Cache(OpenError::VersionMismatch { .. })
        ));

        let reader = PageCache::new(capacity_of(8), app_cache.bucket(PAGES_BUCKET));
        assert!(reader.get("/blog/a").is_some());
    }

    #[test]
    fn test_open_cache_requires_existing_cache() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = load_config(temp_dir.path(), "[cache]\ndir = \"cache\"\n");

        assert!(matches!(
            open_cache(&config),
            Err(CliError::Cache(OpenError::NotInitialized(_)))
        ));
        assert!(!temp_dir.path().join("cache").exists());
    }
}
