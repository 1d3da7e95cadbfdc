//! The serving-time context.
//!
//! [`Site`] owns everything the serving layer touches: the route table
//! snapshot, the page and fragment caches, and the revalidation scheduler.
//! Build one at startup and share it behind an `Arc`.

use std::num::NonZeroUsize;
use std::sync::Arc;

use pw_cache::{Cache, FileCache, NullCache};
use pw_config::{Config, ConfigError};
use pw_routes::{RouteMatch, RouteTable, RouteTableBuilder, SidecarClassifier, normalize_path};

use crate::clock::{Clock, SystemClock};
use crate::error::ServeError;
use crate::fragment_cache::{FragmentCache, FragmentEntry};
use crate::page_cache::{CacheEntry, PageCache};
use crate::render::{Loader, RenderPipeline, Renderer};
use crate::revalidation::RevalidationScheduler;
use crate::routes::RouteRegistry;

/// Bucket holding persisted page records.
pub const PAGES_BUCKET: &str = "pages";
/// Bucket holding persisted fragment records.
pub const FRAGMENTS_BUCKET: &str = "fragments";

/// Capacity limits for a [`Site`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SiteConfig {
    /// Page entries kept in memory.
    pub max_pages: NonZeroUsize,
    /// Fragment entries kept in memory.
    pub max_fragments: NonZeroUsize,
    /// Paths regenerated at the same time.
    pub concurrency: NonZeroUsize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            max_pages: NonZeroUsize::new(1000).unwrap_or(NonZeroUsize::MIN),
            max_fragments: NonZeroUsize::new(5000).unwrap_or(NonZeroUsize::MIN),
            concurrency: NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl TryFrom<&Config> for SiteConfig {
    type Error = ConfigError;

    fn try_from(config: &Config) -> Result<Self, Self::Error> {
        let positive = |value: usize, field: &str| {
            NonZeroUsize::new(value).ok_or_else(|| {
                ConfigError::Validation(format!("{field} must be greater than 0"))
            })
        };
        Ok(Self {
            max_pages: positive(config.cache_resolved.max_pages, "cache.max_pages")?,
            max_fragments: positive(config.cache_resolved.max_fragments, "cache.max_fragments")?,
            concurrency: positive(config.revalidation.concurrency, "revalidation.concurrency")?,
        })
    }
}

/// Outcome of [`Site::serve`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Served {
    /// Cached and within its freshness window.
    Fresh(String),
    /// Cached but stale; a background regeneration has been queued.
    Stale(String),
    /// Not cached; rendered on this request.
    Rendered(String),
}

impl Served {
    /// The content, however it was obtained.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Fresh(content) | Self::Stale(content) | Self::Rendered(content) => content,
        }
    }

    /// Consume into the content.
    #[must_use]
    pub fn into_content(self) -> String {
        match self {
            Self::Fresh(content) | Self::Stale(content) | Self::Rendered(content) => content,
        }
    }
}

/// Builder for [`Site`].
pub struct SiteBuilder {
    renderer: Arc<dyn Renderer>,
    loader: Option<Arc<dyn Loader>>,
    table: Option<RouteTable>,
    route_builder: Option<RouteTableBuilder>,
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
    config: SiteConfig,
}

impl SiteBuilder {
    /// Use a fixed route table.
    #[must_use]
    pub fn routes(mut self, table: RouteTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Build the route table from a page tree, and rebuild it on
    /// [`Site::reload_routes`].
    #[must_use]
    pub fn route_builder(mut self, builder: RouteTableBuilder) -> Self {
        self.route_builder = Some(builder);
        self
    }

    /// Data loader for routes that declare one.
    #[must_use]
    pub fn loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Persistent tier (defaults to [`NullCache`]).
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = cache;
        self
    }

    /// Time source (defaults to [`SystemClock`]).
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Capacity limits.
    #[must_use]
    pub fn config(mut self, config: SiteConfig) -> Self {
        self.config = config;
        self
    }

    /// Apply a loaded `pw.toml`: capacity limits, the page tree with its
    /// sidecar classifier, and the persistent tier.
    ///
    /// The persistent tier is stamped with `cache.version` when configured,
    /// otherwise with `app_version`. A disabled cache leaves the current tier
    /// in place.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a capacity or the concurrency
    /// limit is zero.
    pub fn configure(mut self, config: &Config, app_version: &str) -> Result<Self, ConfigError> {
        self.config = SiteConfig::try_from(config)?;

        let pages = &config.pages_resolved;
        let classifier = Arc::new(SidecarClassifier::new(pages.meta_filename.as_str()));
        self.route_builder = Some(RouteTableBuilder::new(pages.source_dir.clone(), classifier));

        let cache = &config.cache_resolved;
        if cache.enabled {
            let version = cache.version.as_deref().unwrap_or(app_version);
            self.cache = Arc::new(FileCache::new(cache.dir.clone(), version));
        }
        Ok(self)
    }

    /// Build the site. With a route builder and no fixed table, the page tree
    /// is scanned now.
    #[must_use]
    pub fn build(self) -> Site {
        let table = match (self.table, &self.route_builder) {
            (Some(table), _) => table,
            (None, Some(builder)) => builder.build(),
            (None, None) => RouteTable::new(),
        };

        let routes = Arc::new(RouteRegistry::new(table, self.route_builder));
        let pages = Arc::new(PageCache::new(
            self.config.max_pages,
            self.cache.bucket(PAGES_BUCKET),
        ));
        let fragments = FragmentCache::new(
            self.config.max_fragments,
            self.cache.bucket(FRAGMENTS_BUCKET),
        );
        let pipeline = Arc::new(RenderPipeline::new(
            Arc::clone(&routes),
            Arc::clone(&pages),
            self.renderer,
            self.loader,
            self.clock,
        ));
        let scheduler = RevalidationScheduler::new(Arc::clone(&pipeline), self.config.concurrency);

        Site {
            routes,
            pages,
            fragments,
            pipeline,
            scheduler,
        }
    }
}

/// Route resolution, rendered-content caching and background regeneration.
///
/// Page cache keys are request paths normalized with
/// [`normalize_path`], so `/blog/` and `/blog` share an entry.
pub struct Site {
    routes: Arc<RouteRegistry>,
    pages: Arc<PageCache>,
    fragments: FragmentCache,
    pipeline: Arc<RenderPipeline>,
    scheduler: RevalidationScheduler,
}

impl Site {
    /// Start building a site around `renderer`.
    #[must_use]
    pub fn builder(renderer: Arc<dyn Renderer>) -> SiteBuilder {
        SiteBuilder {
            renderer,
            loader: None,
            table: None,
            route_builder: None,
            cache: Arc::new(NullCache),
            clock: Arc::new(SystemClock),
            config: SiteConfig::default(),
        }
    }

    /// Current route table snapshot.
    #[must_use]
    pub fn routes(&self) -> Arc<RouteTable> {
        self.routes.current()
    }

    /// Resolve a request path against the current table.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        self.routes.current().resolve(path)
    }

    /// Swap in a new route table.
    pub fn replace_routes(&self, table: RouteTable) {
        self.routes.replace(table);
    }

    /// Rebuild the route table from the page tree and swap it in.
    ///
    /// Returns `None` if the site was built without a route builder.
    pub fn reload_routes(&self) -> Option<Arc<RouteTable>> {
        self.routes.rebuild()
    }

    /// Page cache.
    #[must_use]
    pub fn pages(&self) -> &PageCache {
        &self.pages
    }

    /// Fragment cache.
    #[must_use]
    pub fn fragments(&self) -> &FragmentCache {
        &self.fragments
    }

    /// Revalidation scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &RevalidationScheduler {
        &self.scheduler
    }

    /// Current time according to the site's clock.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.pipeline.now_ms()
    }

    /// Cached page for `path`.
    #[must_use]
    pub fn get_page(&self, path: &str) -> Option<CacheEntry> {
        self.pages.get(normalize_path(path))
    }

    /// Store a rendered page for `path`.
    pub fn set_page(&self, path: &str, entry: &CacheEntry) {
        self.pages.set(normalize_path(path), entry);
    }

    /// Drop the cached page for `path`.
    pub fn invalidate_page(&self, path: &str) {
        self.pages.invalidate(normalize_path(path));
    }

    /// Cached fragment under `key`.
    #[must_use]
    pub fn get_fragment(&self, key: &str) -> Option<FragmentEntry> {
        self.fragments.get(key)
    }

    /// Store a fragment under `key`.
    pub fn set_fragment(&self, key: &str, entry: &FragmentEntry) {
        self.fragments.set(key, entry);
    }

    /// Drop the fragment under `key`.
    pub fn invalidate_fragment(&self, key: &str) {
        self.fragments.invalidate(key);
    }

    /// Drop every fragment tagged `tag`, returning how many were dropped.
    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        self.fragments.invalidate_by_tag(tag)
    }

    /// Queue `path` for background regeneration. Returns `false` if it is
    /// already pending.
    pub fn queue_revalidation(&self, path: &str) -> bool {
        self.scheduler.queue(normalize_path(path))
    }

    /// Drop the cached page for `path` and regenerate it now, bypassing the
    /// queue.
    ///
    /// Returns `true` if a fresh entry was stored. A panicking renderer is
    /// reported as a failure.
    pub async fn revalidate_path(&self, path: &str) -> bool {
        let key = normalize_path(path);
        self.pages.invalidate(key);

        match self.pipeline.revalidate_isolated(key).await {
            Ok(()) => {
                tracing::info!(path = key, "Revalidated page on demand");
                true
            }
            Err(e) => {
                tracing::warn!(path = key, error = %e, "On-demand revalidation failed");
                false
            }
        }
    }

    /// Answer a request for `path` with stale-while-revalidate semantics.
    ///
    /// Fresh entries are returned as-is. Stale entries are returned and a
    /// background regeneration is queued. Uncached paths are rendered now and
    /// stored if the route participates in revalidation.
    ///
    /// The cache is consulted before the route table, so the last good render
    /// of a path whose route has since disappeared is still served.
    pub async fn serve(&self, path: &str) -> Result<Served, ServeError> {
        let key = normalize_path(path);

        if let Some(entry) = self.pages.get(key) {
            if entry.is_stale_at(self.now_ms()) {
                self.queue_revalidation(key);
                return Ok(Served::Stale(entry.content));
            }
            return Ok(Served::Fresh(entry.content));
        }

        let matched = self
            .resolve(key)
            .ok_or_else(|| ServeError::Unresolved(key.to_owned()))?;
        let content = self.pipeline.render(key, &matched).await?;
        let route = &matched.descriptor;
        if let Some(ttl) = route.revalidate_seconds.filter(|_| route.is_revalidatable()) {
            self.pages
                .set(key, &CacheEntry::new(content.clone(), self.now_ms(), ttl));
        }
        Ok(Served::Rendered(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::RenderError;
    use crate::test_support::{TestLoader, TestRenderer, revalidating_site, test_routes};
    use pretty_assertions::assert_eq;
    use pw_cache::FileCache;
    use std::fs;
    use std::time::Duration;

    static_assertions::assert_impl_all!(Site: Send, Sync);

    fn site_with_clock(renderer: Arc<TestRenderer>, clock: Arc<ManualClock>) -> Site {
        Site::builder(renderer)
            .routes(test_routes())
            .clock(clock)
            .build()
    }

    #[test]
    fn test_resolve_delegates_to_current_table() {
        let site = revalidating_site(TestRenderer::with_delay(Duration::ZERO), 1);

        let matched = site.resolve("/p/9").unwrap();
        assert_eq!(matched.descriptor.pattern.as_str(), "/p/:id");
        assert_eq!(matched.params["id"], "9");
        assert!(site.resolve("/missing").is_none());
    }

    #[test]
    fn test_page_keys_are_normalized() {
        let site = revalidating_site(TestRenderer::with_delay(Duration::ZERO), 1);
        let entry = CacheEntry::new("x", 0, 60);

        site.set_page("/p/1/", &entry);

        assert_eq!(site.get_page("/p/1"), Some(entry));
        site.invalidate_page("/p/1/");
        assert_eq!(site.get_page("/p/1"), None);
    }

    #[test]
    fn test_staleness_under_simulated_clock() {
        let clock = Arc::new(ManualClock::new(0));
        let site = site_with_clock(TestRenderer::with_delay(Duration::ZERO), Arc::clone(&clock));
        site.set_page("/x", &CacheEntry::new("x", site.now_ms(), 1));

        assert!(!site.get_page("/x").unwrap().is_stale_at(site.now_ms()));
        clock.advance(Duration::from_millis(1_500));
        assert!(site.get_page("/x").unwrap().is_stale_at(site.now_ms()));
    }

    #[test]
    fn test_fragment_operations() {
        let site = revalidating_site(TestRenderer::with_delay(Duration::ZERO), 1);
        let key = crate::fragment_key("card", &serde_json::json!({"id": 1}));

        site.set_fragment(&key, &FragmentEntry::new("card", 0).with_tag("cards"));
        site.set_fragment("other", &FragmentEntry::new("other", 0).with_tag("misc"));
        assert!(site.get_fragment(&key).is_some());

        assert_eq!(site.invalidate_by_tag("cards"), 1);
        assert!(site.get_fragment(&key).is_none());
        assert!(site.get_fragment("other").is_some());

        site.invalidate_fragment("other");
        assert!(site.get_fragment("other").is_none());
    }

    #[tokio::test]
    async fn test_serve_renders_then_serves_fresh() {
        let clock = Arc::new(ManualClock::new(0));
        let renderer = TestRenderer::with_delay(Duration::ZERO);
        let site = site_with_clock(Arc::clone(&renderer), Arc::clone(&clock));

        let first = site.serve("/p/1").await.unwrap();
        assert_eq!(first, Served::Rendered("/p/:id id=1".to_owned()));

        let second = site.serve("/p/1/").await.unwrap();
        assert_eq!(second, Served::Fresh("/p/:id id=1".to_owned()));
        assert_eq!(renderer.renders(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_serve_stale_queues_revalidation() {
        let clock = Arc::new(ManualClock::new(0));
        let renderer = TestRenderer::with_delay(Duration::ZERO);
        let site = site_with_clock(Arc::clone(&renderer), Arc::clone(&clock));
        site.set_page("/p/1", &CacheEntry::new("old", 0, 60));

        clock.advance(Duration::from_secs(61));
        let served = site.serve("/p/1").await.unwrap();
        assert_eq!(served, Served::Stale("old".to_owned()));

        tokio::time::timeout(Duration::from_secs(10), site.scheduler().wait_idle())
            .await
            .unwrap();
        let refreshed = site.get_page("/p/1").unwrap();
        assert_eq!(refreshed.content, "/p/:id id=1");
        assert_eq!(refreshed.generated_at, 61_000);
        assert_eq!(
            site.serve("/p/1").await.unwrap(),
            Served::Fresh("/p/:id id=1".to_owned())
        );
    }

    #[tokio::test]
    async fn test_serve_does_not_cache_ineligible_routes() {
        let renderer = TestRenderer::with_delay(Duration::ZERO);
        let site = revalidating_site(Arc::clone(&renderer), 1);

        assert!(matches!(site.serve("/live").await.unwrap(), Served::Rendered(_)));
        assert!(matches!(site.serve("/live").await.unwrap(), Served::Rendered(_)));
        assert_eq!(site.get_page("/live"), None);
        assert_eq!(renderer.renders(), 2);
    }

    #[tokio::test]
    async fn test_serve_unresolved() {
        let site = revalidating_site(TestRenderer::with_delay(Duration::ZERO), 1);
        let err = site.serve("/nowhere").await.unwrap_err();
        assert!(matches!(err, ServeError::Unresolved(path) if path == "/nowhere"));
    }

    #[tokio::test]
    async fn test_serve_cached_entry_without_route() {
        let clock = Arc::new(ManualClock::new(0));
        let renderer = TestRenderer::with_delay(Duration::ZERO);
        let site = site_with_clock(Arc::clone(&renderer), Arc::clone(&clock));
        site.set_page("/gone", &CacheEntry::new("last good", 0, 60));

        assert_eq!(
            site.serve("/gone").await.unwrap(),
            Served::Fresh("last good".to_owned())
        );

        clock.advance(Duration::from_secs(61));
        assert_eq!(
            site.serve("/gone/").await.unwrap(),
            Served::Stale("last good".to_owned())
        );
        assert_eq!(renderer.renders(), 0);
    }

    #[tokio::test]
    async fn test_serve_render_failure() {
        let site = revalidating_site(TestRenderer::failing(), 1);
        let err = site.serve("/p/1").await.unwrap_err();
        assert!(matches!(err, ServeError::Failed(RenderError::Render { .. })));
        assert_eq!(site.get_page("/p/1"), None);
    }

    #[tokio::test]
    async fn test_loader_data_reaches_renderer() {
        let renderer = TestRenderer::with_delay(Duration::ZERO);
        let site = Site::builder(renderer)
            .routes(test_routes())
            .loader(Arc::new(TestLoader))
            .build();

        let served = site.serve("/blog/hello").await.unwrap();
        assert_eq!(served.content(), "/blog/:slug slug=hello data=loaded:hello");
    }

    #[tokio::test]
    async fn test_missing_loader_renders_with_null_data() {
        let site = revalidating_site(TestRenderer::with_delay(Duration::ZERO), 1);
        let served = site.serve("/blog/hello").await.unwrap();
        assert_eq!(served.into_content(), "/blog/:slug slug=hello");
    }

    #[tokio::test]
    async fn test_revalidate_path_outcomes() {
        let renderer = TestRenderer::with_delay(Duration::ZERO);
        let site = revalidating_site(Arc::clone(&renderer), 1);
        site.set_page("/p/1", &CacheEntry::new("old", 0, 60));

        assert!(site.revalidate_path("/p/1").await);
        assert_eq!(site.get_page("/p/1").unwrap().content, "/p/:id id=1");

        assert!(!site.revalidate_path("/nowhere").await);
        assert!(!site.revalidate_path("/live").await);
    }

    #[tokio::test]
    async fn test_revalidate_path_failure_leaves_no_entry() {
        let site = revalidating_site(TestRenderer::failing(), 1);
        site.set_page("/p/1", &CacheEntry::new("old", 0, 60));

        assert!(!site.revalidate_path("/p/1").await);
        assert_eq!(site.get_page("/p/1"), None);
    }

    #[tokio::test]
    async fn test_revalidate_path_panicking_renderer_reports_failure() {
        let site = revalidating_site(TestRenderer::panicking(), 1);
        site.set_page("/p/1", &CacheEntry::new("old", 0, 60));

        assert!(!site.revalidate_path("/p/1").await);
        assert_eq!(site.get_page("/p/1"), None);
    }

    fn write_project(toml: &str) -> (tempfile::TempDir, Config) {
        let temp_dir = tempfile::tempdir().unwrap();
        let app = temp_dir.path().join("app");
        fs::create_dir_all(app.join("blog/[slug]")).unwrap();
        fs::write(app.join("page.md"), "home").unwrap();
        fs::write(app.join("blog/[slug]/page.md"), "post").unwrap();
        fs::write(app.join("blog/[slug]/meta.yaml"), "revalidate: 30\n").unwrap();

        let path = temp_dir.path().join("pw.toml");
        fs::write(&path, toml).unwrap();
        let config = Config::load(Some(&path), None).unwrap();
        (temp_dir, config)
    }

    #[test]
    fn test_site_config_from_loaded_config() {
        let (_temp_dir, mut config) = write_project(
            "[cache]\nmax_pages = 10\nmax_fragments = 20\n\n[revalidation]\nconcurrency = 2\n",
        );

        let site_config = SiteConfig::try_from(&config).unwrap();
        assert_eq!(site_config.max_pages.get(), 10);
        assert_eq!(site_config.max_fragments.get(), 20);
        assert_eq!(site_config.concurrency.get(), 2);

        config.revalidation.concurrency = 0;
        let err = SiteConfig::try_from(&config).unwrap_err();
        assert!(err.to_string().contains("revalidation.concurrency"));
    }

    #[test]
    fn test_configure_applies_routes_limits_and_cache() {
        let (temp_dir, config) = write_project(
            "[cache]\ndir = \"cache\"\nversion = \"shared-7\"\n\n[revalidation]\nconcurrency = 3\n",
        );

        let site = Site::builder(TestRenderer::with_delay(Duration::ZERO))
            .configure(&config, "app-1")
            .unwrap()
            .build();

        assert_eq!(site.scheduler().concurrency_limit(), 3);
        let matched = site.resolve("/blog/hello").unwrap();
        assert_eq!(matched.descriptor.revalidate_seconds, Some(30));

        site.set_page("/blog/hello", &CacheEntry::new("post", 0, 30));
        let cache_dir = temp_dir.path().join("cache");
        assert_eq!(fs::read_to_string(cache_dir.join("VERSION")).unwrap(), "shared-7");
        assert!(cache_dir.join("pages/blog/hello.entry").exists());
    }

    #[test]
    fn test_configure_falls_back_to_app_version() {
        let (temp_dir, config) = write_project("");

        let _site = Site::builder(TestRenderer::with_delay(Duration::ZERO))
            .configure(&config, "app-1")
            .unwrap()
            .build();

        let version = fs::read_to_string(temp_dir.path().join(".pw/cache/VERSION")).unwrap();
        assert_eq!(version, "app-1");
    }

    #[test]
    fn test_reload_routes_swaps_table() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().to_path_buf();
        fs::write(root.join("page.md"), "home").unwrap();

        let builder = RouteTableBuilder::new(
            root.clone(),
            Arc::new(pw_routes::SidecarClassifier::default()),
        );
        let site = Site::builder(TestRenderer::with_delay(Duration::ZERO))
            .route_builder(builder)
            .build();
        let before = site.routes();
        assert_eq!(before.len(), 1);

        fs::create_dir_all(root.join("blog/[slug]")).unwrap();
        fs::write(root.join("blog/[slug]/page.md"), "post").unwrap();

        assert_eq!(site.reload_routes().unwrap().len(), 2);
        assert_eq!(before.len(), 1);
        assert!(site.resolve("/blog/x").is_some());
    }

    #[test]
    fn test_reload_without_builder() {
        let site = revalidating_site(TestRenderer::with_delay(Duration::ZERO), 1);
        assert!(site.reload_routes().is_none());
        site.replace_routes(RouteTable::new());
        assert!(site.routes().is_empty());
    }

    #[test]
    fn test_persistent_tier_shared_across_sites() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache: Arc<dyn Cache> = Arc::new(FileCache::new(temp_dir.path().to_path_buf(), "1"));
        let entry = CacheEntry::new("home", 5, 60);

        let first = Site::builder(TestRenderer::with_delay(Duration::ZERO))
            .cache(Arc::clone(&cache))
            .build();
        first.set_page("/", &entry);

        let second = Site::builder(TestRenderer::with_delay(Duration::ZERO))
            .cache(cache)
            .build();
        assert_eq!(second.get_page("/"), Some(entry));
    }
}
