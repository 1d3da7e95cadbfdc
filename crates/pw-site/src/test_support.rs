//! Renderers, loaders and route tables shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pw_routes::{Classification, PageType, Params, RouteDescriptor, RoutePattern, RouteTable};
use serde_json::Value;

use crate::error::BoxError;
use crate::render::{Loader, Renderer};
use crate::site::{Site, SiteConfig};

enum Mode {
    Delay(Duration),
    Fail,
    Panic,
}

/// Renders `"<pattern> <k=v ...>[ data=<s>]"` and records concurrency.
pub(crate) struct TestRenderer {
    mode: Mode,
    renders: AtomicUsize,
    current: AtomicUsize,
    max: AtomicUsize,
}

impl TestRenderer {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            renders: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
            max: AtomicUsize::new(0),
        })
    }

    pub(crate) fn with_delay(delay: Duration) -> Arc<Self> {
        Self::new(Mode::Delay(delay))
    }

    pub(crate) fn failing() -> Arc<Self> {
        Self::new(Mode::Fail)
    }

    pub(crate) fn panicking() -> Arc<Self> {
        Self::new(Mode::Panic)
    }

    pub(crate) fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub(crate) fn max_concurrent(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for TestRenderer {
    async fn render(
        &self,
        route: &RouteDescriptor,
        params: &Params,
        data: &Value,
    ) -> Result<String, BoxError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);

        let result = match self.mode {
            Mode::Delay(delay) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let mut pairs: Vec<String> =
                    params.iter().map(|(k, v)| format!("{k}={v}")).collect();
                pairs.sort();
                let mut out = format!("{} {}", route.pattern, pairs.join(" "));
                if let Some(text) = data.as_str() {
                    out.push_str(&format!(" data={text}"));
                }
                Ok(out.trim_end().to_owned())
            }
            Mode::Fail => Err("renderer exploded".into()),
            Mode::Panic => {
                self.current.fetch_sub(1, Ordering::SeqCst);
                panic!("renderer panicked");
            }
        };

        self.current.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Loads `"loaded:<slug>"`.
pub(crate) struct TestLoader;

#[async_trait]
impl Loader for TestLoader {
    async fn load(&self, _route: &RouteDescriptor, params: &Params) -> Result<Value, BoxError> {
        let slug = params.get("slug").ok_or("missing slug")?;
        Ok(Value::String(format!("loaded:{slug}")))
    }
}

fn route(pattern: &str, classification: Classification) -> RouteDescriptor {
    RouteDescriptor::new(RoutePattern::parse(pattern).unwrap(), format!("app{pattern}/page.tsx"))
        .with_classification(classification)
}

/// `/` (never regenerated), `/p/:id` (60s), `/live` (dynamic) and
/// `/blog/:slug` (30s, with loader).
pub(crate) fn test_routes() -> RouteTable {
    [
        route("/", Classification::default()),
        route(
            "/p/:id",
            Classification {
                revalidate_seconds: Some(60),
                ..Classification::default()
            },
        ),
        route(
            "/live",
            Classification {
                page_type: PageType::Dynamic,
                revalidate_seconds: Some(60),
                ..Classification::default()
            },
        ),
        route(
            "/blog/:slug",
            Classification {
                revalidate_seconds: Some(30),
                has_loader: true,
                ..Classification::default()
            },
        ),
    ]
    .into_iter()
    .collect()
}

pub(crate) fn revalidating_site(renderer: Arc<TestRenderer>, concurrency: usize) -> Site {
    Site::builder(renderer)
        .routes(test_routes())
        .config(SiteConfig {
            concurrency: std::num::NonZeroUsize::new(concurrency).unwrap(),
            ..SiteConfig::default()
        })
        .build()
}
