//! Renderer and loader seams, and the pipeline that drives them.

use std::sync::Arc;

use async_trait::async_trait;
use pw_routes::{Params, RouteDescriptor, RouteMatch};
use serde_json::Value;

use crate::clock::Clock;
use crate::error::{BoxError, RenderError, RevalidateError};
use crate::page_cache::{CacheEntry, PageCache};
use crate::routes::RouteRegistry;

/// Produces output for a route. Supplied by the surrounding application.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `route` with the bound `params` and the loader's `data`
    /// (`Value::Null` when the route has no loader).
    async fn render(
        &self,
        route: &RouteDescriptor,
        params: &Params,
        data: &Value,
    ) -> Result<String, BoxError>;
}

/// Fetches the data a route renders. Supplied by the surrounding application.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Load data for `route` with the bound `params`.
    async fn load(&self, route: &RouteDescriptor, params: &Params) -> Result<Value, BoxError>;
}

/// Resolves, loads, renders and stores pages.
///
/// Shared by on-demand serving and the background scheduler.
pub(crate) struct RenderPipeline {
    routes: Arc<RouteRegistry>,
    pages: Arc<PageCache>,
    renderer: Arc<dyn Renderer>,
    loader: Option<Arc<dyn Loader>>,
    clock: Arc<dyn Clock>,
}

impl RenderPipeline {
    pub(crate) fn new(
        routes: Arc<RouteRegistry>,
        pages: Arc<PageCache>,
        renderer: Arc<dyn Renderer>,
        loader: Option<Arc<dyn Loader>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            routes,
            pages,
            renderer,
            loader,
            clock,
        }
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Run the loader (if the route has one) and the renderer.
    pub(crate) async fn render(
        &self,
        path: &str,
        matched: &RouteMatch,
    ) -> Result<String, RenderError> {
        let route = &matched.descriptor;

        let data = match (&self.loader, route.has_loader) {
            (Some(loader), true) => loader
                .load(route, &matched.params)
                .await
                .map_err(|source| RenderError::Load {
                    path: path.to_owned(),
                    source,
                })?,
            (None, true) => {
                tracing::warn!(
                    path,
                    pattern = %route.pattern,
                    "Route has a loader but none is configured"
                );
                Value::Null
            }
            (_, false) => Value::Null,
        };

        self.renderer
            .render(route, &matched.params, &data)
            .await
            .map_err(|source| RenderError::Render {
                path: path.to_owned(),
                source,
            })
    }

    /// Regenerate the page cached under `path` from the current route table.
    ///
    /// On any error the cached entry is left untouched.
    pub(crate) async fn revalidate(&self, path: &str) -> Result<(), RevalidateError> {
        let table = self.routes.current();
        let matched = table
            .resolve(path)
            .ok_or_else(|| RevalidateError::Unresolved(path.to_owned()))?;

        let ttl_seconds = match matched.descriptor.revalidate_seconds {
            Some(ttl) if matched.descriptor.is_revalidatable() => ttl,
            _ => {
                return Err(RevalidateError::Ineligible {
                    path: path.to_owned(),
                    pattern: matched.descriptor.pattern.to_string(),
                });
            }
        };

        let content = self.render(path, &matched).await?;
        self.pages
            .set(path, &CacheEntry::new(content, self.clock.now_ms(), ttl_seconds));
        Ok(())
    }

    /// [`RenderPipeline::revalidate`] on its own task, so a panicking
    /// renderer or loader surfaces as [`RevalidateError::Panicked`].
    pub(crate) async fn revalidate_isolated(
        self: &Arc<Self>,
        path: &str,
    ) -> Result<(), RevalidateError> {
        let pipeline = Arc::clone(self);
        let owned = path.to_owned();
        tokio::spawn(async move { pipeline.revalidate(&owned).await })
            .await
            .unwrap_or_else(|_| Err(RevalidateError::Panicked(path.to_owned())))
    }
}
