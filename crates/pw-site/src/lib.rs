//! Rendered-content caching and background revalidation for Pagewright.
//!
//! This crate provides:
//! - [`Site`]: Serving-time context owning the route table, both caches and
//!   the revalidation scheduler
//! - [`PageCache`] / [`FragmentCache`]: Two-tier (memory + persistent) caches
//!   with LRU eviction
//! - [`RevalidationScheduler`]: Bounded-concurrency background regeneration
//! - [`Renderer`] / [`Loader`]: Seams for the application's rendering code
//!
//! # Quick Start
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use pw_routes::{Params, RouteDescriptor, RouteTableBuilder, SidecarClassifier};
//! use pw_site::{BoxError, Renderer, Site};
//! use serde_json::Value;
//!
//! struct Html;
//!
//! #[async_trait]
//! impl Renderer for Html {
//!     async fn render(
//!         &self,
//!         route: &RouteDescriptor,
//!         _params: &Params,
//!         _data: &Value,
//!     ) -> Result<String, BoxError> {
//!         Ok(format!("<main>{}</main>", route.pattern))
//!     }
//! }
//!
//! let builder = RouteTableBuilder::new(
//!     PathBuf::from("app"),
//!     Arc::new(SidecarClassifier::default()),
//! );
//! let site = Arc::new(Site::builder(Arc::new(Html)).route_builder(builder).build());
//!
//! let served = site.serve("/blog/hello-world").await?;
//! # let _ = served;
//! # Ok(())
//! # }
//! ```

mod clock;
mod error;
mod fragment_cache;
mod lock;
mod page_cache;
mod render;
mod revalidation;
mod routes;
mod site;
#[cfg(test)]
mod test_support;
mod tiered;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BoxError, RenderError, RevalidateError, ServeError};
pub use fragment_cache::{FragmentCache, FragmentEntry, Freshness, fragment_key};
pub use page_cache::{CacheEntry, PageCache};
pub use render::{Loader, Renderer};
pub use revalidation::RevalidationScheduler;
pub use site::{FRAGMENTS_BUCKET, PAGES_BUCKET, Served, Site, SiteBuilder, SiteConfig};
