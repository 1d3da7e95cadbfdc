//! Route descriptors and the ordered route table.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::classifier::Classification;
use crate::pattern::RoutePattern;

/// Rendering strategy reported by the content classifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    /// Output can be cached and regenerated in the background.
    #[default]
    Static,
    /// Output is produced per request.
    Dynamic,
}

/// Which reserved file produced a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteKind {
    /// A page file; wrapped by its layout chain.
    Page,
    /// A route-handler file; never wrapped by layouts.
    Handler,
}

/// One entry per discovered page or route handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteDescriptor {
    /// Path template, unique within its table.
    pub pattern: RoutePattern,
    /// Handle to the page implementation. Passed through to the renderer and
    /// loader, never interpreted here.
    pub source: PathBuf,
    /// Layout handles, root-most first.
    pub layouts: Vec<PathBuf>,
    /// Page or route handler.
    pub kind: RouteKind,
    /// Rendering strategy.
    pub page_type: PageType,
    /// Background regeneration interval, if the route participates in it.
    pub revalidate_seconds: Option<u64>,
    /// Route has a data loader.
    pub has_loader: bool,
    /// Route has a parameter generator.
    pub has_param_generator: bool,
}

impl RouteDescriptor {
    /// Create a page descriptor with default classification and no layouts.
    #[must_use]
    pub fn new(pattern: RoutePattern, source: impl Into<PathBuf>) -> Self {
        Self {
            pattern,
            source: source.into(),
            layouts: Vec::new(),
            kind: RouteKind::Page,
            page_type: PageType::Static,
            revalidate_seconds: None,
            has_loader: false,
            has_param_generator: false,
        }
    }

    /// Set the route kind.
    #[must_use]
    pub fn with_kind(mut self, kind: RouteKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the layout chain (root-most first).
    #[must_use]
    pub fn with_layouts(mut self, layouts: Vec<PathBuf>) -> Self {
        self.layouts = layouts;
        self
    }

    /// Apply flags returned by a content classifier.
    ///
    /// A zero revalidation interval is treated as absent.
    #[must_use]
    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.page_type = classification.page_type;
        self.revalidate_seconds = classification.revalidate_seconds.filter(|&s| s > 0);
        self.has_loader = classification.has_loader;
        self.has_param_generator = classification.has_param_generator;
        self
    }

    /// Names of the dynamic and catch-all segments, in pattern order.
    #[must_use]
    pub fn param_names(&self) -> Vec<&str> {
        self.pattern.param_names()
    }

    /// True if the route participates in background regeneration.
    #[must_use]
    pub fn is_revalidatable(&self) -> bool {
        self.page_type == PageType::Static && self.revalidate_seconds.is_some()
    }
}

/// Ordered mapping from pattern text to [`RouteDescriptor`].
///
/// Insertion order is significant: dynamic routes are matched in the order
/// they were first inserted. Re-inserting an existing pattern replaces the
/// descriptor in place and keeps its original position.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<RouteDescriptor>>,
    index: HashMap<String, usize>,
    dynamic: Vec<usize>,
}

impl RouteTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor, returning the one it replaced (if any).
    pub fn insert(&mut self, descriptor: RouteDescriptor) -> Option<Arc<RouteDescriptor>> {
        let key = descriptor.pattern.as_str().to_owned();
        let descriptor = Arc::new(descriptor);

        if let Some(&position) = self.index.get(&key) {
            return Some(std::mem::replace(&mut self.routes[position], descriptor));
        }

        let position = self.routes.len();
        if descriptor.pattern.is_dynamic() {
            self.dynamic.push(position);
        }
        self.routes.push(descriptor);
        self.index.insert(key, position);
        None
    }

    /// Exact lookup by pattern text.
    #[must_use]
    pub fn get(&self, pattern: &str) -> Option<&Arc<RouteDescriptor>> {
        self.index.get(pattern).map(|&i| &self.routes[i])
    }

    /// All descriptors in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RouteDescriptor>> {
        self.routes.iter()
    }

    /// Descriptors whose pattern has dynamic or catch-all segments, in
    /// insertion order.
    pub fn dynamic_routes(&self) -> impl Iterator<Item = &Arc<RouteDescriptor>> {
        self.dynamic.iter().map(|&i| &self.routes[i])
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True if the table has no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl FromIterator<RouteDescriptor> for RouteTable {
    fn from_iter<I: IntoIterator<Item = RouteDescriptor>>(iter: I) -> Self {
        let mut table = Self::new();
        for descriptor in iter {
            table.insert(descriptor);
        }
        table
    }
}
