//! Route discovery by page-tree walking.
//!
//! Each directory may hold a page file, a route-handler file and a layout file,
//! recognized by their reserved stems (`page`, `route`, `layout`; any
//! extension). Directory names become pattern segments:
//!
//! - `blog` -> `blog`
//! - `[slug]` -> `:slug`
//! - `[...rest]` -> `*rest`
//!
//! A page file at the root maps to `/`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::classifier::ContentClassifier;
use crate::pattern::{RoutePattern, Segment};
use crate::table::{RouteDescriptor, RouteKind, RouteTable};

const PAGE_STEM: &str = "page";
const ROUTE_STEM: &str = "route";
const LAYOUT_STEM: &str = "layout";

/// Builds a [`RouteTable`] from a page tree on disk.
///
/// Entries within a directory are visited in byte-wise name order, so when two
/// files map to the same pattern the result is deterministic: the one scanned
/// last wins.
pub struct RouteTableBuilder {
    root: PathBuf,
    classifier: Arc<dyn ContentClassifier>,
}

impl RouteTableBuilder {
    /// Create a builder for the tree at `root`.
    ///
    /// # Arguments
    ///
    /// * `root` - Page tree root directory
    /// * `classifier` - Supplies page type and regeneration flags per page
    #[must_use]
    pub fn new(root: PathBuf, classifier: Arc<dyn ContentClassifier>) -> Self {
        Self { root, classifier }
    }

    /// Page tree root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree and build a fresh table.
    ///
    /// A missing or unreadable root yields an empty table.
    pub fn build(&self) -> RouteTable {
        let start = Instant::now();
        let mut table = RouteTable::new();

        if self.root.is_dir() {
            self.scan_directory(&self.root, &mut Vec::new(), &mut Vec::new(), &mut table);
        } else {
            tracing::warn!(
                root = %self.root.display(),
                "Page tree root is missing, route table is empty"
            );
        }

        tracing::info!(
            root = %self.root.display(),
            routes = table.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Route table built"
        );
        table
    }

    fn scan_directory(
        &self,
        dir: &Path,
        segments: &mut Vec<Segment>,
        layouts: &mut Vec<PathBuf>,
        table: &mut RouteTable,
    ) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                return;
            }
        };

        let mut entries: Vec<_> = entries
            .filter_map(Result::ok)
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .map(|e| {
                let is_dir = e.file_type().is_ok_and(|t| t.is_dir());
                (e.file_name(), e.path(), is_dir)
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let files: Vec<&PathBuf> = entries
            .iter()
            .filter(|(_, _, is_dir)| !is_dir)
            .map(|(_, path, _)| path)
            .collect();

        // Layouts in this directory wrap its own page and everything below
        let layouts_before = layouts.len();
        layouts.extend(
            files
                .iter()
                .filter(|p| file_stem(p) == Some(LAYOUT_STEM))
                .map(|p| (*p).clone()),
        );

        for path in &files {
            let kind = match file_stem(path) {
                Some(PAGE_STEM) => RouteKind::Page,
                Some(ROUTE_STEM) => RouteKind::Handler,
                _ => continue,
            };
            self.register(path, kind, segments, layouts, table);
        }

        for (name, path, _) in entries.iter().filter(|(_, _, is_dir)| *is_dir) {
            let name = name.to_string_lossy();
            if matches!(segments.last(), Some(Segment::CatchAll(_))) {
                tracing::warn!(
                    dir = %path.display(),
                    "Catch-all directory cannot have nested routes, skipping"
                );
                continue;
            }
            segments.push(dir_segment(&name));
            self.scan_directory(path, segments, layouts, table);
            segments.pop();
        }

        layouts.truncate(layouts_before);
    }

    fn register(
        &self,
        source: &Path,
        kind: RouteKind,
        segments: &[Segment],
        layouts: &[PathBuf],
        table: &mut RouteTable,
    ) {
        let pattern = match RoutePattern::from_segments(segments.to_vec()) {
            Ok(pattern) => pattern,
            Err(e) => {
                tracing::warn!(
                    source = %source.display(),
                    error = %e,
                    "Skipping route with invalid pattern"
                );
                return;
            }
        };

        let layouts = match kind {
            RouteKind::Page => layouts.to_vec(),
            RouteKind::Handler => Vec::new(),
        };

        let descriptor = RouteDescriptor::new(pattern, source)
            .with_kind(kind)
            .with_layouts(layouts)
            .with_classification(self.classifier.classify(source));

        if let Some(previous) = table.insert(descriptor) {
            tracing::warn!(
                pattern = %previous.pattern,
                replaced = %previous.source.display(),
                by = %source.display(),
                "Route collision, last scanned file wins"
            );
        }
    }
}

/// Reserved stem of a file (`page.tsx` -> `page`).
fn file_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

/// Translate a directory name into a pattern segment.
fn dir_segment(name: &str) -> Segment {
    let Some(inner) = name.strip_prefix('[').and_then(|n| n.strip_suffix(']')) else {
        return Segment::Literal(name.to_owned());
    };
    match inner.strip_prefix("...") {
        Some(rest) if !rest.is_empty() => Segment::CatchAll(rest.to_owned()),
        None if !inner.is_empty() => Segment::Param(inner.to_owned()),
        _ => Segment::Literal(name.to_owned()),
    }
}
