//! Path matching against a [`RouteTable`].
//!
//! # Resolution order
//!
//! 1. Normalize the path (strip one trailing slash, except for `/`)
//! 2. Exact lookup by pattern text, then the opposite trailing-slash form
//! 3. Scan dynamic routes in table insertion order; per candidate try the
//!    catch-all matcher, then the positional matcher
//!
//! The first dynamic candidate that matches wins. There is no
//! "most specific wins" rule: overlapping dynamic routes are disambiguated
//! purely by insertion order.

use std::sync::Arc;

use crate::pattern::{Params, Segment};
use crate::table::{RouteDescriptor, RouteTable};

/// A resolved route and the parameters bound from the path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteMatch {
    /// Winning descriptor.
    pub descriptor: Arc<RouteDescriptor>,
    /// Parameters extracted from the path (empty for exact matches).
    pub params: Params,
}

/// Strip a single trailing slash, leaving `/` itself untouched.
#[must_use]
pub fn normalize_path(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Resolve `path` against `table`.
#[must_use]
pub fn match_path(table: &RouteTable, path: &str) -> Option<RouteMatch> {
    let normalized = normalize_path(path);

    if let Some(descriptor) = table
        .get(normalized)
        .or_else(|| table.get(&toggle_trailing_slash(normalized)))
    {
        return Some(RouteMatch {
            descriptor: Arc::clone(descriptor),
            params: Params::new(),
        });
    }

    let path_segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

    table.dynamic_routes().find_map(|descriptor| {
        let segments = descriptor.pattern.segments();
        match_catch_all(segments, &path_segments)
            .or_else(|| match_positional(segments, &path_segments))
            .map(|params| RouteMatch {
                descriptor: Arc::clone(descriptor),
                params,
            })
    })
}

impl RouteTable {
    /// Resolve `path` against this table. See [`match_path`].
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        match_path(self, path)
    }
}

fn toggle_trailing_slash(path: &str) -> String {
    match path.strip_suffix('/') {
        Some(stripped) => stripped.to_owned(),
        None => format!("{path}/"),
    }
}

/// Match the leading literal/param tokens positionally and bind every
/// remaining path segment to the catch-all.
fn match_catch_all(pattern: &[Segment], path: &[&str]) -> Option<Params> {
    let (Segment::CatchAll(name), leading) = pattern.split_last()? else {
        return None;
    };
    if path.len() < leading.len() {
        return None;
    }

    let mut params = bind_positional(leading, &path[..leading.len()])?;
    params.insert(name.clone(), path[leading.len()..].join("/"));
    Some(params)
}

/// Match a pattern with no catch-all segment-for-segment.
fn match_positional(pattern: &[Segment], path: &[&str]) -> Option<Params> {
    if pattern.len() != path.len() {
        return None;
    }
    bind_positional(pattern, path)
}

fn bind_positional(pattern: &[Segment], path: &[&str]) -> Option<Params> {
    let mut params = Params::new();
    for (segment, value) in pattern.iter().zip(path) {
        match segment {
            Segment::Literal(text) if text == value => {}
            Segment::Param(name) if !value.is_empty() => {
                params.insert(name.clone(), (*value).to_owned());
            }
            _ => return None,
        }
    }
    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::RoutePattern;
    use pretty_assertions::assert_eq;

    fn table(patterns: &[&str]) -> RouteTable {
        patterns
            .iter()
            .map(|p| RouteDescriptor::new(RoutePattern::parse(p).unwrap(), format!("src{p}")))
            .collect()
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn resolved(table: &RouteTable, path: &str) -> Option<(String, Params)> {
        match_path(table, path).map(|m| (m.descriptor.pattern.as_str().to_owned(), m.params))
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/blog/"), "/blog");
        assert_eq!(normalize_path("/blog"), "/blog");
        assert_eq!(normalize_path("/blog//"), "/blog/");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn test_blog_docs_and_unknown() {
        let table = table(&["/", "/blog/:slug", "/docs/*rest"]);

        assert_eq!(
            resolved(&table, "/blog/post-1"),
            Some(("/blog/:slug".to_owned(), params(&[("slug", "post-1")])))
        );
        assert_eq!(
            resolved(&table, "/docs/a/b/c"),
            Some(("/docs/*rest".to_owned(), params(&[("rest", "a/b/c")])))
        );
        assert_eq!(resolved(&table, "/unknown"), None);
        assert_eq!(resolved(&table, "/"), Some(("/".to_owned(), Params::new())));
    }

    #[test]
    fn test_first_inserted_dynamic_route_wins() {
        let forward = table(&["/a/:x", "/a/:static"]);
        assert_eq!(
            resolved(&forward, "/a/static"),
            Some(("/a/:x".to_owned(), params(&[("x", "static")])))
        );

        let reversed = table(&["/a/:static", "/a/:x"]);
        assert_eq!(
            resolved(&reversed, "/a/static"),
            Some(("/a/:static".to_owned(), params(&[("static", "static")])))
        );
    }

    #[test]
    fn test_exact_match_checked_before_dynamic() {
        let table = table(&["/a/:x", "/a/static"]);
        assert_eq!(
            resolved(&table, "/a/static"),
            Some(("/a/static".to_owned(), Params::new()))
        );
        assert_eq!(
            resolved(&table, "/a/other"),
            Some(("/a/:x".to_owned(), params(&[("x", "other")])))
        );
    }

    #[test]
    fn test_trailing_slash_forms() {
        let table = table(&["/about", "/contact/"]);

        assert_eq!(
            resolved(&table, "/about/"),
            Some(("/about".to_owned(), Params::new()))
        );
        assert_eq!(
            resolved(&table, "/contact"),
            Some(("/contact/".to_owned(), Params::new()))
        );
        assert_eq!(resolved(&table, ""), None);
    }

    #[test]
    fn test_empty_path_matches_root_via_slash_retry() {
        let table = table(&["/"]);
        assert_eq!(resolved(&table, ""), Some(("/".to_owned(), Params::new())));
    }

    #[test]
    fn test_catch_all_requires_leading_tokens() {
        let table = table(&["/docs/:version/*rest"]);

        assert_eq!(
            resolved(&table, "/docs/v1/intro/setup"),
            Some((
                "/docs/:version/*rest".to_owned(),
                params(&[("version", "v1"), ("rest", "intro/setup")])
            ))
        );
        // Leading tokens present, nothing left for the catch-all
        assert_eq!(
            resolved(&table, "/docs/v1"),
            Some((
                "/docs/:version/*rest".to_owned(),
                params(&[("version", "v1"), ("rest", "")])
            ))
        );
        assert_eq!(resolved(&table, "/docs"), None);
        assert_eq!(resolved(&table, "/guides/v1/x"), None);
    }

    #[test]
    fn test_positional_requires_equal_length() {
        let table = table(&["/shop/:category/:item"]);

        assert_eq!(
            resolved(&table, "/shop/books/dune"),
            Some((
                "/shop/:category/:item".to_owned(),
                params(&[("category", "books"), ("item", "dune")])
            ))
        );
        assert_eq!(resolved(&table, "/shop/books"), None);
        assert_eq!(resolved(&table, "/shop/books/dune/extra"), None);
    }

    #[test]
    fn test_static_routes_never_scanned_as_dynamic() {
        let table = table(&["/blog"]);
        assert_eq!(resolved(&table, "/blog/x"), None);
    }

    #[test]
    fn test_round_trip_through_pattern_substitution() {
        let table = table(&["/", "/blog/:slug", "/shop/:category/:item", "/docs/*rest"]);
        let cases = [
            ("/blog/:slug", params(&[("slug", "hello-world")])),
            (
                "/shop/:category/:item",
                params(&[("category", "games"), ("item", "chess")]),
            ),
            ("/docs/*rest", params(&[("rest", "guide/install/linux")])),
        ];

        for (pattern, assignment) in cases {
            let descriptor = table.get(pattern).unwrap();
            let path = descriptor.pattern.to_path(&assignment).unwrap();
            let matched = table.resolve(&path).unwrap();
            assert_eq!(matched.descriptor.pattern.as_str(), pattern, "path {path}");
            assert_eq!(matched.params, assignment, "path {path}");
        }
    }
}
