//! Route pattern model.
//!
//! A pattern is a `/`-separated path template. Each segment is one of:
//!
//! - a literal (`blog`), matched by exact equality
//! - a dynamic parameter (`:slug`), matched by any single non-empty segment
//! - a catch-all (`*rest`), matched by every remaining segment; only valid as
//!   the final segment

use std::collections::HashMap;
use std::fmt;

/// Parameters extracted from a matched path, keyed by parameter name.
pub type Params = HashMap<String, String>;

/// One segment of a route pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Fixed text.
    Literal(String),
    /// Single dynamic segment (`:name`).
    Param(String),
    /// Trailing catch-all (`*name`).
    CatchAll(String),
}

impl Segment {
    /// Parameter name for dynamic and catch-all segments.
    #[must_use]
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Param(name) | Self::CatchAll(name) => Some(name),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.write_str(text),
            Self::Param(name) => write!(f, ":{name}"),
            Self::CatchAll(name) => write!(f, "*{name}"),
        }
    }
}

/// Error returned when a pattern string is malformed.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    /// Pattern does not start with `/`.
    #[error("route pattern must start with '/': {0}")]
    MissingLeadingSlash(String),
    /// `:` or `*` without a name.
    #[error("route pattern has an unnamed parameter: {0}")]
    EmptyParamName(String),
    /// Catch-all segment followed by more segments.
    #[error("catch-all must be the final segment: {0}")]
    CatchAllNotLast(String),
    /// The same parameter name appears twice.
    #[error("duplicate parameter '{name}' in route pattern: {pattern}")]
    DuplicateParam {
        /// Offending pattern.
        pattern: String,
        /// Repeated parameter name.
        name: String,
    },
}

/// A parsed route pattern.
///
/// The original text is kept verbatim and is the key of the pattern in a
/// route table; `"/about"` and `"/about/"` are different keys that parse to
/// the same segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePattern {
    text: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a pattern string such as `/blog/:slug` or `/docs/*rest`.
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        if !text.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(text.to_owned()));
        }

        let segments = text
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|token| {
                if let Some(name) = token.strip_prefix(':') {
                    non_empty(name, text).map(|n| Segment::Param(n.to_owned()))
                } else if let Some(name) = token.strip_prefix('*') {
                    non_empty(name, text).map(|n| Segment::CatchAll(n.to_owned()))
                } else {
                    Ok(Segment::Literal(token.to_owned()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::validated(text.to_owned(), segments)
    }

    /// Build a pattern from already-classified segments.
    ///
    /// The pattern text is the segments joined with `/`; no segments yields `/`.
    pub fn from_segments(segments: Vec<Segment>) -> Result<Self, PatternError> {
        let text = if segments.is_empty() {
            "/".to_owned()
        } else {
            segments.iter().fold(String::new(), |mut acc, segment| {
                acc.push('/');
                acc.push_str(&segment.to_string());
                acc
            })
        };
        Self::validated(text, segments)
    }

    fn validated(text: String, segments: Vec<Segment>) -> Result<Self, PatternError> {
        let last = segments.len().saturating_sub(1);
        let mut seen: Vec<&str> = Vec::new();

        for (i, segment) in segments.iter().enumerate() {
            if matches!(segment, Segment::CatchAll(_)) && i != last {
                return Err(PatternError::CatchAllNotLast(text));
            }
            if let Some(name) = segment.param_name() {
                if seen.contains(&name) {
                    return Err(PatternError::DuplicateParam {
                        name: name.to_owned(),
                        pattern: text,
                    });
                }
                seen.push(name);
            }
        }

        Ok(Self { text, segments })
    }

    /// Pattern text as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of dynamic and catch-all segments, in pattern order.
    #[must_use]
    pub fn param_names(&self) -> Vec<&str> {
        self.segments.iter().filter_map(Segment::param_name).collect()
    }

    /// True if the pattern has at least one dynamic or catch-all segment.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.segments
            .iter()
            .any(|s| !matches!(s, Segment::Literal(_)))
    }

    /// True if the final segment is a catch-all.
    #[must_use]
    pub fn has_catch_all(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::CatchAll(_)))
    }

    /// Substitute parameters into the pattern, producing a concrete path.
    ///
    /// Returns `None` if a parameter is missing or a single-segment parameter
    /// value is empty or contains `/`.
    #[must_use]
    pub fn to_path(&self, params: &Params) -> Option<String> {
        let mut path = String::new();
        for segment in &self.segments {
            let value = match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Param(name) => {
                    let value = params.get(name)?;
                    if value.is_empty() || value.contains('/') {
                        return None;
                    }
                    value.as_str()
                }
                Segment::CatchAll(name) => {
                    let value = params.get(name)?;
                    if value.is_empty() {
                        continue;
                    }
                    value.as_str()
                }
            };
            path.push('/');
            path.push_str(value);
        }
        if path.is_empty() {
            path.push('/');
        }
        Some(path)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn non_empty<'a>(name: &'a str, pattern: &str) -> Result<&'a str, PatternError> {
    if name.is_empty() {
        Err(PatternError::EmptyParamName(pattern.to_owned()))
    } else {
        Ok(name)
    }
}
