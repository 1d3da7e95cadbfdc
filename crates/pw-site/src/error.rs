//! Error types for rendering, revalidation and serving.

/// Error type returned by [`Renderer`](crate::Renderer) and
/// [`Loader`](crate::Loader) implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Loader or renderer failure for a single path.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The route's data loader failed.
    #[error("loader failed for {path}: {source}")]
    Load {
        /// Request path being rendered.
        path: String,
        /// Loader error.
        #[source]
        source: BoxError,
    },

    /// The renderer failed.
    #[error("renderer failed for {path}: {source}")]
    Render {
        /// Request path being rendered.
        path: String,
        /// Renderer error.
        #[source]
        source: BoxError,
    },
}

/// Why a background regeneration did not produce a new entry.
#[derive(Debug, thiserror::Error)]
pub enum RevalidateError {
    /// No route matches the path.
    #[error("no route matches {0}")]
    Unresolved(String),

    /// The route is not static or has no revalidation interval.
    #[error("route {pattern} for {path} does not participate in revalidation")]
    Ineligible {
        /// Request path.
        path: String,
        /// Matched route pattern.
        pattern: String,
    },

    /// Loading or rendering failed; the cached entry is unchanged.
    #[error(transparent)]
    Failed(#[from] RenderError),

    /// The render task panicked; the cached entry is unchanged.
    #[error("render task for {0} panicked")]
    Panicked(String),
}

/// Error from [`Site::serve`](crate::Site::serve).
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// No route matches the path and nothing is cached for it.
    #[error("no route matches {0}")]
    Unresolved(String),

    /// First render of an uncached path failed.
    #[error(transparent)]
    Failed(#[from] RenderError),
}
