//! CLI error types.

use pw_cache::OpenError;
use pw_config::ConfigError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Cache(#[from] OpenError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("No route matches {0}")]
    NoRoute(String),

    #[error("{0}")]
    Validation(String),
}
