//! CLI command implementations.

pub(crate) mod cache;
pub(crate) mod resolve;
pub(crate) mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use pw_config::{CliSettings, Config};
use pw_routes::{RouteTable, RouteTableBuilder, SidecarClassifier};

use crate::error::CliError;

pub(crate) use cache::CacheCommand;
pub(crate) use resolve::ResolveArgs;
pub(crate) use routes::RoutesArgs;

/// Options shared by every command that reads the project configuration.
#[derive(Args)]
pub(crate) struct ConfigArgs {
    /// Path to configuration file (default: auto-discover pw.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Page tree root (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Persistent cache directory (overrides config).
    #[arg(long, env = "PW_CACHE_DIR")]
    cache_dir: Option<PathBuf>,
}

impl ConfigArgs {
    /// Load the configuration with these arguments applied on top.
    pub(crate) fn load(&self) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            source_dir: self.source_dir.clone(),
            cache_dir: self.cache_dir.clone(),
            ..Default::default()
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }
}

/// Build the route table for the configured page tree.
pub(crate) fn build_routes(config: &Config) -> Result<RouteTable, CliError> {
    let source_dir = &config.pages_resolved.source_dir;
    if !source_dir.is_dir() {
        return Err(CliError::Validation(format!(
            "Page tree not found: {}",
            source_dir.display()
        )));
    }
    let classifier = Arc::new(SidecarClassifier::new(
        config.pages_resolved.meta_filename.as_str(),
    ));
    Ok(RouteTableBuilder::new(source_dir.clone(), classifier).build())
}
