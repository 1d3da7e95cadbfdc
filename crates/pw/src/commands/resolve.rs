//! `pw resolve` command implementation.

use clap::Args;
use pw_routes::{Params, RouteMatch};

use super::{ConfigArgs, build_routes};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the resolve command.
#[derive(Args)]
pub(crate) struct ResolveArgs {
    /// Request path to resolve (e.g. /blog/hello).
    path: String,

    #[command(flatten)]
    config: ConfigArgs,
}

impl ResolveArgs {
    /// Execute the resolve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or no route matches the path.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.config.load()?;
        let table = build_routes(&config)?;

        let route_match = table
            .resolve(&self.path)
            .ok_or_else(|| CliError::NoRoute(self.path.clone()))?;

        for line in describe_match(&route_match) {
            output.line(&line);
        }
        Ok(())
    }
}

/// Winning pattern, source and bound params, params sorted by name.
fn describe_match(route_match: &RouteMatch) -> Vec<String> {
    let descriptor = &route_match.descriptor;
    let mut lines = vec![
        format!("pattern: {}", descriptor.pattern),
        format!("source: {}", descriptor.source.display()),
    ];
    lines.extend(sorted_params(&route_match.params));
    lines
}

fn sorted_params(params: &Params) -> Vec<String> {
    let mut pairs: Vec<_> = params.iter().collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(name, value)| format!("param {name} = {value}"))
        .collect()
}
