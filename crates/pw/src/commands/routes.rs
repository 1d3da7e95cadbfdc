//! `pw routes` command implementation.

use clap::Args;
use pw_routes::{PageType, RouteDescriptor, RouteKind};

use super::{ConfigArgs, build_routes};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the routes command.
#[derive(Args)]
pub(crate) struct RoutesArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

impl RoutesArgs {
    /// Execute the routes command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the page tree is missing.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.config.load()?;
        let table = build_routes(&config)?;

        if table.is_empty() {
            output.warning(&format!(
                "No routes found in {}",
                config.pages_resolved.source_dir.display()
            ));
            return Ok(());
        }

        let width = table
            .iter()
            .map(|d| d.pattern.as_str().len())
            .max()
            .unwrap_or_default();
        for descriptor in table.iter() {
            output.line(&describe(descriptor, width));
        }
        output.info(&format!("{} routes", table.len()));
        Ok(())
    }
}

/// One table row: pattern, kind, rendering strategy and flags.
fn describe(descriptor: &RouteDescriptor, width: usize) -> String {
    let kind = match descriptor.kind {
        RouteKind::Page => "page",
        RouteKind::Handler => "route",
    };
    let page_type = match descriptor.page_type {
        PageType::Static => "static",
        PageType::Dynamic => "dynamic",
    };
    let mut parts = vec![format!(
        "{:<width$}  {kind:<5}  {page_type:<7}",
        descriptor.pattern.as_str()
    )];
    if let Some(seconds) = descriptor.revalidate_seconds {
        parts.push(format!("revalidate={seconds}s"));
    }
    if descriptor.has_loader {
        parts.push("loader".to_owned());
    }
    if descriptor.has_param_generator {
        parts.push("params".to_owned());
    }
    parts.join("  ").trim_end().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pw_routes::{Classification, RoutePattern};

    fn descriptor(pattern: &str) -> RouteDescriptor {
        RouteDescriptor::new(RoutePattern::parse(pattern).unwrap(), "page.tsx")
    }

    #[test]
    fn test_describe_plain_page() {
        assert_eq!(describe(&descriptor("/"), 4), "/     page   static");
    }

    #[test]
    fn test_describe_flags() {
        let d = descriptor("/blog/:slug").with_classification(Classification {
            page_type: PageType::Static,
            revalidate_seconds: Some(30),
            has_loader: true,
            has_param_generator: true,
        });
        assert_eq!(
            describe(&d, 11),
            "/blog/:slug  page   static   revalidate=30s  loader  params"
        );
    }

    #[test]
    fn test_describe_handler() {
        let d = descriptor("/api").with_kind(RouteKind::Handler);
        assert_eq!(describe(&d, 4), "/api  route  static");
    }
}
