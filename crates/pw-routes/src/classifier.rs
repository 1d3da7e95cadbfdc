//! Content classification at table-build time.
//!
//! The builder never looks inside page sources. It asks a
//! [`ContentClassifier`] for the flags it stores on each descriptor.
//! [`SidecarClassifier`] reads them from a YAML file next to the page:
//!
//! ```yaml
//! type: static        # static | dynamic
//! revalidate: 60      # seconds
//! loader: true
//! static_params: true
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::table::PageType;

/// Flags describing how a page is rendered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Classification {
    /// Rendering strategy.
    pub page_type: PageType,
    /// Background regeneration interval in seconds.
    pub revalidate_seconds: Option<u64>,
    /// Page has a data loader.
    pub has_loader: bool,
    /// Page has a parameter generator.
    pub has_param_generator: bool,
}

/// Inspects a page source and reports its [`Classification`].
pub trait ContentClassifier: Send + Sync {
    /// Classify the page at `source`.
    fn classify(&self, source: &Path) -> Classification;
}

impl<F> ContentClassifier for F
where
    F: Fn(&Path) -> Classification + Send + Sync,
{
    fn classify(&self, source: &Path) -> Classification {
        self(source)
    }
}

/// Fields read from a sidecar file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Sidecar {
    #[serde(rename = "type")]
    page_type: Option<PageType>,
    revalidate: Option<u64>,
    loader: bool,
    static_params: bool,
}

/// Default sidecar filename.
const DEFAULT_META_FILENAME: &str = "meta.yaml";

/// Classifier backed by a YAML sidecar in the page's directory.
///
/// Pages without a sidecar, or with an unreadable one, get the default
/// classification (static, no regeneration, no loader).
#[derive(Clone, Debug)]
pub struct SidecarClassifier {
    meta_filename: String,
}

impl SidecarClassifier {
    /// Create a classifier reading sidecars named `meta_filename`.
    #[must_use]
    pub fn new(meta_filename: impl Into<String>) -> Self {
        Self {
            meta_filename: meta_filename.into(),
        }
    }

    fn read_sidecar(&self, source: &Path) -> Option<Sidecar> {
        let meta_path = source.parent()?.join(&self.meta_filename);
        let content = fs::read_to_string(&meta_path).ok()?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return None;
        }
        match serde_yaml::from_str(trimmed) {
            Ok(sidecar) => Some(sidecar),
            Err(e) => {
                tracing::warn!(
                    path = %meta_path.display(),
                    error = %e,
                    "Ignoring malformed page sidecar"
                );
                None
            }
        }
    }
}

impl Default for SidecarClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_META_FILENAME)
    }
}

impl ContentClassifier for SidecarClassifier {
    fn classify(&self, source: &Path) -> Classification {
        let Some(sidecar) = self.read_sidecar(source) else {
            return Classification::default();
        };
        Classification {
            page_type: sidecar.page_type.unwrap_or_default(),
            revalidate_seconds: sidecar.revalidate,
            has_loader: sidecar.loader,
            has_param_generator: sidecar.static_params,
        }
    }
}
