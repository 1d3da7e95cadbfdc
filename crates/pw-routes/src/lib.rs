//! Route discovery and path matching for Pagewright.
//!
//! This crate provides:
//! - [`RouteTableBuilder`]: Walks a page tree and produces a [`RouteTable`]
//! - [`match_path`]: Resolves a request path to a descriptor and parameters
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use pw_routes::{RouteTableBuilder, SidecarClassifier};
//!
//! let builder = RouteTableBuilder::new(
//!     PathBuf::from("app"),
//!     Arc::new(SidecarClassifier::default()),
//! );
//! let table = builder.build();
//!
//! if let Some(matched) = table.resolve("/blog/hello-world") {
//!     println!("{} {:?}", matched.descriptor.pattern, matched.params);
//! }
//! ```

mod builder;
mod classifier;
mod matcher;
mod pattern;
mod table;

pub use builder::RouteTableBuilder;
pub use classifier::{Classification, ContentClassifier, SidecarClassifier};
pub use matcher::{RouteMatch, match_path, normalize_path};
pub use pattern::{Params, PatternError, RoutePattern, Segment};
pub use table::{PageType, RouteDescriptor, RouteKind, RouteTable};
