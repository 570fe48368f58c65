//! Locates the sqlc query definitions behind generated TypeScript code.
//!
//! sqlc turns `.sql` files full of `-- name: X` markers into TypeScript
//! modules. Projects usually wrap those modules in hand-written repository
//! files ("consumers") that the rest of the code imports. This crate answers
//! the question "which query is this call running?" for both kinds of file.
//!
//! # Features
//!
//! - Marker scanning of query-definition files
//! - Import resolution with `tsconfig.json` `baseUrl`/`paths` aliases
//! - Import, export and call-site extraction with tree-sitter
//! - Lookup of the generated `<name>Query` string constants
//!
//! # Example
//!
//! ```ignore
//! use sqlc_lens_core::{parse_source, QueryLocator, Settings, Workspace};
//! use std::path::{Path, PathBuf};
//!
//! let locator = QueryLocator::new(Workspace::new(
//!     vec![PathBuf::from("/work/app")],
//!     Settings::default(),
//! ));
//! let file = Path::new("/work/app/src/controllers/user.ts");
//! let parsed = parse_source(&std::fs::read_to_string(file)?, file)?;
//! for annotation in locator.locate_all(file, &parsed) {
//!     println!("{} -> {}", annotation.name, annotation.definition_file.display());
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod locator;
pub mod marker;
pub mod resolve;
pub mod syntax;
pub mod tsconfig;
pub mod workspace;

mod span;

pub use cache::SourceCache;
pub use config::{Settings, LEGACY_SETTINGS_SECTION, SETTINGS_SECTION};
pub use error::LookupError;
pub use locator::{QueryAnnotation, QueryLocator, QueryMatch, ResolvedImport};
pub use marker::{scan_markers, QueryMarker};
pub use resolve::PathResolver;
pub use span::Span;
pub use syntax::{parse_source, BindingKind, ExportedFunction, ParsedSource};
pub use workspace::{is_supported_source, Workspace};
