//! Error types for query lookups.
//!
//! Lookups never surface these to the editor: the locator logs them and
//! treats the failed step as "no result".

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while locating a query.
#[derive(Debug, Error)]
pub enum LookupError {
    /// IO error reading a file.
    #[error("failed to read file {path}: {source}")]
    Io {
        /// The path that failed to read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A project configuration file could not be parsed.
    #[error("malformed project configuration {path}: {message}")]
    ConfigParse {
        /// The configuration file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// The syntax tree could not be produced.
    #[error("failed to parse {path}")]
    Parse {
        /// The source file.
        path: PathBuf,
    },

    /// The TypeScript grammar could not be loaded into the parser.
    #[error("incompatible tree-sitter grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),
}

impl LookupError {
    /// Build an [`LookupError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
