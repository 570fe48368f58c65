//! Code lens handler.
//!
//! Puts a "Go to SQL query" lens on every exported query function of a
//! consumer file, and on every call of one in files that import them.

use lsp_types::{CodeLens, CodeLensParams};
use sqlc_lens_core::{ParsedSource, QueryLocator};
use std::path::Path;

use super::execute_command::{go_to_query_command, GoToQueryArgs};
use super::utils::LineIndex;

/// Title of every lens.
pub const LENS_TITLE: &str = "Go to SQL query";

/// Handle a code lens request.
pub fn handle_code_lens(
    _params: &CodeLensParams,
    source: &str,
    path: &Path,
    parsed: &ParsedSource,
    locator: &QueryLocator,
) -> Option<Vec<CodeLens>> {
    let annotations = locator.locate_all(path, parsed);
    if annotations.is_empty() {
        return None;
    }

    let index = LineIndex::new(source);
    let lenses: Vec<CodeLens> = annotations
        .iter()
        .map(|annotation| CodeLens {
            range: index.span_to_range(annotation.span),
            command: Some(go_to_query_command(
                LENS_TITLE,
                &GoToQueryArgs::new(&annotation.definition_file, annotation.offset),
            )),
            data: None,
        })
        .collect();

    tracing::debug!("{} code lenses for {}", lenses.len(), path.display());
    Some(lenses)
}
