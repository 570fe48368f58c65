//! Query location.
//!
//! Ties the marker scanner, the import resolver and the syntax scanner
//! together. A file is looked at in one of two modes:
//!
//! - a *consumer* file lives in the consumer directory and wraps generated
//!   code; its exported functions are matched against the markers of its
//!   paired `.sql` file;
//! - any other file is an *importer*; its imports that resolve into the
//!   consumer directory lead to the paired `.sql` files of those consumers.
//!
//! Failures along the way (unreadable files, malformed configuration) are
//! logged and yield no result.

use crate::cache::SourceCache;
use crate::config::Settings;
use crate::error::LookupError;
use crate::marker::{find_marker, query_text, read_markers, QueryMarker};
use crate::resolve::PathResolver;
use crate::span::Span;
use crate::syntax::{parse_source, BindingKind, ParsedSource};
use crate::workspace::{absolutize, Workspace};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// An import binding that refers to a consumer file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImport {
    /// Absolute path of the imported consumer file.
    pub path: PathBuf,
    /// Name bound in the importing file.
    pub local_name: String,
    /// How the name is bound.
    pub kind: BindingKind,
}

/// A query found for a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMatch {
    /// The marker name.
    pub name: String,
    /// The query-definition file.
    pub definition_file: PathBuf,
    /// Byte offset of the marker in `definition_file`.
    pub offset: usize,
    /// Text from the marker up to the next marker or end of file.
    pub query_text: String,
}

/// A place in a source file that refers to a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAnnotation {
    /// The marker name.
    pub name: String,
    /// Range in the scanned file to anchor the annotation at.
    pub span: Span,
    /// The query-definition file.
    pub definition_file: PathBuf,
    /// Byte offset of the marker in `definition_file`.
    pub offset: usize,
}

/// Markers of one query-definition file.
struct DefinitionFile {
    path: PathBuf,
    text: String,
    markers: Vec<QueryMarker>,
}

impl DefinitionFile {
    fn lookup(&self, name: &str) -> Option<QueryMatch> {
        let (index, marker) = find_marker(&self.markers, name)?;
        let text = query_text(&self.text, &self.markers, index)?;
        Some(QueryMatch {
            name: marker.name.clone(),
            definition_file: self.path.clone(),
            offset: marker.offset,
            query_text: text.to_string(),
        })
    }
}

/// Locates the query definitions behind generated-code call sites.
///
/// Owns the project-configuration cache (inside the [`PathResolver`]) and the
/// cache of parsed generated modules.
#[derive(Debug, Default)]
pub struct QueryLocator {
    workspace: Workspace,
    resolver: PathResolver,
    generated: SourceCache,
}

impl QueryLocator {
    /// Create a locator for the given workspace.
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            resolver: PathResolver::new(),
            generated: SourceCache::new(),
        }
    }

    /// The workspace layout.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Mutable access to the workspace layout.
    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    /// The current settings.
    pub fn settings(&self) -> &Settings {
        self.workspace.settings()
    }

    /// Replace the settings. Cached generated modules are dropped since their
    /// location depends on the settings.
    pub fn set_settings(&mut self, settings: Settings) {
        self.workspace.set_settings(settings);
        self.generated = SourceCache::new();
    }

    /// Drop cached data owned by a closed document.
    pub fn forget(&self, path: &Path) {
        if self.generated.remove(path) {
            tracing::debug!("Evicted generated module cached for {}", path.display());
        }
    }

    /// Imports of `file` that resolve into the consumer directory.
    pub fn find_consumer_imports(&self, file: &Path, parsed: &ParsedSource) -> Vec<ResolvedImport> {
        let mut found = Vec::new();

        for import in &parsed.imports {
            let Some(resolved) = self.resolver.resolve(&import.specifier, file) else {
                tracing::debug!("Unresolved import {:?} in {}", import.specifier, file.display());
                continue;
            };
            let Some(path) = absolutize(&resolved, file) else {
                continue;
            };
            if !self.workspace.is_consumer_file(&path) {
                continue;
            }

            found.extend(import.bindings.iter().map(|binding| ResolvedImport {
                path: path.clone(),
                local_name: binding.local_name.clone(),
                kind: binding.kind,
            }));
        }

        found
    }

    /// Find the query behind `symbol` as used in `file`.
    pub fn locate_for_symbol(
        &self,
        file: &Path,
        parsed: &ParsedSource,
        symbol: &str,
    ) -> Option<QueryMatch> {
        if self.workspace.is_consumer_file(file) {
            return self.definition_file(file)?.lookup(symbol);
        }

        // Members of namespace imports (`q.getUser`) are not followed, only
        // the namespace binding itself is matched.
        let import = self.import_named(file, parsed, symbol)?;
        self.definition_file(&import.path)?.lookup(symbol)
    }

    /// Every place in `file` that refers to a query.
    ///
    /// In a consumer file these are the exported functions named after a
    /// marker; in an importer, every call of a function named after a marker
    /// of any imported consumer file.
    pub fn locate_all(&self, file: &Path, parsed: &ParsedSource) -> Vec<QueryAnnotation> {
        if self.workspace.is_consumer_file(file) {
            let Some(definitions) = self.definition_file(file) else {
                return Vec::new();
            };
            if definitions.markers.is_empty() {
                return Vec::new();
            }

            return parsed
                .exported_functions()
                .iter()
                .filter_map(|function| {
                    let marker = find_marker(&definitions.markers, &function.name)?.1;
                    Some(QueryAnnotation {
                        name: function.name.clone(),
                        span: function.span,
                        definition_file: definitions.path.clone(),
                        offset: marker.offset,
                    })
                })
                .collect();
        }

        let mut seen = HashSet::new();
        let definitions: Vec<DefinitionFile> = self
            .find_consumer_imports(file, parsed)
            .into_iter()
            .filter(|import| seen.insert(import.path.clone()))
            .filter_map(|import| self.definition_file(&import.path))
            .filter(|definitions| !definitions.markers.is_empty())
            .collect();

        if definitions.is_empty() {
            return Vec::new();
        }

        parsed
            .calls
            .iter()
            .filter_map(|call| {
                definitions.iter().find_map(|definitions| {
                    let marker = find_marker(&definitions.markers, &call.callee)?.1;
                    Some(QueryAnnotation {
                        name: call.callee.clone(),
                        span: call.span,
                        definition_file: definitions.path.clone(),
                        offset: marker.offset,
                    })
                })
            })
            .collect()
    }

    /// The `<symbol>Query` string constant of the generated module paired
    /// with `consumer`.
    ///
    /// The parsed module is cached under the consumer path until
    /// [`forget`](Self::forget) is called for it.
    pub fn generated_query(&self, consumer: &Path, symbol: &str) -> Option<String> {
        let generated_path = self.workspace.generated_file_for(consumer)?;

        let parsed = self
            .generated
            .get_or_try_insert(consumer, || {
                let text = fs::read_to_string(&generated_path)
                    .map_err(|e| LookupError::io(&generated_path, e))?;
                parse_source(&text, &generated_path)
            })
            .map_err(|e| tracing::warn!("Cannot read generated module: {}", e))
            .ok()?;

        parsed
            .string_constant(&format!("{symbol}Query"))
            .map(str::to_string)
    }

    /// The generated-module constant behind `symbol` as used in `file`.
    pub fn generated_query_for_symbol(
        &self,
        file: &Path,
        parsed: &ParsedSource,
        symbol: &str,
    ) -> Option<String> {
        if self.workspace.is_consumer_file(file) {
            return self.generated_query(file, symbol);
        }

        let import = self.import_named(file, parsed, symbol)?;
        self.generated_query(&import.path, symbol)
    }

    fn import_named(&self, file: &Path, parsed: &ParsedSource, name: &str) -> Option<ResolvedImport> {
        self.find_consumer_imports(file, parsed)
            .into_iter()
            .find(|import| import.local_name == name)
    }

    /// Read the query-definition file paired with a consumer file.
    fn definition_file(&self, consumer: &Path) -> Option<DefinitionFile> {
        let path = self.workspace.query_file_for(consumer)?;
        match read_markers(&path) {
            Ok((text, markers)) => {
                tracing::debug!("Found {} markers in {}", markers.len(), path.display());
                Some(DefinitionFile {
                    path,
                    text,
                    markers,
                })
            }
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }
}
