//! Workspace layout.
//!
//! Maps files to their workspace root and derives the companion files of a
//! consumer file: the `.sql` query-definition file and the generated module.

use crate::config::Settings;
use crate::resolve::normalize_path;
use std::path::{Path, PathBuf};

/// Source file extensions handled by the server.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts"];

/// Workspace roots plus the directory layout inside each of them.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    roots: Vec<PathBuf>,
    settings: Settings,
}

impl Workspace {
    /// Create a workspace from its root folders.
    pub fn new(roots: Vec<PathBuf>, settings: Settings) -> Self {
        Self { roots, settings }
    }

    /// The current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace the settings.
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// The workspace root folders.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Add a root folder (ignored if already present).
    pub fn add_root(&mut self, root: PathBuf) {
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
    }

    /// Remove a root folder.
    pub fn remove_root(&mut self, root: &Path) {
        self.roots.retain(|r| r != root);
    }

    /// The innermost root containing `path`.
    pub fn root_for(&self, path: &Path) -> Option<&Path> {
        self.roots
            .iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .map(PathBuf::as_path)
    }

    /// `path` relative to its workspace root, together with that root.
    pub fn relative<'a>(&'a self, path: &'a Path) -> Option<(&'a Path, &'a Path)> {
        let root = self.root_for(path)?;
        let relative = path.strip_prefix(root).ok()?;
        Some((root, relative))
    }

    /// Whether `path` is a consumer file (inside the consumer directory).
    pub fn is_consumer_file(&self, path: &Path) -> bool {
        self.relative(path)
            .is_some_and(|(_, relative)| self.settings.is_consumer_path(relative))
    }

    /// The query-definition file paired with a consumer file.
    ///
    /// `<root>/<query dir>/<consumer file stem>.sql`. Returns `None` for files
    /// outside the consumer directory.
    pub fn query_file_for(&self, consumer: &Path) -> Option<PathBuf> {
        let (root, relative) = self.relative(consumer)?;
        if !self.settings.is_consumer_path(relative) {
            return None;
        }
        let stem = consumer.file_stem()?.to_str()?;
        Some(
            root.join(&self.settings.query_directory)
                .join(format!("{stem}.sql")),
        )
    }

    /// The generated module paired with a consumer file.
    ///
    /// `<root>/<generated dir>/<consumer file stem><suffix>.ts`.
    pub fn generated_file_for(&self, consumer: &Path) -> Option<PathBuf> {
        let root = self.root_for(consumer)?;
        let stem = consumer.file_stem()?.to_str()?;
        Some(root.join(&self.settings.generated_directory).join(format!(
            "{stem}{}.ts",
            self.settings.generated_file_suffix
        )))
    }
}

/// Whether the server handles files with this path's extension.
pub fn is_supported_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// Make an import resolution result absolute.
///
/// The resolver hands back the raw specifier when no project configuration
/// exists; relative results are taken relative to the importing file.
pub fn absolutize(resolved: &Path, importing_file: &Path) -> Option<PathBuf> {
    if resolved.is_absolute() {
        return Some(normalize_path(resolved));
    }
    let dir = importing_file.parent()?;
    Some(normalize_path(&dir.join(resolved)))
}
