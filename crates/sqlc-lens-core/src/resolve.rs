//! Import specifier resolution.
//!
//! Resolves the module specifier of an `import` declaration to a file on
//! disk, the way the TypeScript compiler would for a project using
//! `baseUrl`/`paths` aliases. Parsed project configurations are memoized per
//! importing file for the lifetime of the resolver.

use crate::tsconfig::{find_config_file, load_config, ProjectConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Extensions tried, in order, when a specifier omits one.
const EXTENSIONS: &[&str] = &["ts", "tsx", "d.ts", "mts", "cts", "js", "jsx"];

/// Resolves import specifiers against the nearest `tsconfig.json`.
#[derive(Debug, Default)]
pub struct PathResolver {
    /// Parsed configurations keyed by the importing file.
    configs: Mutex<HashMap<PathBuf, Arc<ProjectConfig>>>,
    /// Number of configuration files parsed so far.
    loads: AtomicUsize,
}

impl PathResolver {
    /// Create a resolver with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `specifier` as imported from `from_file`.
    ///
    /// Without a project configuration the specifier is returned unchanged,
    /// leaving it to the caller to interpret it relative to `from_file`.
    /// Returns `None` when a configuration exists but no file matches.
    pub fn resolve(&self, specifier: &str, from_file: &Path) -> Option<PathBuf> {
        let Some(config) = self.config_for(from_file) else {
            return Some(PathBuf::from(specifier));
        };

        let resolved = resolve_with_config(specifier, from_file, &config);
        tracing::debug!(
            "Resolved {:?} from {} to {:?} using {}",
            specifier,
            from_file.display(),
            resolved,
            config.config_path.display()
        );
        resolved
    }

    /// Number of configuration files parsed so far.
    pub fn config_loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Cached configuration for `from_file`, loading it on first use.
    fn config_for(&self, from_file: &Path) -> Option<Arc<ProjectConfig>> {
        if let Some(config) = self.configs.lock().get(from_file) {
            return Some(Arc::clone(config));
        }

        let config_path = find_config_file(from_file.parent()?)?;
        self.loads.fetch_add(1, Ordering::Relaxed);

        match load_config(&config_path) {
            Ok(config) => {
                let config = Arc::new(config);
                self.configs
                    .lock()
                    .insert(from_file.to_path_buf(), Arc::clone(&config));
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Falling back to raw import specifiers: {}", e);
                None
            }
        }
    }
}

/// Whether a specifier is relative to the importing file.
fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

fn resolve_with_config(specifier: &str, from_file: &Path, config: &ProjectConfig) -> Option<PathBuf> {
    if is_relative(specifier) || Path::new(specifier).is_absolute() {
        let dir = from_file.parent()?;
        return try_module(&dir.join(specifier));
    }

    // The pattern with the longest literal prefix wins.
    let alias = config
        .paths
        .iter()
        .filter_map(|alias| alias.matches(specifier).map(|star| (alias, star)))
        .max_by_key(|(alias, _)| alias.prefix_len());

    if let Some((alias, star)) = alias {
        for substitution in &alias.substitutions {
            let candidate = config.paths_base.join(substitution.replacen('*', star, 1));
            if let Some(found) = try_module(&candidate) {
                return Some(found);
            }
        }
    }

    config
        .base_url
        .as_ref()
        .and_then(|base_url| try_module(&base_url.join(specifier)))
}

/// Try `candidate` as a file, then as a directory with an index module.
fn try_module(candidate: &Path) -> Option<PathBuf> {
    let candidate = normalize_path(candidate);
    try_file(&candidate).or_else(|| try_index(&candidate))
}

fn try_file(candidate: &Path) -> Option<PathBuf> {
    if candidate.is_file() && has_source_extension(candidate) {
        return Some(candidate.to_path_buf());
    }

    // `./user.js` in TypeScript sources refers to `./user.ts`.
    if let Some(ext @ ("js" | "jsx" | "mjs" | "cjs")) = candidate.extension().and_then(|e| e.to_str()) {
        let replacements: &[&str] = match ext {
            "mjs" => &["mts"],
            "cjs" => &["cts"],
            _ => &["ts", "tsx"],
        };
        for replacement in replacements {
            let rewritten = candidate.with_extension(replacement);
            if rewritten.is_file() {
                return Some(rewritten);
            }
        }
    }

    EXTENSIONS
        .iter()
        .map(|ext| with_appended_extension(candidate, ext))
        .find(|p| p.is_file())
}

fn try_index(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("index.{ext}")))
        .find(|p| p.is_file())
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| EXTENSIONS.contains(&ext))
}

fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// Lexically normalize a path, removing `.` and resolving `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/repositories")).unwrap();
        fs::create_dir_all(root.join("src/controllers")).unwrap();
        fs::create_dir_all(root.join("src/lib/db")).unwrap();
        fs::write(root.join("src/repositories/user.ts"), "").unwrap();
        fs::write(root.join("src/lib/db/index.ts"), "").unwrap();
        fs::write(root.join("src/controllers/user.ts"), "").unwrap();
        fs::write(
            root.join("tsconfig.json"),
            r#"{ "compilerOptions": { "baseUrl": ".", "paths": { "@/*": ["src/*"] } } }"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/b/./c/../d.ts")),
            PathBuf::from("/a/b/d.ts")
        );
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_resolve_alias() {
        let dir = project();
        let root = dir.path();
        let resolver = PathResolver::new();
        let from = root.join("src/controllers/user.ts");

        assert_eq!(
            resolver.resolve("@/repositories/user", &from),
            Some(root.join("src/repositories/user.ts"))
        );
    }

    #[test]
    fn test_resolve_relative_and_index() {
        let dir = project();
        let root = dir.path();
        let resolver = PathResolver::new();
        let from = root.join("src/controllers/user.ts");

        assert_eq!(
            resolver.resolve("../repositories/user", &from),
            Some(root.join("src/repositories/user.ts"))
        );
        assert_eq!(
            resolver.resolve("../repositories/user.js", &from),
            Some(root.join("src/repositories/user.ts"))
        );
        assert_eq!(
            resolver.resolve("@/lib/db", &from),
            Some(root.join("src/lib/db/index.ts"))
        );
    }

    #[test]
    fn test_resolve_base_url() {
        let dir = project();
        let root = dir.path();
        let resolver = PathResolver::new();
        let from = root.join("src/controllers/user.ts");

        assert_eq!(
            resolver.resolve("src/repositories/user", &from),
            Some(root.join("src/repositories/user.ts"))
        );
    }

    #[test]
    fn test_resolve_unknown_module() {
        let dir = project();
        let resolver = PathResolver::new();
        let from = dir.path().join("src/controllers/user.ts");
        assert_eq!(resolver.resolve("lodash", &from), None);
        assert_eq!(resolver.resolve("@/missing/thing", &from), None);
    }

    #[test]
    fn test_resolve_is_memoized() {
        let dir = project();
        let root = dir.path();
        let resolver = PathResolver::new();
        let from = root.join("src/controllers/user.ts");

        let first = resolver.resolve("@/repositories/user", &from);
        let second = resolver.resolve("@/repositories/user", &from);
        assert_eq!(first, second);
        assert_eq!(resolver.config_loads(), 1);
    }

    #[test]
    fn test_resolve_without_config_returns_specifier() {
        let dir = TempDir::new().unwrap();
        let resolver = PathResolver::new();
        let from = dir.path().join("a/b.ts");
        // No tsconfig.json anywhere under the temp dir; the walk may still
        // find one above it on the host, so only check the common case.
        if find_config_file(dir.path()).is_none() {
            assert_eq!(
                resolver.resolve("./c", &from),
                Some(PathBuf::from("./c"))
            );
        }
    }

    #[test]
    fn test_malformed_config_falls_back() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tsconfig.json"), "{ oops").unwrap();
        let resolver = PathResolver::new();
        let from = dir.path().join("src/a.ts");

        assert_eq!(resolver.resolve("@/x", &from), Some(PathBuf::from("@/x")));
        // Failures are not cached, so the next call tries again.
        resolver.resolve("@/x", &from);
        assert_eq!(resolver.config_loads(), 2);
    }
}
