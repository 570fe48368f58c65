//! `tsconfig.json` loading.
//!
//! Only the options that influence module resolution are read:
//! `compilerOptions.baseUrl` and `compilerOptions.paths`, merged along the
//! `extends` chain. The file format is JSON with comments and trailing
//! commas, which are stripped before handing the text to `serde_json`.

use crate::error::LookupError;
use crate::resolve::normalize_path;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name searched for when locating a project configuration.
pub const CONFIG_FILE_NAME: &str = "tsconfig.json";

/// Upper bound on `extends` chains, guards against cycles.
const MAX_EXTENDS_DEPTH: usize = 16;

/// Module-resolution settings of a TypeScript project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    /// The `tsconfig.json` this configuration was loaded from.
    pub config_path: PathBuf,
    /// Absolute `baseUrl`, if set anywhere in the `extends` chain.
    pub base_url: Option<PathBuf>,
    /// `paths` patterns with their substitutions.
    pub paths: Vec<PathAlias>,
    /// Directory `paths` substitutions are relative to.
    pub paths_base: PathBuf,
}

/// One entry of `compilerOptions.paths`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAlias {
    /// The pattern, e.g. `@/*`.
    pub pattern: String,
    /// Substitutions, e.g. `["./src/*"]`, in priority order.
    pub substitutions: Vec<String>,
}

impl PathAlias {
    /// Match a specifier against this pattern.
    ///
    /// Returns the text captured by `*` (empty for exact patterns).
    pub fn matches<'a>(&self, specifier: &'a str) -> Option<&'a str> {
        match self.pattern.split_once('*') {
            Some((prefix, suffix)) => {
                if specifier.len() >= prefix.len() + suffix.len()
                    && specifier.starts_with(prefix)
                    && specifier.ends_with(suffix)
                {
                    Some(&specifier[prefix.len()..specifier.len() - suffix.len()])
                } else {
                    None
                }
            }
            None => (self.pattern == specifier).then_some(""),
        }
    }

    /// Length of the literal prefix, used to pick the most specific pattern.
    pub fn prefix_len(&self) -> usize {
        self.pattern.find('*').unwrap_or(self.pattern.len())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    extends: Option<Extends>,
    #[serde(default)]
    compiler_options: RawCompilerOptions,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Extends {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCompilerOptions {
    base_url: Option<String>,
    paths: Option<HashMap<String, Vec<String>>>,
}

/// Walk upward from `start` looking for a `tsconfig.json`.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Load a project configuration, following its `extends` chain.
pub fn load_config(config_path: &Path) -> Result<ProjectConfig, LookupError> {
    let mut config = ProjectConfig {
        config_path: config_path.to_path_buf(),
        base_url: None,
        paths: Vec::new(),
        paths_base: parent_dir(config_path),
    };
    let mut paths_set = false;
    merge_into(config_path, &mut config, &mut paths_set, 0)?;
    Ok(config)
}

/// Merge `path` and everything it extends into `config`.
///
/// Options already present in `config` come from a file further down the
/// chain and take precedence, so the chain is applied child first.
fn merge_into(
    path: &Path,
    config: &mut ProjectConfig,
    paths_set: &mut bool,
    depth: usize,
) -> Result<(), LookupError> {
    if depth > MAX_EXTENDS_DEPTH {
        return Err(LookupError::ConfigParse {
            path: path.to_path_buf(),
            message: "extends chain is too deep".to_string(),
        });
    }

    let text = fs::read_to_string(path).map_err(|e| LookupError::io(path, e))?;
    let raw: RawConfig =
        serde_json::from_str(&strip_jsonc(&text)).map_err(|e| LookupError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let dir = parent_dir(path);

    if config.base_url.is_none() {
        if let Some(base_url) = &raw.compiler_options.base_url {
            config.base_url = Some(normalize_path(&dir.join(base_url)));
        }
    }

    if !*paths_set {
        if let Some(paths) = raw.compiler_options.paths {
            config.paths = paths
                .into_iter()
                .map(|(pattern, substitutions)| PathAlias {
                    pattern,
                    substitutions,
                })
                .collect();
            config.paths_base = dir.clone();
            *paths_set = true;
        }
    }

    let parents = match raw.extends {
        None => Vec::new(),
        Some(Extends::One(parent)) => vec![parent],
        Some(Extends::Many(parents)) => parents,
    };

    // Later entries of an `extends` array override earlier ones.
    for parent in parents.iter().rev() {
        match resolve_extends(&dir, parent) {
            Some(parent_path) => merge_into(&parent_path, config, paths_set, depth + 1)?,
            None => tracing::debug!("Cannot find extended config {} from {}", parent, path.display()),
        }
    }

    // A baseUrl makes `paths` relative to it.
    if let Some(base_url) = &config.base_url {
        config.paths_base = base_url.clone();
    }

    Ok(())
}

/// Locate the file named by an `extends` entry.
fn resolve_extends(dir: &Path, target: &str) -> Option<PathBuf> {
    let with_json = |p: PathBuf| {
        if p.extension().is_some_and(|ext| ext == "json") {
            p
        } else {
            let mut s = p.into_os_string();
            s.push(".json");
            PathBuf::from(s)
        }
    };

    if target.starts_with('.') || Path::new(target).is_absolute() {
        let candidate = with_json(normalize_path(&dir.join(target)));
        return candidate.is_file().then_some(candidate);
    }

    // Package reference: look in node_modules of every ancestor.
    dir.ancestors().find_map(|ancestor| {
        let base = ancestor.join("node_modules").join(target);
        let candidates = [with_json(base.clone()), base.join(CONFIG_FILE_NAME)];
        candidates.into_iter().find(|c| c.is_file())
    })
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map_or_else(PathBuf::new, Path::to_path_buf)
}

/// Strip `//` and `/* */` comments and trailing commas from JSON text.
///
/// String literals are copied through untouched.
pub fn strip_jsonc(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push(c);
                while let Some(c) = chars.next() {
                    out.push(c);
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    if c == '\n' {
                        out.push('\n');
                    }
                    prev = c;
                }
            }
            '}' | ']' => {
                // Trailing comma: the last significant character before a closer.
                if let Some((i, ',')) = out.char_indices().rev().find(|(_, c)| !c.is_whitespace()) {
                    out.remove(i);
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_strip_jsonc() {
        let text = r#"{
  // line comment
  "a": "http://not-a-comment", /* block
  comment */ "b": [1, 2,],
  "c": 3, // trailing
}"#;
        let stripped = strip_jsonc(text);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["a"], "http://not-a-comment");
        assert_eq!(value["b"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_strip_jsonc_keeps_escaped_quotes() {
        let stripped = strip_jsonc(r#"{"a": "say \"hi\" // there"}"#);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["a"], "say \"hi\" // there");
    }

    #[test]
    fn test_alias_matches() {
        let alias = PathAlias {
            pattern: "@/*".to_string(),
            substitutions: vec!["./src/*".to_string()],
        };
        assert_eq!(alias.matches("@/repositories/user"), Some("repositories/user"));
        assert_eq!(alias.matches("lodash"), None);
        assert_eq!(alias.prefix_len(), 2);

        let exact = PathAlias {
            pattern: "db".to_string(),
            substitutions: vec!["./src/db/index.ts".to_string()],
        };
        assert_eq!(exact.matches("db"), Some(""));
        assert_eq!(exact.matches("db2"), None);
    }

    #[test]
    fn test_load_config_with_extends() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(
            root.join("tsconfig.base.json"),
            r#"{ "compilerOptions": { "baseUrl": ".", "paths": { "~/*": ["lib/*"] } } }"#,
        )
        .unwrap();
        fs::write(
            root.join("tsconfig.json"),
            r#"{
  // project config
  "extends": "./tsconfig.base",
  "compilerOptions": { "paths": { "@/*": ["src/*"], } },
}"#,
        )
        .unwrap();

        let config = load_config(&root.join("tsconfig.json")).unwrap();
        assert_eq!(config.base_url.as_deref(), Some(root));
        assert_eq!(config.paths.len(), 1);
        assert_eq!(config.paths[0].pattern, "@/*");
        assert_eq!(config.paths_base, root);
    }

    #[test]
    fn test_load_config_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tsconfig.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(LookupError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("src/repositories");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("tsconfig.json"), "{}").unwrap();

        assert_eq!(
            find_config_file(&nested),
            Some(dir.path().join("tsconfig.json"))
        );
    }
}
