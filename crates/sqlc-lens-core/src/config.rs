//! User settings.
//!
//! Settings arrive from the editor as JSON, either in the LSP
//! `initializationOptions` or in a `workspace/didChangeConfiguration`
//! notification. Both flat objects and objects nested under the
//! [`SETTINGS_SECTION`] key are accepted. The section name of the older
//! VS Code extension is accepted as an alias.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the settings section in the client configuration.
pub const SETTINGS_SECTION: &str = "sqlcLens";

/// Section name used by the VS Code extension this server replaces.
pub const LEGACY_SETTINGS_SECTION: &str = "sqlcTypeScriptQueryPreview";

/// Directory layout of a sqlc TypeScript project.
///
/// All directories are relative to the workspace root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Root containing the `.sql` query-definition files.
    #[serde(alias = "sqlcDirectory")]
    pub query_directory: PathBuf,
    /// Root containing the modules generated by sqlc.
    #[serde(alias = "generatedSqlcDirectory")]
    pub generated_directory: PathBuf,
    /// Root containing hand-written files that wrap the generated code.
    #[serde(alias = "usingGeneratedSqlcDirectory")]
    pub consumer_directory: PathBuf,
    /// Suffix appended to a consumer file's stem to find its generated module.
    pub generated_file_suffix: String,
    /// Show the generated `<name>Query` constant when no marker matches.
    pub hover_fallback_to_generated: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            query_directory: PathBuf::from("db/queries"),
            generated_directory: PathBuf::from("src/generated/sqlc"),
            consumer_directory: PathBuf::from("src/repositories"),
            generated_file_suffix: "_sql".to_string(),
            hover_fallback_to_generated: false,
        }
    }
}

impl Settings {
    /// Read settings from a client-supplied JSON value.
    ///
    /// Returns `None` when the value does not look like a settings object.
    /// Unknown keys are ignored and missing keys keep their defaults.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let section = value
            .get(SETTINGS_SECTION)
            .or_else(|| value.get(LEGACY_SETTINGS_SECTION))
            .unwrap_or(value);

        if !section.is_object() {
            return None;
        }

        match serde_json::from_value(section.clone()) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!("Ignoring invalid settings: {}", e);
                None
            }
        }
    }

    /// Whether a workspace-relative path lies inside the consumer directory.
    pub fn is_consumer_path(&self, relative: &Path) -> bool {
        relative.starts_with(&self.consumer_directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.query_directory, PathBuf::from("db/queries"));
        assert_eq!(settings.generated_directory, PathBuf::from("src/generated/sqlc"));
        assert_eq!(settings.consumer_directory, PathBuf::from("src/repositories"));
        assert_eq!(settings.generated_file_suffix, "_sql");
        assert!(!settings.hover_fallback_to_generated);
    }

    #[test]
    fn test_from_json_section() {
        let value = json!({
            "sqlcLens": {
                "queryDirectory": "sql",
                "generatedFileSuffix": ".gen"
            }
        });
        let settings = Settings::from_json(&value).unwrap();
        assert_eq!(settings.query_directory, PathBuf::from("sql"));
        assert_eq!(settings.generated_file_suffix, ".gen");
        // untouched keys keep defaults
        assert_eq!(settings.consumer_directory, PathBuf::from("src/repositories"));
    }

    #[test]
    fn test_from_json_legacy_keys() {
        let value = json!({
            "sqlcTypeScriptQueryPreview": {
                "sqlcDirectory": "queries",
                "usingGeneratedSqlcDirectory": "src/repo"
            }
        });
        let settings = Settings::from_json(&value).unwrap();
        assert_eq!(settings.query_directory, PathBuf::from("queries"));
        assert_eq!(settings.consumer_directory, PathBuf::from("src/repo"));
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(Settings::from_json(&json!(null)).is_none());
        assert!(Settings::from_json(&json!("db")).is_none());
    }

    #[test]
    fn test_is_consumer_path_is_component_wise() {
        let settings = Settings::default();
        assert!(settings.is_consumer_path(Path::new("src/repositories/user.ts")));
        assert!(!settings.is_consumer_path(Path::new("src/repositories-old/user.ts")));
        assert!(!settings.is_consumer_path(Path::new("src/services/user.ts")));
    }
}
