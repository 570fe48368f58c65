//! Execute command handler.
//!
//! Provides `sqlcLens.goToSqlQuery`, which moves the editor to a query
//! marker. The command takes one structured argument:
//!
//! ```json
//! { "sqlFilePath": "/work/app/db/queries/user.sql", "offset": 38 }
//! ```
//!
//! The server cannot move the cursor itself, so the handler produces a
//! `window/showDocument` request for the main loop to send.

use lsp_types::{Command, ExecuteCommandParams, Range, ShowDocumentParams};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::utils::{path_to_uri, LineIndex};
use crate::vfs::Vfs;

/// Command that jumps to a query definition.
pub const GO_TO_SQL_QUERY: &str = "sqlcLens.goToSqlQuery";

/// Available commands.
pub const COMMANDS: &[&str] = &[GO_TO_SQL_QUERY];

/// Argument of [`GO_TO_SQL_QUERY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoToQueryArgs {
    /// The query-definition file.
    pub sql_file_path: PathBuf,
    /// Byte offset of the query marker.
    pub offset: usize,
}

impl GoToQueryArgs {
    /// Arguments for jumping to `offset` in `sql_file_path`.
    pub fn new(sql_file_path: &Path, offset: usize) -> Self {
        Self {
            sql_file_path: sql_file_path.to_path_buf(),
            offset,
        }
    }

    /// The arguments as a JSON value.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "sqlFilePath": self.sql_file_path,
            "offset": self.offset,
        })
    }
}

/// Errors from executing a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command is not provided by this server.
    #[error("unknown command: {0}")]
    Unknown(String),

    /// The arguments were missing or malformed.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The query file could not be read.
    #[error("{}: {source}", .path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The query file path cannot be expressed as a URI.
    #[error("{} is not an absolute path", .0.display())]
    InvalidPath(PathBuf),
}

/// Build the command that jumps to a query.
pub fn go_to_query_command(title: &str, args: &GoToQueryArgs) -> Command {
    Command {
        title: title.to_string(),
        command: GO_TO_SQL_QUERY.to_string(),
        arguments: Some(vec![args.to_value()]),
    }
}

/// Handle an execute command request.
///
/// Returns the `window/showDocument` parameters that reveal the query.
/// Open documents are read from the VFS, others from disk.
pub fn handle_execute_command(
    params: &ExecuteCommandParams,
    vfs: &Vfs,
) -> Result<ShowDocumentParams, CommandError> {
    if params.command != GO_TO_SQL_QUERY {
        return Err(CommandError::Unknown(params.command.clone()));
    }

    let arg = params
        .arguments
        .first()
        .cloned()
        .ok_or_else(|| CommandError::InvalidArguments("missing argument".to_string()))?;
    let args: GoToQueryArgs =
        serde_json::from_value(arg).map_err(|e| CommandError::InvalidArguments(e.to_string()))?;

    let text = match vfs.get_content(&args.sql_file_path) {
        Some(text) => text,
        None => fs::read_to_string(&args.sql_file_path).map_err(|source| CommandError::Read {
            path: args.sql_file_path.clone(),
            source,
        })?,
    };

    let uri = path_to_uri(&args.sql_file_path)
        .ok_or_else(|| CommandError::InvalidPath(args.sql_file_path.clone()))?;
    let position = LineIndex::new(&text).offset_to_position(args.offset);

    tracing::debug!(
        "Revealing {}:{}:{}",
        args.sql_file_path.display(),
        position.line,
        position.character
    );

    Ok(ShowDocumentParams {
        uri,
        external: Some(false),
        take_focus: Some(true),
        selection: Some(Range::new(position, position)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::Position;
    use tempfile::TempDir;

    fn params(arguments: Vec<serde_json::Value>) -> ExecuteCommandParams {
        ExecuteCommandParams {
            command: GO_TO_SQL_QUERY.to_string(),
            arguments,
            work_done_progress_params: Default::default(),
        }
    }

    #[test]
    fn test_go_to_query_from_disk() {
        let dir = TempDir::new().unwrap();
        let sql = dir.path().join("user.sql");
        let text = "-- name: GetUser\nSELECT * FROM users;\n-- name: ListUsers\nSELECT * FROM users ORDER BY id;";
        fs::write(&sql, text).unwrap();

        let args = GoToQueryArgs::new(&sql, 38);
        let show = handle_execute_command(&params(vec![args.to_value()]), &Vfs::new()).unwrap();

        assert_eq!(show.uri, path_to_uri(&sql).unwrap());
        assert_eq!(show.take_focus, Some(true));
        assert_eq!(
            show.selection,
            Some(Range::new(Position::new(2, 0), Position::new(2, 0)))
        );
    }

    #[test]
    fn test_go_to_query_prefers_open_document() {
        let mut vfs = Vfs::new();
        let sql = PathBuf::from("/not/on/disk/user.sql");
        vfs.open(sql.clone(), "\n\n-- name: GetUser\n", 1);

        let args = GoToQueryArgs::new(&sql, 2);
        let show = handle_execute_command(&params(vec![args.to_value()]), &vfs).unwrap();
        assert_eq!(
            show.selection,
            Some(Range::new(Position::new(2, 0), Position::new(2, 0)))
        );
    }

    #[test]
    fn test_missing_file() {
        let args = GoToQueryArgs::new(Path::new("/nonexistent/queries/user.sql"), 0);
        let err = handle_execute_command(&params(vec![args.to_value()]), &Vfs::new()).unwrap_err();
        assert!(matches!(err, CommandError::Read { .. }));
        assert!(err.to_string().starts_with("/nonexistent/queries/user.sql: "));
    }

    #[test]
    fn test_malformed_arguments() {
        let vfs = Vfs::new();
        assert!(matches!(
            handle_execute_command(&params(vec![]), &vfs),
            Err(CommandError::InvalidArguments(_))
        ));
        // The positional form is not accepted.
        assert!(matches!(
            handle_execute_command(
                &params(vec![serde_json::json!("/a.sql"), serde_json::json!(3)]),
                &vfs
            ),
            Err(CommandError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_unknown_command() {
        let mut p = params(vec![]);
        p.command = "sqlcLens.other".to_string();
        assert!(matches!(
            handle_execute_command(&p, &Vfs::new()),
            Err(CommandError::Unknown(_))
        ));
    }

    #[test]
    fn test_args_shape() {
        let args = GoToQueryArgs::new(Path::new("/w/db/queries/user.sql"), 7);
        assert_eq!(
            args.to_value(),
            serde_json::json!({ "sqlFilePath": "/w/db/queries/user.sql", "offset": 7 })
        );
        let back: GoToQueryArgs = serde_json::from_value(args.to_value()).unwrap();
        assert_eq!(back, args);

        let command = go_to_query_command("Go to SQL query", &args);
        assert_eq!(command.command, GO_TO_SQL_QUERY);
        assert_eq!(command.arguments.unwrap().len(), 1);
    }
}
