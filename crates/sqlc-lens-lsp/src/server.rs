//! Main LSP server implementation.

use crate::handlers::execute_command::COMMANDS;
use crate::handlers::utils::uri_to_path;
use crate::main_loop::run_main_loop;
use lsp_server::Connection;
use lsp_types::{
    CodeLensOptions, ExecuteCommandOptions, HoverProviderCapability, InitializeParams, OneOf,
    ServerCapabilities, ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind,
    WorkspaceFoldersServerCapabilities, WorkspaceServerCapabilities,
};
use sqlc_lens_core::{QueryLocator, Settings, Workspace};
use std::path::PathBuf;

/// The LSP server.
pub struct Server {
    /// Connection to the LSP client.
    connection: Connection,
    /// Initialize parameters from client.
    init_params: InitializeParams,
}

impl Server {
    /// Create a new LSP server from a connection.
    pub fn new(connection: Connection, init_params: InitializeParams) -> Self {
        Self {
            connection,
            init_params,
        }
    }

    /// Run the server's main loop.
    ///
    /// Returns whether the client shut the server down cleanly.
    pub fn run(self) -> bool {
        tracing::info!("Starting sqlc-lens language server v{}", crate::VERSION);

        let locator = QueryLocator::new(workspace_from_params(&self.init_params));
        for root in locator.workspace().roots() {
            tracing::info!("Workspace root: {}", root.display());
        }

        let (sender, receiver) = (self.connection.sender, self.connection.receiver);
        let clean = run_main_loop(receiver, sender, locator);

        tracing::info!("Server shutdown complete");
        clean
    }
}

/// Capabilities advertised to the client.
pub fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::FULL)),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        code_lens_provider: Some(CodeLensOptions {
            resolve_provider: Some(false),
        }),
        execute_command_provider: Some(ExecuteCommandOptions {
            commands: COMMANDS.iter().map(ToString::to_string).collect(),
            work_done_progress_options: Default::default(),
        }),
        workspace: Some(WorkspaceServerCapabilities {
            workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                supported: Some(true),
                change_notifications: Some(OneOf::Left(true)),
            }),
            file_operations: None,
        }),
        ..Default::default()
    }
}

/// Server name and version reported to the client.
pub fn server_info() -> ServerInfo {
    ServerInfo {
        name: "sqlc-lens-lsp".to_string(),
        version: Some(crate::VERSION.to_string()),
    }
}

/// Workspace roots and settings from the initialize request.
///
/// Roots come from `workspaceFolders`, falling back to `rootUri`.
pub fn workspace_from_params(params: &InitializeParams) -> Workspace {
    let mut roots: Vec<PathBuf> = params
        .workspace_folders
        .iter()
        .flatten()
        .filter_map(|folder| uri_to_path(&folder.uri))
        .collect();

    if roots.is_empty() {
        #[allow(deprecated)]
        let root_uri = params.root_uri.as_ref();
        roots.extend(root_uri.and_then(uri_to_path));
    }

    let settings = params
        .initialization_options
        .as_ref()
        .and_then(Settings::from_json)
        .unwrap_or_default();

    Workspace::new(roots, settings)
}

/// Start the LSP server using stdio transport.
pub fn start_stdio() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing::info!("Starting LSP server on stdio");

    let (connection, io_threads) = Connection::stdio();

    // Wait for initialize request
    let (id, params) = connection.initialize_start()?;
    let init_params: InitializeParams = serde_json::from_value(params)?;

    let init_result = lsp_types::InitializeResult {
        capabilities: server_capabilities(),
        server_info: Some(server_info()),
    };

    connection.initialize_finish(id, serde_json::to_value(init_result)?)?;

    tracing::info!("LSP initialized successfully");

    let clean = Server::new(connection, init_params).run();

    io_threads.join()?;

    if clean {
        Ok(())
    } else {
        Err("exit notification received before shutdown".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_workspace_from_params() {
        let params: InitializeParams = serde_json::from_value(json!({
            "capabilities": {},
            "rootUri": "file:///ignored",
            "workspaceFolders": [
                { "uri": "file:///work/app", "name": "app" },
                { "uri": "file:///work/lib", "name": "lib" }
            ],
            "initializationOptions": {
                "sqlcLens": { "queryDirectory": "sql" }
            }
        }))
        .unwrap();

        let workspace = workspace_from_params(&params);
        assert_eq!(
            workspace.roots(),
            &[PathBuf::from("/work/app"), PathBuf::from("/work/lib")]
        );
        assert_eq!(workspace.settings().query_directory, PathBuf::from("sql"));
    }

    #[test]
    fn test_workspace_from_root_uri() {
        let params: InitializeParams = serde_json::from_value(json!({
            "capabilities": {},
            "rootUri": "file:///work/app"
        }))
        .unwrap();

        let workspace = workspace_from_params(&params);
        assert_eq!(workspace.roots(), &[PathBuf::from("/work/app")]);
        assert_eq!(workspace.settings(), &Settings::default());
    }

    #[test]
    fn test_capabilities() {
        let capabilities = server_capabilities();
        assert!(capabilities.hover_provider.is_some());
        assert_eq!(
            capabilities.execute_command_provider.unwrap().commands,
            vec!["sqlcLens.goToSqlQuery".to_string()]
        );
    }
}
