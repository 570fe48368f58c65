//! Main event loop for the LSP server.
//!
//! Messages are handled one at a time on the loop thread:
//! - Notifications update the VFS, settings and workspace folders
//! - Requests are answered against the current documents
//! - Responses complete requests the server sent to the client
//!
//! Before a request is handled, messages already queued behind it are
//! pulled in so that a `$/cancelRequest` for it is seen in time.

use crate::handlers::code_lens::handle_code_lens;
use crate::handlers::execute_command::{handle_execute_command, CommandError};
use crate::handlers::hover::handle_hover;
use crate::handlers::utils::uri_to_path;
use crate::server::{server_capabilities, server_info, workspace_from_params};
use crate::vfs::Vfs;
use crossbeam_channel::{Receiver, Sender};
use lsp_types::notification::{
    Cancel, DidChangeConfiguration, DidChangeTextDocument, DidChangeWorkspaceFolders,
    DidCloseTextDocument, DidOpenTextDocument, Exit, Initialized, Notification, ShowMessage,
};
use lsp_types::request::{
    CodeLensRequest, ExecuteCommand, HoverRequest, Initialize, Request, ShowDocument, Shutdown,
};
use lsp_types::{
    CancelParams, CodeLensParams, ExecuteCommandParams, HoverParams, InitializeParams,
    InitializeResult, MessageType, NumberOrString, ShowDocumentParams, ShowDocumentResult,
    ShowMessageParams, Uri,
};
use parking_lot::RwLock;
use sqlc_lens_core::{is_supported_source, ParsedSource, QueryLocator, Settings};
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

/// Prefix of the message shown when the jump command fails.
const OPEN_FAILED: &str = "Failed to open SQL file";

/// Most `window/showDocument` requests tracked while awaiting a response.
const MAX_PENDING_SHOW_DOCUMENT: usize = 32;

/// LSP message types.
#[derive(Debug)]
pub enum Message {
    /// Request from client (expects response).
    Request(lsp_server::Request),
    /// Notification from client (no response).
    Notification(lsp_server::Notification),
    /// Response from client (for server-initiated requests).
    Response(lsp_server::Response),
}

impl From<lsp_server::Message> for Message {
    fn from(msg: lsp_server::Message) -> Self {
        match msg {
            lsp_server::Message::Request(req) => Self::Request(req),
            lsp_server::Message::Notification(notif) => Self::Notification(notif),
            lsp_server::Message::Response(resp) => Self::Response(resp),
        }
    }
}

/// State managed by the main loop.
pub struct MainLoopState {
    /// Virtual file system for open documents.
    pub vfs: Arc<RwLock<Vfs>>,
    /// Query locator with its caches.
    pub locator: QueryLocator,
    /// Sender for outgoing LSP messages.
    pub sender: Sender<lsp_server::Message>,
    /// Whether shutdown was requested.
    pub shutdown_requested: bool,
    /// Whether the exit notification was received.
    pub exit_requested: bool,
    /// Requests the client cancelled before they were handled.
    cancelled: HashSet<lsp_server::RequestId>,
    /// `window/showDocument` requests awaiting a response, oldest first.
    pending_show_document: VecDeque<(lsp_server::RequestId, PathBuf)>,
    /// Counter for server-initiated request ids.
    next_request_id: u64,
}

impl MainLoopState {
    /// Create a new main loop state.
    pub fn new(sender: Sender<lsp_server::Message>, locator: QueryLocator) -> Self {
        Self {
            vfs: Arc::new(RwLock::new(Vfs::new())),
            locator,
            sender,
            shutdown_requested: false,
            exit_requested: false,
            cancelled: HashSet::new(),
            pending_show_document: VecDeque::new(),
            next_request_id: 0,
        }
    }

    /// Get path, text and cached parse result for a URI.
    ///
    /// Only open TypeScript documents are served.
    fn get_document_data(&self, uri: &Uri) -> Option<(PathBuf, String, Arc<ParsedSource>)> {
        let path = uri_to_path(uri)?;
        if !is_supported_source(&path) {
            return None;
        }
        let (text, parsed) = self.vfs.write().get_document_data(&path)?;
        Some((path, text, parsed))
    }

    /// Record cancellations queued behind `current` that target pending requests.
    pub fn note_cancellations(&mut self, current: &lsp_server::RequestId, queue: &VecDeque<Message>) {
        let mut pending: HashSet<&lsp_server::RequestId> = HashSet::new();
        pending.insert(current);

        for msg in queue {
            match msg {
                Message::Request(req) => {
                    pending.insert(&req.id);
                }
                Message::Notification(notif) if notif.method == Cancel::METHOD => {
                    if let Some(id) = cancelled_id(notif) {
                        if pending.contains(&id) {
                            self.cancelled.insert(id);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Handle an LSP message.
    pub fn handle_message(&mut self, msg: Message) {
        match msg {
            Message::Request(req) => self.handle_request(req),
            Message::Notification(notif) => self.handle_notification(notif),
            Message::Response(resp) => self.handle_response(resp),
        }
    }

    /// Handle an LSP request (expects response).
    fn handle_request(&mut self, req: lsp_server::Request) {
        let id = req.id.clone();

        if self.cancelled.remove(&id) {
            tracing::debug!("Request {} cancelled before it was handled", id);
            let response = lsp_server::Response::new_err(
                id,
                lsp_server::ErrorCode::RequestCanceled as i32,
                "request cancelled".to_string(),
            );
            self.send(lsp_server::Message::Response(response));
            return;
        }

        let result = match req.method.as_str() {
            Initialize::METHOD => self.handle_initialize(req),
            Shutdown::METHOD => {
                self.shutdown_requested = true;
                self.pending_show_document.clear();
                Ok(serde_json::Value::Null)
            }
            HoverRequest::METHOD => self.handle_hover_request(req),
            CodeLensRequest::METHOD => self.handle_code_lens_request(req),
            ExecuteCommand::METHOD => self.handle_execute_command_request(req),
            _ => {
                tracing::warn!("Unhandled request: {}", req.method);
                Err(format!("Unhandled request: {}", req.method))
            }
        };

        let response = match result {
            Ok(value) => lsp_server::Response::new_ok(id, value),
            Err(msg) => {
                // Use MethodNotFound only for truly unknown methods,
                // InternalError for handler failures
                let error_code = if msg.starts_with("Unhandled request") {
                    lsp_server::ErrorCode::MethodNotFound
                } else {
                    lsp_server::ErrorCode::InternalError
                };
                lsp_server::Response::new_err(id, error_code as i32, msg)
            }
        };

        self.send(lsp_server::Message::Response(response));
    }

    /// Handle the initialize request.
    ///
    /// Normally consumed by the handshake in [`crate::start_stdio`]; handled
    /// here for clients driving the loop directly.
    fn handle_initialize(&mut self, req: lsp_server::Request) -> Result<serde_json::Value, String> {
        let params: InitializeParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let workspace = workspace_from_params(&params);
        self.locator.set_settings(workspace.settings().clone());
        for root in workspace.roots() {
            self.locator.workspace_mut().add_root(root.clone());
        }

        let result = InitializeResult {
            capabilities: server_capabilities(),
            server_info: Some(server_info()),
        };

        serde_json::to_value(result).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/hover request.
    fn handle_hover_request(&self, req: lsp_server::Request) -> Result<serde_json::Value, String> {
        let params: HoverParams = serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document_position_params.text_document.uri;
        let Some((path, text, parsed)) = self.get_document_data(uri) else {
            return Ok(serde_json::Value::Null);
        };

        let response = handle_hover(&params, &text, &path, &parsed, &self.locator);

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the textDocument/codeLens request.
    fn handle_code_lens_request(
        &self,
        req: lsp_server::Request,
    ) -> Result<serde_json::Value, String> {
        let params: CodeLensParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let uri = &params.text_document.uri;
        let Some((path, text, parsed)) = self.get_document_data(uri) else {
            return Ok(serde_json::Value::Null);
        };

        let response = handle_code_lens(&params, &text, &path, &parsed, &self.locator);

        serde_json::to_value(response).map_err(|e| e.to_string())
    }

    /// Handle the workspace/executeCommand request.
    ///
    /// The request itself always succeeds for known commands; failures to
    /// open the query file are shown to the user instead.
    fn handle_execute_command_request(
        &mut self,
        req: lsp_server::Request,
    ) -> Result<serde_json::Value, String> {
        let params: ExecuteCommandParams =
            serde_json::from_value(req.params).map_err(|e| e.to_string())?;

        let result = handle_execute_command(&params, &self.vfs.read());
        match result {
            Ok(show) => self.show_document(show),
            Err(CommandError::Unknown(command)) => {
                return Err(format!("Unknown command: {command}"));
            }
            Err(e) => self.show_error(&format!("{OPEN_FAILED}: {e}")),
        }

        Ok(serde_json::Value::Null)
    }

    /// Handle a response to a server-initiated request.
    fn handle_response(&mut self, resp: lsp_server::Response) {
        let Some(path) = self.take_pending_show_document(&resp.id) else {
            tracing::debug!("Ignoring response to unknown request {}", resp.id);
            return;
        };

        if let Some(error) = resp.error {
            self.show_error(&format!("{OPEN_FAILED}: {}: {}", path.display(), error.message));
            return;
        }

        let success = resp
            .result
            .and_then(|value| serde_json::from_value::<ShowDocumentResult>(value).ok())
            .is_some_and(|result| result.success);
        if !success {
            self.show_error(&format!("{OPEN_FAILED}: {}", path.display()));
        }
    }

    /// Handle an LSP notification (no response expected).
    fn handle_notification(&mut self, notif: lsp_server::Notification) {
        match notif.method.as_str() {
            DidOpenTextDocument::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidOpenTextDocumentParams>(notif.params)
                {
                    self.on_did_open(params);
                }
            }
            DidChangeTextDocument::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidChangeTextDocumentParams>(notif.params)
                {
                    self.on_did_change(params);
                }
            }
            DidCloseTextDocument::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidCloseTextDocumentParams>(notif.params)
                {
                    self.on_did_close(params);
                }
            }
            DidChangeConfiguration::METHOD => {
                if let Ok(params) =
                    serde_json::from_value::<lsp_types::DidChangeConfigurationParams>(notif.params)
                {
                    self.on_did_change_configuration(params);
                }
            }
            DidChangeWorkspaceFolders::METHOD => {
                if let Ok(params) = serde_json::from_value::<
                    lsp_types::DidChangeWorkspaceFoldersParams,
                >(notif.params)
                {
                    self.on_did_change_workspace_folders(params);
                }
            }
            Cancel::METHOD => {
                // Cancellations are picked up ahead of the request they target.
                tracing::debug!("Cancel notification: {}", notif.params);
            }
            Initialized::METHOD => {
                tracing::info!("Client initialized");
            }
            Exit::METHOD => {
                tracing::info!("Exit notification received");
                self.exit_requested = true;
            }
            _ => {
                tracing::debug!("Unhandled notification: {}", notif.method);
            }
        }
    }

    /// Handle textDocument/didOpen notification.
    fn on_did_open(&mut self, params: lsp_types::DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;

        tracing::info!("Document opened: {}", uri.as_str());

        if let Some(path) = uri_to_path(&uri) {
            self.vfs
                .write()
                .open(path, &params.text_document.text, params.text_document.version);
        }
    }

    /// Handle textDocument/didChange notification.
    fn on_did_change(&mut self, params: lsp_types::DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // For full sync, take the last change (which is the full content)
        if let Some(change) = params.content_changes.into_iter().last() {
            tracing::debug!("Document changed: {}", uri.as_str());

            if let Some(path) = uri_to_path(&uri) {
                self.vfs.write().update(&path, &change.text, version);
            }
        }
    }

    /// Handle textDocument/didClose notification.
    fn on_did_close(&mut self, params: lsp_types::DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;

        tracing::info!("Document closed: {}", uri.as_str());

        if let Some(path) = uri_to_path(&uri) {
            self.vfs.write().close(&path);
            self.locator.forget(&path);
        }
    }

    /// Handle workspace/didChangeConfiguration notification.
    fn on_did_change_configuration(&mut self, params: lsp_types::DidChangeConfigurationParams) {
        match Settings::from_json(&params.settings) {
            Some(settings) => {
                tracing::info!("Settings changed: {:?}", settings);
                self.locator.set_settings(settings);
            }
            None => tracing::debug!("Configuration change without settings"),
        }
    }

    /// Handle workspace/didChangeWorkspaceFolders notification.
    fn on_did_change_workspace_folders(
        &mut self,
        params: lsp_types::DidChangeWorkspaceFoldersParams,
    ) {
        let workspace = self.locator.workspace_mut();
        for folder in &params.event.removed {
            if let Some(path) = uri_to_path(&folder.uri) {
                tracing::info!("Workspace folder removed: {}", path.display());
                workspace.remove_root(&path);
            }
        }
        for folder in &params.event.added {
            if let Some(path) = uri_to_path(&folder.uri) {
                tracing::info!("Workspace folder added: {}", path.display());
                workspace.add_root(path);
            }
        }
    }

    /// Ask the client to reveal a location.
    fn show_document(&mut self, params: ShowDocumentParams) {
        self.next_request_id += 1;
        let id = lsp_server::RequestId::from(format!("sqlc-lens/showDocument/{}", self.next_request_id));

        if let Some(path) = uri_to_path(&params.uri) {
            if self.pending_show_document.len() == MAX_PENDING_SHOW_DOCUMENT {
                if let Some((stale, _)) = self.pending_show_document.pop_front() {
                    tracing::debug!("No response to {}, no longer tracked", stale);
                }
            }
            self.pending_show_document.push_back((id.clone(), path));
        }

        let request = lsp_server::Request::new(id, ShowDocument::METHOD.to_string(), params);
        self.send(lsp_server::Message::Request(request));
    }

    /// Stop tracking a `window/showDocument` request, returning its target.
    fn take_pending_show_document(&mut self, id: &lsp_server::RequestId) -> Option<PathBuf> {
        let index = self
            .pending_show_document
            .iter()
            .position(|(pending, _)| pending == id)?;
        self.pending_show_document
            .remove(index)
            .map(|(_, path)| path)
    }

    /// Show an error message to the user.
    fn show_error(&self, message: &str) {
        tracing::warn!("{}", message);

        let params = ShowMessageParams {
            typ: MessageType::ERROR,
            message: message.to_string(),
        };
        let notif = lsp_server::Notification::new(ShowMessage::METHOD.to_string(), params);
        self.send(lsp_server::Message::Notification(notif));
    }

    /// Send a message to the client.
    fn send(&self, msg: lsp_server::Message) {
        if let Err(e) = self.sender.send(msg) {
            tracing::error!("Failed to send message: {}", e);
        }
    }
}

/// The request id named by a `$/cancelRequest` notification.
fn cancelled_id(notif: &lsp_server::Notification) -> Option<lsp_server::RequestId> {
    let params: CancelParams = serde_json::from_value(notif.params.clone()).ok()?;
    Some(match params.id {
        NumberOrString::Number(n) => lsp_server::RequestId::from(n),
        NumberOrString::String(s) => lsp_server::RequestId::from(s),
    })
}

/// Run the main event loop.
///
/// Returns whether the client requested shutdown before exiting.
pub fn run_main_loop(
    receiver: Receiver<lsp_server::Message>,
    sender: Sender<lsp_server::Message>,
    locator: QueryLocator,
) -> bool {
    let mut state = MainLoopState::new(sender, locator);
    let mut queue: VecDeque<Message> = VecDeque::new();

    tracing::info!("Main loop started");

    loop {
        let msg = match queue.pop_front() {
            Some(msg) => msg,
            None => match receiver.recv() {
                Ok(msg) => Message::from(msg),
                Err(_) => break,
            },
        };

        if let Message::Request(req) = &msg {
            queue.extend(receiver.try_iter().map(Message::from));
            state.note_cancellations(&req.id, &queue);
        }

        state.handle_message(msg);

        if state.exit_requested {
            break;
        }
    }

    tracing::info!("Main loop ended");
    state.shutdown_requested
}
