/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The language-server envelope: raw JSON in, inner requests out, and the
//! JSON-framed responses back.

use std::path::Path;
use std::path::PathBuf;

use lsp_server::RequestId;
use lsp_types::DidCloseTextDocumentParams;
use lsp_types::DidOpenTextDocumentParams;
use lsp_types::DidSaveTextDocumentParams;
use lsp_types::Hover;
use lsp_types::HoverContents;
use lsp_types::Location;
use lsp_types::MarkedString;
use lsp_types::Position;
use lsp_types::Range;
use lsp_types::TextDocumentPositionParams;
use lsp_types::Url;
use path_absolutize::Absolutize;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use tracing::warn;

use crate::parse::ast::SourcePosition;
use crate::rage;
use crate::server::dispatcher::Server;
use crate::server::protocol::Client;
use crate::server::protocol::Request;
use crate::server::protocol::Response;

/// Custom methods carried over the envelope alongside the standard ones.
const METHOD_RAGE: &str = "pycheckd/rage";
const METHOD_TYPE_CHECK: &str = "pycheckd/typeCheck";

#[derive(Debug, Deserialize)]
struct TypeCheckParams {
    #[serde(default)]
    update_environment_with: Vec<PathBuf>,
    #[serde(default)]
    check: Vec<PathBuf>,
}

/// Decode a raw JSON message into an inner request. Unrecognized or
/// malformed messages are logged and dropped.
pub fn parse_request(raw: &str) -> Option<Request> {
    let message: Value = match serde_json::from_str(raw) {
        Ok(message) => message,
        Err(error) => {
            warn!("Malformed language-server message: {error}");
            return None;
        }
    };
    let method = message.get("method")?.as_str()?.to_owned();
    match method.as_str() {
        "textDocument/definition" => {
            let (id, params) = request_parts::<TextDocumentPositionParams>(&message)?;
            let (path, position) = position_params(&params)?;
            Some(Request::GetDefinition { id, path, position })
        }
        "textDocument/hover" => {
            let (id, params) = request_parts::<TextDocumentPositionParams>(&message)?;
            let (path, position) = position_params(&params)?;
            Some(Request::Hover { id, path, position })
        }
        "textDocument/didOpen" => {
            let params: DidOpenTextDocumentParams = notification_params(&message)?;
            Some(Request::OpenDocument(file_path(&params.text_document.uri)?))
        }
        "textDocument/didClose" => {
            let params: DidCloseTextDocumentParams = notification_params(&message)?;
            Some(Request::CloseDocument(file_path(&params.text_document.uri)?))
        }
        "textDocument/didSave" => {
            let params: DidSaveTextDocumentParams = notification_params(&message)?;
            Some(Request::SaveDocument(file_path(&params.text_document.uri)?))
        }
        "shutdown" => Some(Request::ClientShutdown(request_id(&message)?)),
        "exit" => Some(Request::ClientExit(Client::Persistent)),
        METHOD_RAGE => Some(Request::Rage(request_id(&message)?)),
        METHOD_TYPE_CHECK => {
            let params: TypeCheckParams = notification_params(&message)?;
            Some(Request::TypeCheck {
                update_environment_with: params.update_environment_with,
                check: params.check,
            })
        }
        _ => {
            warn!("Unhandled language-server method: {method}");
            None
        }
    }
}

fn request_id(message: &Value) -> Option<RequestId> {
    match message.get("id")? {
        Value::Number(number) => Some(RequestId::from(number.as_i64()? as i32)),
        Value::String(string) => Some(RequestId::from(string.clone())),
        _ => None,
    }
}

fn request_parts<T: DeserializeOwned>(message: &Value) -> Option<(RequestId, T)> {
    let id = request_id(message)?;
    let params = notification_params(message)?;
    Some((id, params))
}

fn notification_params<T: DeserializeOwned>(message: &Value) -> Option<T> {
    let params = message.get("params")?.clone();
    match serde_json::from_value(params) {
        Ok(params) => Some(params),
        Err(error) => {
            warn!("Malformed language-server params: {error}");
            None
        }
    }
}

fn position_params(params: &TextDocumentPositionParams) -> Option<(PathBuf, SourcePosition)> {
    let path = file_path(&params.text_document.uri)?;
    let position = SourcePosition::new(
        params.position.line as usize + 1,
        params.position.character as usize,
    );
    Some((path, position))
}

fn file_path(uri: &Url) -> Option<PathBuf> {
    match uri.to_file_path() {
        Ok(path) => Some(path),
        Err(()) => {
            warn!("Not a file uri: {uri}");
            None
        }
    }
}

/// An envelope response with the given result payload.
fn envelope_response(id: RequestId, result: Value) -> Response {
    let response = lsp_server::Response {
        id,
        result: Some(result),
        error: None,
    };
    Response::LanguageServerProtocol(
        serde_json::to_string(&response).expect("response serializes"),
    )
}

pub fn shutdown_acknowledgement(id: RequestId) -> Response {
    envelope_response(id, Value::Null)
}

impl Server {
    /// Dispatch an inner request decoded from the envelope. Editing verbs
    /// drive the lookup-cache lifecycle; everything else mirrors the outer
    /// dispatcher.
    pub(crate) fn process_lsp_inner(
        &mut self,
        inner: Request,
    ) -> anyhow::Result<Option<Response>> {
        match inner {
            Request::TypeCheck {
                update_environment_with,
                check,
            } => Ok(Some(Response::TypeCheck(
                self.recheck(update_environment_with, check),
            ))),
            Request::ClientShutdown(id) => Ok(Some(shutdown_acknowledgement(id))),
            Request::ClientExit(client) => {
                info!("Persistent client exited");
                Ok(Some(Response::ClientExit(client)))
            }
            Request::GetDefinition { id, path, position } => {
                Ok(Some(self.definition_response(id, &path, position)))
            }
            Request::Hover { id, path, position } => {
                Ok(Some(self.hover_response(id, &path, position)))
            }
            Request::Rage(id) => Ok(Some(self.collect_rage(id))),
            Request::OpenDocument(file) => {
                self.refresh_lookup(&file);
                Ok(None)
            }
            Request::CloseDocument(file) => {
                let source_root = self.configuration().source_root.clone();
                self.state_mut().lookups.evict(&file, &source_root);
                Ok(None)
            }
            Request::SaveDocument(file) => {
                let source_root = self.configuration().source_root.clone();
                self.state_mut().lookups.evict(&file, &source_root);
                let check_on_save = self
                    .state()
                    .connections
                    .lock()
                    .file_notifiers
                    .is_empty();
                if check_on_save {
                    Ok(Some(Response::TypeCheck(
                        self.recheck(vec![file.clone()], vec![file]),
                    )))
                } else {
                    Ok(None)
                }
            }
            other => {
                warn!(
                    "Unhandled inner language-server request: {}",
                    other.kind()
                );
                Ok(None)
            }
        }
    }

    fn refresh_lookup(&mut self, file: &Path) {
        let source_root = self.configuration().source_root.clone();
        let state = self.state_mut();
        state.lookups.evict(file, &source_root);
        state
            .lookups
            .get(file, &source_root, &state.environment, &state.heap);
    }

    fn hover_response(&mut self, id: RequestId, file: &Path, position: SourcePosition) -> Response {
        let source_root = self.configuration().source_root.clone();
        let state = self.state_mut();
        let annotation =
            state
                .lookups
                .find_annotation(file, position, &source_root, &state.environment, &state.heap);
        let result = match annotation {
            Some(annotation) => {
                let hover = Hover {
                    contents: HoverContents::Scalar(MarkedString::String(annotation.to_string())),
                    range: None,
                };
                serde_json::to_value(hover).expect("hover serializes")
            }
            // Absence is encoded by the envelope: a response with null result.
            None => Value::Null,
        };
        envelope_response(id, result)
    }

    fn definition_response(
        &mut self,
        id: RequestId,
        file: &Path,
        position: SourcePosition,
    ) -> Response {
        let source_root = self.configuration().source_root.clone();
        let state = self.state_mut();
        let definition =
            state
                .lookups
                .find_definition(file, position, &source_root, &state.environment, &state.heap);
        let result = definition
            .and_then(|definition| {
                let absolute = if file.is_absolute() {
                    file.to_path_buf()
                } else {
                    source_root.join(file)
                };
                let absolute = absolute.absolutize().ok()?.to_path_buf();
                let uri = Url::from_file_path(&absolute).ok()?;
                let start = Position {
                    line: definition.line.saturating_sub(1) as u32,
                    character: definition.column as u32,
                };
                let location = Location {
                    uri,
                    range: Range { start, end: start },
                };
                serde_json::to_value(location).ok()
            })
            .unwrap_or(Value::Null);
        envelope_response(id, result)
    }

    pub(crate) fn collect_rage(&self, id: RequestId) -> Response {
        let sections = rage::collect(self.configuration().log_directory.as_deref());
        envelope_response(
            id,
            serde_json::to_value(sections).expect("rage sections serialize"),
        )
    }
}
