/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The request state machine. One request at a time; the only reentrancy is
//! the deferred-work flush, which feeds queued requests back through
//! [`Server::process`].

use std::time::Instant;

use anyhow::bail;
use tracing::info;
use tracing::warn;

use crate::config::ServerConfiguration;
use crate::heap::CollectMode;
use crate::metrics;
use crate::module::handle::FileHandle;
use crate::server::protocol::ErrorsByFile;
use crate::server::protocol::Request;
use crate::server::protocol::Response;
use crate::server::state::ServerState;

pub struct Server {
    configuration: ServerConfiguration,
    state: ServerState,
}

impl Server {
    /// Construct the server and populate the environment from the source
    /// tree, so that check-only requests see parsed sources immediately.
    pub fn new(configuration: ServerConfiguration) -> Server {
        let state = ServerState::new(&configuration);
        let mut server = Server {
            configuration,
            state,
        };
        let sources = collect_source_files(&server.configuration.source_root);
        if !sources.is_empty() {
            server.recheck(sources, Vec::new());
        }
        server
    }

    pub fn configuration(&self) -> &ServerConfiguration {
        &self.configuration
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ServerState {
        &mut self.state
    }

    /// Process one request, mutating state and producing at most one
    /// response. Only programmer-error requests fail; protocol-level faults
    /// are recovered into responses or dropped.
    pub fn process(&mut self, request: Request) -> anyhow::Result<Option<Response>> {
        let start = Instant::now();
        let kind = request.kind();
        let result = self.process_inner(request);
        metrics::server_request(kind, start.elapsed());
        result
    }

    fn process_inner(&mut self, request: Request) -> anyhow::Result<Option<Response>> {
        match request {
            Request::TypeCheck {
                update_environment_with,
                check,
            } => {
                self.compact_shared_heap();
                Ok(Some(Response::TypeCheck(
                    self.recheck(update_environment_with, check),
                )))
            }
            Request::TypeQuery(query) => {
                Ok(Some(Response::TypeQuery(self.handle_type_query(query))))
            }
            Request::DisplayTypeErrors(files) => Ok(Some(Response::TypeCheck(
                self.display_cached_type_errors(&files),
            ))),
            Request::FlushTypeErrors => {
                while let Some(deferred) = self.state.deferred_requests.pop_front() {
                    self.process(deferred)?;
                }
                Ok(Some(Response::TypeCheck(self.state.errors.clone())))
            }
            Request::Stop => {
                // The serve loop writes the response frame before the
                // listener notices the latched signal.
                self.state.connections.lock().stop();
                Ok(Some(Response::Stop))
            }
            Request::LanguageServerProtocol(raw) => {
                match crate::server::lsp::parse_request(&raw) {
                    Some(inner) => self.process_lsp_inner(inner),
                    None => Ok(None),
                }
            }
            Request::ClientShutdown(id) => {
                Ok(Some(crate::server::lsp::shutdown_acknowledgement(id)))
            }
            Request::ClientExit(client) => {
                info!("Client exited: {client:?}");
                Ok(Some(Response::ClientExit(client)))
            }
            Request::Rage(id) => Ok(Some(self.collect_rage(id))),
            Request::GetDefinition { .. }
            | Request::Hover { .. }
            | Request::OpenDocument(_)
            | Request::CloseDocument(_)
            | Request::SaveDocument(_) => {
                warn!(
                    "Editor request `{}` received outside a language-server envelope; dropping",
                    request.kind()
                );
                Ok(None)
            }
            Request::ClientConnection(_) => {
                bail!("Invalid request: ClientConnection cannot be serviced by the dispatcher")
            }
        }
    }

    /// All cached errors, or the cached errors of the requested files. The
    /// returned key set covers every resolvable requested handle even when
    /// its error list is empty.
    pub fn display_cached_type_errors(&self, files: &[std::path::PathBuf]) -> ErrorsByFile {
        if files.is_empty() {
            return self.state.errors.clone();
        }
        let mut map = ErrorsByFile::new();
        for file in files {
            let Some(handle) = FileHandle::new(file, &self.configuration.source_root) else {
                continue;
            };
            let errors = self.state.errors.get(&handle).cloned().unwrap_or_default();
            map.insert(handle, errors);
        }
        map
    }

    fn compact_shared_heap(&mut self) {
        let ratio = self.state.heap.heap_use_ratio();
        if ratio > 0.5 {
            self.state.heap.collect(CollectMode::Aggressive);
            info!(
                target: "server",
                "Shared heap: use ratio {:.3} -> {:.3} after aggressive collection",
                ratio,
                self.state.heap.heap_use_ratio(),
            );
        }
    }
}

/// Every `.py`/`.pyi` file under the root, for the initial populate.
fn collect_source_files(root: &std::path::Path) -> Vec<std::path::PathBuf> {
    fn walk(directory: &std::path::Path, out: &mut Vec<std::path::PathBuf>) {
        let Ok(entries) = std::fs::read_dir(directory) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, out);
            } else if path
                .extension()
                .is_some_and(|extension| extension == "py" || extension == "pyi")
            {
                out.push(path);
            }
        }
    }
    let mut out = Vec::new();
    walk(root, &mut out);
    out.sort();
    out
}
