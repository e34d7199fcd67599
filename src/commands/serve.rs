/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The serve command: a listening socket feeding framed requests to the
//! dispatcher, one at a time.

use std::net::TcpListener;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tracing::error;

use crate::config::ServerConfiguration;
use crate::server::dispatcher::Server;
use crate::server::protocol::read_message;
use crate::server::protocol::write_message;
use crate::server::protocol::Client;
use crate::server::protocol::Request;
use crate::server::protocol::Response;

/// Arguments for the analysis server.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    /// Root of the analyzed source tree.
    #[arg(long)]
    pub source_root: PathBuf,
    /// Port to listen on; 0 picks an ephemeral port.
    #[arg(long, default_value_t = 9879)]
    pub port: u16,
    /// Size of the worker pool used for parsing and checking.
    #[arg(long, default_value_t = 4)]
    pub workers: usize,
    /// Check batches larger than this fan out to the worker pool.
    #[arg(long, default_value_t = 5)]
    pub parallel_threshold: usize,
    /// Bound on the number of memoized lookup tables.
    #[arg(long, default_value_t = 64)]
    pub lookup_cache_capacity: usize,
    /// Shared heap budget in megabytes; exceeding half of it triggers
    /// compaction before a recheck.
    #[arg(long, default_value_t = 256)]
    pub heap_budget_mb: usize,
    /// Where rage requests look for log excerpts.
    #[arg(long)]
    pub log_directory: Option<PathBuf>,
}

impl Args {
    pub fn configuration(&self) -> ServerConfiguration {
        let mut configuration = ServerConfiguration::new(self.source_root.clone());
        configuration.parallel_threshold = self.parallel_threshold;
        configuration.workers = NonZeroUsize::new(self.workers.max(1)).unwrap();
        configuration.lookup_cache_capacity = self.lookup_cache_capacity;
        configuration.heap_budget_bytes = self.heap_budget_mb << 20;
        configuration.log_directory = self.log_directory.clone();
        configuration
    }

    pub fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(("127.0.0.1", self.port))
            .with_context(|| format!("binding port {}", self.port))?;
        eprintln!("Listening on {}", listener.local_addr()?);
        serve(listener, self.configuration())
    }
}

/// Accept connections until a `Stop` request latches the stop signal. The
/// stop response frame is written before the listener is torn down.
pub fn serve(listener: TcpListener, configuration: ServerConfiguration) -> anyhow::Result<()> {
    let mut server = Server::new(configuration);
    let (stop_sender, stop_receiver) = crossbeam_channel::bounded::<()>(1);
    server
        .state()
        .connections
        .lock()
        .set_stop_channel(stop_sender);
    eprintln!("Reading messages");
    loop {
        let mut stream = match listener.accept() {
            Ok((stream, _)) => stream,
            Err(error) => {
                error!("Failed to accept connection: {error}");
                continue;
            }
        };
        loop {
            let request: Option<Request> = match read_message(&mut stream) {
                Ok(request) => request,
                Err(error) => {
                    error!("Dropping connection on malformed frame: {error:#}");
                    break;
                }
            };
            let Some(request) = request else {
                break;
            };
            // Client registration is a connection-layer concern; the
            // dispatcher treats it as a programming error.
            if let Request::ClientConnection(client) = &request {
                let mut connections = server.state().connections.lock();
                match client {
                    Client::FileNotifier => connections.file_notifiers.push(*client),
                    Client::Persistent => connections.persistent_clients += 1,
                }
                continue;
            }
            match server.process(request) {
                Ok(Some(response)) => {
                    let stopping = matches!(response, Response::Stop);
                    if let Err(error) = write_message(&mut stream, &response) {
                        error!("Failed to write response: {error:#}");
                    }
                    if stopping {
                        // Response is on the wire; returning drops the
                        // listener and refuses further connects.
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    error!("Request failed: {error:#}");
                }
            }
        }
        if stop_receiver.try_recv().is_ok() || server.state().connections.lock().stopped() {
            return Ok(());
        }
    }
}
