/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The persistent, cross-request server state.

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use starlark_map::small_map::SmallMap;
use starlark_map::small_set::SmallSet;

use crate::config::ServerConfiguration;
use crate::environment::Environment;
use crate::error::Error;
use crate::heap::SharedHeap;
use crate::lookup::LookupCache;
use crate::module::handle::FileHandle;
use crate::scheduler::Scheduler;
use crate::server::protocol::Client;
use crate::server::protocol::Request;

/// Connection lifecycle record; every transition happens under the mutex.
#[derive(Debug, Default)]
pub struct Connections {
    /// Latched by `StopRequest`; the serve loop's accept thread listens on
    /// the paired receiver.
    stop: Option<Sender<()>>,
    stopped: bool,
    pub file_notifiers: Vec<Client>,
    pub persistent_clients: usize,
}

impl Connections {
    pub fn set_stop_channel(&mut self, sender: Sender<()>) {
        self.stop = Some(sender);
    }

    /// The server-stop routine: signal the listener and refuse further work.
    pub fn stop(&mut self) {
        self.stopped = true;
        if let Some(sender) = self.stop.take() {
            let _ = sender.send(());
        }
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }
}

pub struct ServerState {
    pub environment: Environment,
    pub heap: SharedHeap,
    /// Keys are exactly the handles ever successfully analyzed; an empty
    /// sequence means "analyzed, no errors".
    pub errors: SmallMap<FileHandle, Vec<Error>>,
    /// Every handle ever populated in the environment.
    pub handles: SmallSet<FileHandle>,
    pub lookups: LookupCache,
    /// FIFO with respect to flush order.
    pub deferred_requests: VecDeque<Request>,
    pub connections: Arc<Mutex<Connections>>,
    pub scheduler: Scheduler,
}

impl ServerState {
    pub fn new(configuration: &ServerConfiguration) -> ServerState {
        ServerState {
            environment: Environment::new(),
            heap: SharedHeap::new(configuration.heap_budget_bytes),
            errors: SmallMap::new(),
            handles: SmallSet::new(),
            lookups: LookupCache::new(configuration.lookup_cache_capacity),
            deferred_requests: VecDeque::new(),
            connections: Arc::new(Mutex::new(Connections::default())),
            scheduler: Scheduler::new(configuration.workers),
        }
    }
}
