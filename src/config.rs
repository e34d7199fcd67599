/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Server configuration, consumed opaquely by the services.

use std::num::NonZeroUsize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfiguration {
    /// Root of the analyzed source tree; all handles are relative to it.
    pub source_root: PathBuf,
    /// Batch size above which a recheck fans out to the worker pool.
    pub parallel_threshold: usize,
    pub workers: NonZeroUsize,
    pub lookup_cache_capacity: usize,
    pub heap_budget_bytes: usize,
    /// Where rage requests look for log excerpts.
    pub log_directory: Option<PathBuf>,
}

impl ServerConfiguration {
    pub fn new(source_root: PathBuf) -> ServerConfiguration {
        ServerConfiguration {
            source_root,
            parallel_threshold: 5,
            workers: NonZeroUsize::new(4).unwrap(),
            lookup_cache_capacity: 64,
            heap_budget_bytes: 256 << 20,
            log_directory: None,
        }
    }
}
