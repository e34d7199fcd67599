/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Structured metrics events, emitted as tracing events under the `metrics`
//! target so a subscriber can forward them to a sink.

use std::time::Duration;

use tracing::info;

/// One event per dispatched request, carrying the request kind and the
/// wall-clock time spent servicing it.
pub fn server_request(request_kind: &'static str, duration: Duration) {
    info!(
        target: "metrics",
        metric = "server_request",
        request_kind,
        duration_us = duration.as_micros() as u64,
    );
}

/// Emitted once per recheck with the current shared heap estimate.
pub fn shared_memory_size(bytes: usize) {
    info!(target: "metrics", metric = "shared memory size", bytes);
}
